use std::collections::{BTreeMap, BTreeSet};

use approx::assert_relative_eq;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use swarmraft::scenario::generate_swarm;
use swarmraft::{
    Agent, AgentId, ConsensusConfig, ConsensusRound, FaultDetector, FusionEstimator, Position,
    RoundParams, ScenarioConfig, Swarm, Vote, Votes, VotingEngine,
};

/// Agents at fixed positions with small deterministic sensor offsets.
fn fixed_swarm(truths: &[Position]) -> Vec<Agent> {
    let mut agents: Vec<Agent> = truths
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let k = i as f64;
            let gnss = p + Position::new(0.3 * (k - 2.0) / 2.0, -0.2 + 0.1 * k);
            let prior = p - Position::new(0.6, -0.4 + 0.2 * k);
            let inertial = p + Position::new(0.1 * k - 0.2, 0.15);
            Agent::new(i, p, gnss, prior, inertial)
        })
        .collect();

    for a in agents.iter_mut() {
        for (j, t) in truths.iter().enumerate() {
            if j != a.id() {
                let noise = 0.05 * ((a.id() + 2 * j) % 5) as f64 - 0.1;
                let d = (a.true_position() - t).norm() + noise;
                a.set_range(j, d);
            }
        }
    }
    agents
}

fn five_positions() -> Vec<Position> {
    vec![
        Position::new(7.5, 19.0),
        Position::new(14.6, 12.0),
        Position::new(3.1, 3.1),
        Position::new(1.2, 17.3),
        Position::new(12.0, 14.2),
    ]
}

fn seven_positions() -> Vec<Position> {
    vec![
        Position::new(10.0, 10.0),
        Position::new(2.0, 3.0),
        Position::new(18.0, 2.5),
        Position::new(17.0, 18.0),
        Position::new(3.5, 16.0),
        Position::new(10.0, 1.0),
        Position::new(1.0, 9.0),
    ]
}

#[test]
fn end_to_end_spoofed_agent_detected_and_recovered() {
    let mut agents = fixed_swarm(&five_positions());
    agents[2].offset_gnss(Position::new(15.0, -15.0));
    let swarm = Swarm::new(agents).unwrap();

    let params = RoundParams::new(2.0 * 1.04_f64.sqrt(), 1, 0.04 / 1.04).unwrap();
    let outcome = ConsensusRound::new(params).unwrap().run(&swarm).unwrap();

    assert!(outcome.faulty.contains(&2));
    assert_eq!(outcome.votes.tally(2), Some(-4));

    let agent = swarm.get(2).unwrap();
    let recovered_err = (outcome.final_positions[&2] - agent.true_position()).norm();
    let gnss_err = (agent.gnss_reading() - agent.true_position()).norm();
    assert!(recovered_err < gnss_err);

    for id in swarm.ids().filter(|&id| !outcome.faulty.contains(&id)) {
        assert_eq!(outcome.final_positions[&id], swarm.get(id).unwrap().gnss_reading());
    }
}

#[test]
fn median_recovery_tolerates_minority_of_corrupted_peers() {
    let mut agents = fixed_swarm(&seven_positions());
    agents[0].offset_gnss(Position::new(15.0, -15.0));
    // Two of the six peers report wildly wrong ranges to the spoofed agent.
    assert!(agents[1].offset_range(0, 25.0));
    assert!(agents[2].offset_range(0, -8.0));
    let swarm = Swarm::new(agents).unwrap();

    let params = RoundParams::new(2.0, 2, 0.04).unwrap();
    let outcome = ConsensusRound::new(params).unwrap().run(&swarm).unwrap();
    assert!(outcome.faulty.contains(&0));

    let agent = swarm.get(0).unwrap();
    let recovered_err = (outcome.final_positions[&0] - agent.true_position()).norm();
    let gnss_err = (agent.gnss_reading() - agent.true_position()).norm();
    assert!(recovered_err < gnss_err);
    assert!(recovered_err < 2.0, "recovered error {recovered_err}");
}

#[test]
fn recovery_matches_voting_cross_estimates() {
    let mut agents = fixed_swarm(&five_positions());
    agents[4].offset_gnss(Position::new(-12.0, 9.0));
    let swarm = Swarm::new(agents).unwrap();
    let fusion = FusionEstimator::new(0.25).unwrap();

    let faulty = BTreeSet::from([4]);
    let engine = swarmraft::RecoveryEngine::new(fusion);
    let recomputed = engine.recover(&swarm, &faulty).unwrap();
    let estimates = swarmraft::CrossEstimates::compute(&swarm, &fusion).unwrap();
    let reused = engine.recover_from(&estimates, &faulty).unwrap();

    assert_eq!(recomputed, reused);
}

#[test]
fn two_agent_recovery_uses_single_peer_estimate() {
    let mut agents = fixed_swarm(&[Position::new(0.0, 0.0), Position::new(6.0, 8.0)]);
    agents[1].offset_gnss(Position::new(15.0, -15.0));
    let swarm = Swarm::new(agents).unwrap();
    let fusion = FusionEstimator::new(0.1).unwrap();

    let recovered = swarmraft::RecoveryEngine::new(fusion)
        .recover(&swarm, &BTreeSet::from([1]))
        .unwrap();
    let only_peer = fusion
        .fuse(swarm.get(0).unwrap(), swarm.get(1).unwrap())
        .unwrap();
    assert_relative_eq!(recovered[&1].x, only_peer.x);
    assert_relative_eq!(recovered[&1].y, only_peer.y);
}

#[test]
fn calibrated_threshold_rarely_flags_clean_agents() {
    let scenario = ScenarioConfig::default();
    let consensus = ConsensusConfig::default();
    let runs = 200;
    let mut flagged = 0usize;

    for seed in 0..runs {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let swarm = generate_swarm(&scenario, &mut rng).unwrap();
        let params = consensus.resolve(&mut rng).unwrap();
        let outcome = ConsensusRound::new(params).unwrap().run(&swarm).unwrap();
        flagged += outcome.faulty.len();
    }

    let rate = flagged as f64 / (runs as usize * scenario.num_agents) as f64;
    assert!(rate < 0.05, "false-positive rate {rate}");
}

fn position() -> impl Strategy<Value = Position> {
    (-100.0..100.0f64, -100.0..100.0f64).prop_map(|(x, y)| Position::new(x, y))
}

fn votes_strategy() -> impl Strategy<Value = Votes> {
    (2usize..10).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(any::<bool>(), n - 1), n).prop_map(|rows| {
            let map: BTreeMap<AgentId, Vec<Vote>> = rows
                .into_iter()
                .enumerate()
                .map(|(id, row)| {
                    let votes = row
                        .into_iter()
                        .map(|ok| if ok { Vote::Consistent } else { Vote::Inconsistent })
                        .collect();
                    (id, votes)
                })
                .collect();
            Votes::from(map)
        })
    })
}

proptest! {
    #[test]
    fn every_target_receives_n_minus_one_votes(n in 2usize..10, seed in any::<u64>()) {
        let scenario = ScenarioConfig { num_agents: n, ..Default::default() };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let swarm = generate_swarm(&scenario, &mut rng).unwrap();
        let engine = VotingEngine::new(FusionEstimator::new(0.04).unwrap(), 2.0).unwrap();
        let votes = engine.compute_votes(&swarm).unwrap();

        prop_assert_eq!(votes.len(), n);
        for (_, ballots) in votes.iter() {
            prop_assert_eq!(ballots.len(), n - 1);
        }
    }

    #[test]
    fn larger_fault_bound_never_unflags(votes in votes_strategy()) {
        let n = votes.len();
        for f in 1..n.saturating_sub(1) {
            let smaller = FaultDetector::new(f).unwrap().detect(&votes);
            let larger = FaultDetector::new(f + 1).unwrap().detect(&votes);
            prop_assert!(smaller.is_subset(&larger));
        }
    }

    #[test]
    fn fuse_is_idempotent(
        gnss in position(),
        prior in position(),
        inertial in position(),
        range in 0.0..200.0f64,
        alpha in 0.0..=1.0f64,
    ) {
        let mut observer = Agent::new(0, inertial, inertial, inertial, inertial);
        observer.set_range(1, range);
        let target = Agent::new(1, prior, gnss, prior, prior);
        let fusion = FusionEstimator::new(alpha).unwrap();

        let first = fusion.fuse(&observer, &target).unwrap();
        let second = fusion.fuse(&observer, &target).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn degenerate_geometry_returns_gnss(
        gnss in position(),
        shared in position(),
        range in 0.0..200.0f64,
        alpha in 0.0..=1.0f64,
    ) {
        let mut observer = Agent::new(0, shared, shared, shared, shared);
        observer.set_range(1, range);
        let target = Agent::new(1, shared, gnss, shared, shared);
        let fusion = FusionEstimator::new(alpha).unwrap();

        prop_assert_eq!(fusion.fuse(&observer, &target).unwrap(), gnss);
    }
}
