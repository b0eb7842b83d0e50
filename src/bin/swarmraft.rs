use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use swarmraft::{run_experiment, ExperimentConfig, ExperimentReport, RoundReport};

#[derive(Debug, Parser)]
#[command(name = "swarmraft")]
#[command(about = "Detect and recover spoofed GNSS readings in a simulated swarm")]
struct Cli {
    /// TOML experiment configuration; built-in defaults when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long)]
    agents: Option<usize>,

    /// Number of spoofed agents; also raises the attacked round's fault bound to match
    #[arg(long)]
    attacked: Option<usize>,

    /// Print the report as JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let report = run_experiment(&config).context("consensus experiment failed")?;

    if cli.json {
        let json = report.to_json().context("failed to encode report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<ExperimentConfig> {
    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config: {}", path.display()))?,
        None => ExperimentConfig::default(),
    };

    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(agents) = cli.agents {
        config.scenario.num_agents = agents;
    }
    if let Some(attacked) = cli.attacked {
        config.set_attacker_count(attacked);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn print_round(label: &str, round: &RoundReport) {
    println!("{label}:");
    println!(
        "  alpha = {:.4}, T = {:.4}, f = {}",
        round.params.fusion_weight, round.params.residual_threshold, round.params.max_faulty
    );
    println!("  faulty: {:?}", round.faulty);
    println!(
        "  MAE  (GNSS / final): {:.3} m / {:.3} m",
        round.gnss_error.mae, round.final_error.mae
    );
    println!(
        "  RMSE (GNSS / final): {:.3} m / {:.3} m",
        round.gnss_error.rmse, round.final_error.rmse
    );
}

fn print_report(report: &ExperimentReport) {
    println!("=== SwarmRaft (seed {}, {} agents) ===", report.seed, report.num_agents);
    print_round("Baseline", &report.baseline);
    println!("Attacked agents: {:?}", report.attacked_ids);
    print_round("Under attack", &report.attacked);
    println!(
        "Detection: {} true positive(s), {} false positive(s), {} missed",
        report.detection.true_positives,
        report.detection.false_positives,
        report.detection.false_negatives
    );
}
