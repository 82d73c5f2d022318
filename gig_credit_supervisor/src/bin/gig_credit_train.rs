//! Train (or load) the credit model into a directory store and score the
//! reference profiles.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use gig_credit_core::{EngineCfg, Result, SignalVector};
use gig_credit_supervisor::{CreditEngine, DirStore, ModelSource};

#[derive(Parser, Debug)]
#[command(name = "gig-credit-train", about = "Train the gig-economy credit model and print sample scores")]
struct Args {
    /// Directory holding the persisted model and adjustment table.
    #[arg(long, default_value = "models")]
    store_dir: PathBuf,

    /// Optional JSON config; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the synthetic-data seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of synthetic samples.
    #[arg(long)]
    samples: Option<usize>,
}

fn reference_profiles() -> Vec<(&'static str, SignalVector)> {
    vec![
        (
            "High Performer",
            SignalVector::new([100_000.0, 25_000.0, 35.0, 4.8, 300.0, 0.0, 15_000.0, 5.0]),
        ),
        (
            "Average User",
            SignalVector::new([50_000.0, 10_000.0, 15.0, 4.2, 150.0, 2.0, 5_000.0, 2.0]),
        ),
        (
            "New User",
            SignalVector::new([15_000.0, 2_000.0, 3.0, 4.0, 30.0, 1.0, 1_000.0, 0.0]),
        ),
    ]
}

fn run(args: Args) -> Result<()> {
    let mut cfg = match &args.config {
        Some(path) => EngineCfg::from_json_file(path)?,
        None => EngineCfg::default(),
    };
    if let Some(seed) = args.seed {
        cfg.synth.seed = seed;
    }
    if let Some(samples) = args.samples {
        cfg.synth.n_samples = samples;
    }

    let store = Arc::new(DirStore::open(&args.store_dir)?);
    let engine = CreditEngine::activate(cfg, store)?;

    match &engine.activation().model {
        ModelSource::Loaded => println!("Loaded existing model from {}", args.store_dir.display()),
        ModelSource::Trained(report) => {
            println!(
                "Trained on {} rows ({} held out)",
                report.train_rows, report.holdout_rows
            );
            if let (Some(mae), Some(acc)) = (report.holdout_mae, report.holdout_accuracy) {
                println!("  Holdout MAE: {mae:.1}  accuracy: {:.1}%", acc * 100.0);
            }
        }
    }

    for (name, profile) in reference_profiles() {
        let result = engine.score(&profile)?;
        println!("\n{name}:");
        println!("  Credit Score: {} ({})", result.score, result.category());
        println!("  Gig Consistency: {:.1}%", result.factors.gig_consistency);
        println!("  Payment History: {:.1}%", result.factors.payment_history);
        println!("  Financial Health: {:.1}%", result.factors.financial_health);
        println!(
            "  Regressor: {:.1}  Category probabilities: {:.2?}",
            result.raw.regressor_value, result.raw.classifier_probs
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "training failed");
            ExitCode::FAILURE
        }
    }
}
