//! # TETHER Stress Test
//!
//! Runs the increment and pair-consistency stress runs against `RwSynced`
//! and exits non-zero if either loses an update or tears a read.
//!
//! ```text
//! tether_stress [CONFIG.toml]
//! RUST_LOG=debug tether_stress
//! ```

use std::process::ExitCode;

use tether_harness::{run_increment_stress, run_pair_consistency, HarnessResult, StressConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn run(config: &StressConfig) -> HarnessResult<()> {
    info!(
        tasks = config.tasks,
        workers = config.workers,
        readers = config.readers,
        "starting stress runs"
    );

    let increments = run_increment_stress(config)?;
    increments.verify()?;

    let pairs = run_pair_consistency(config)?;
    pairs.verify()?;

    info!(
        increment_ms = increments.elapsed.as_millis(),
        pair_ms = pairs.elapsed.as_millis(),
        "all stress runs clean"
    );
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => StressConfig::load(&path),
        None => Ok(StressConfig::default()),
    };

    match config.and_then(|config| run(&config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "stress run failed");
            ExitCode::FAILURE
        }
    }
}
