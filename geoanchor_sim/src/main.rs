// geoanchor_sim/src/main.rs

//! Headless run of a GeoAnchor scenario.
//!
//! `cargo run -p geoanchor_sim -- --scenario assets/scenarios/harbour.toml`

use clap::Parser;
use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geoanchor_sim::prelude::*;

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // --- 1. Logging ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,geoanchor_core=info,geoanchor_sim=info".into()),
        )
        .init();

    // --- 2. Load Scenario ---
    let config = load_scenario(&cli)?;

    // --- 3. Build and Run ---
    let mut runner = SimulationRunner::build(&config)?;
    let summary = runner.run();

    info!("Scenario complete");
    println!("{summary}");
    Ok(())
}
