use clap::Parser;
use std::path::PathBuf;

/// GeoAnchor: a headless harness for map-anchored entities.
///
/// Loads a scenario, steps every entity at a fixed rate and reports the
/// resulting transforms.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/harbour.toml")]
    pub scenario: PathBuf,

    /// Override the run duration in seconds.
    #[arg(long)]
    pub duration: Option<f64>,

    /// Override the step rate in Hz.
    #[arg(long)]
    pub rate: Option<f64>,

    /// Override the random seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Only print the summary, not a line per entity per step.
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,
}
