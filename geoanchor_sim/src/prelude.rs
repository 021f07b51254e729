// geoanchor_sim/src/prelude.rs

// Re-export the entire geoanchor_core prelude so you can easily access
// pure types like `MapLocation`, `SystemMap`, `LocationOptions`, etc.
pub use geoanchor_core::prelude::*;

// Re-export common simulation-specific types for easy access.
pub use crate::cli::Cli;
pub use crate::simulation::config::structs::*;
pub use crate::simulation::config::{load_scenario, scenario_figment};
pub use crate::simulation::core::entities::{EntityStats, MotionScript, SimEntity};
pub use crate::simulation::core::prng::SimulationRng;
pub use crate::simulation::core::report::RunSummary;
pub use crate::simulation::core::runner::SimulationRunner;
pub use crate::simulation::core::world::SimWorld;
