// geoanchor_sim/src/simulation/mod.rs

//! Everything between a scenario file and a stepped set of anchored entities.

pub mod config;
pub mod core;
