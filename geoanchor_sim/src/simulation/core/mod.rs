// geoanchor_sim/src/simulation/core/mod.rs

pub mod entities;
pub mod prng;
pub mod report;
pub mod runner;
pub mod world;
