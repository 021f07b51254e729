// geoanchor_core/src/lib.rs

// This file defines the public modules of the library.
pub mod context;
pub mod error;
pub mod frames;
pub mod geodetic;
pub mod map;
pub mod options;
pub mod position;
pub mod prelude;
pub mod terrain;
pub mod types;
