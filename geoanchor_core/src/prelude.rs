// geoanchor_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::geodetic::GeodeticService;
pub use crate::position::PoseSource;
pub use crate::terrain::TerrainProvider;

// --- Core Data Structures ---
pub use crate::context::{AnchorContext, ContextRegistry};
pub use crate::error::MapError;
pub use crate::frames::{EulerAngles, TangentFrame};
pub use crate::map::{GlobalPosition, SystemMap};
pub use crate::options::{
    LoadOptions, LocationOptions, PositionOptions, QualityOptions, RotationOptions,
};
pub use crate::position::{KinematicState, MapLocation, MapPosition, Motion, PoseOverride};
pub use crate::terrain::{ClampMode, ClampRequest};
pub use crate::types::{ContextHandle, Transform};

// --- Concrete Implementations (Export common ones for convenience) ---
pub use crate::geodetic::Wgs84;
pub use crate::terrain::height_field::{GridSpec, HeightFieldTerrain, TileId, TileLoader};
