// geoanchor_sim/src/simulation/config/structs.rs

use geoanchor_core::prelude::{GridSpec, LocationOptions};
use serde::Deserialize;

// =========================================================================
// == Top-Level Scenario ==
// =========================================================================

/// # ScenarioConfig
/// The root of the data parsed from a `scenario.toml` file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: Simulation,

    #[serde(default)]
    pub world: World,

    // The TOML has `[[entities]]`, which becomes a Vec of EntityConfig structs.
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Simulation {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Duration of the run in seconds.
    pub duration_seconds: f64,
    /// How often every entity is stepped, in Hz.
    pub rate_hz: f64,
    /// Emit one `info!` line per entity per step.
    #[serde(default = "default_true")]
    pub log_steps: bool,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: None,
            duration_seconds: 10.0,
            rate_hz: 10.0,
            log_steps: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct World {
    /// Name of the topocentric anchor context everything is placed in.
    pub context_name: String,
    /// Geodetic origin of the anchor context.
    pub origin: GeodeticPoint,
    #[serde(default)]
    pub terrain: Option<TerrainConfig>,
}

impl Default for World {
    fn default() -> Self {
        Self {
            context_name: "scene".to_string(),
            origin: GeodeticPoint::default(),
            terrain: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeodeticPoint {
    /// Degrees.
    pub lat: f64,
    /// Degrees.
    pub lon: f64,
    /// Metres above the ellipsoid.
    #[serde(default)]
    pub alt: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TerrainConfig {
    pub grid: GridSpec,
    pub shape: TerrainShape,
    /// Make every tile resident before the first step.
    #[serde(default)]
    pub preload: bool,
    /// Simulated paging latency of a blocking clamp, in milliseconds.
    #[serde(default)]
    pub load_latency_ms: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "type")] // Use the "type" field to decide which variant to parse
#[serde(rename_all = "PascalCase")]
pub enum TerrainShape {
    Flat {
        height: f64,
    },
    /// A plane rising `grade_x` metres per metre along X and `grade_z` along Z.
    Slope {
        #[serde(default)]
        height: f64,
        #[serde(default)]
        grade_x: f64,
        #[serde(default)]
        grade_z: f64,
    },
    /// Crossed sine swells.
    Waves { amplitude: f64, wavelength: f64 },
}

impl TerrainShape {
    /// Ground height at a context-local `(x, z)`.
    pub fn height_at(&self, x: f64, z: f64) -> f64 {
        match *self {
            TerrainShape::Flat { height } => height,
            TerrainShape::Slope {
                height,
                grade_x,
                grade_z,
            } => height + grade_x * x + grade_z * z,
            TerrainShape::Waves {
                amplitude,
                wavelength,
            } => {
                let k = std::f64::consts::TAU / wavelength;
                amplitude * (k * x).sin() * (k * z).cos()
            }
        }
    }
}

// =========================================================================
// == Entities ==
// =========================================================================

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct EntityConfig {
    pub name: String,
    pub anchor: AnchorConfig,
    /// Intrinsic `[yaw, pitch, roll]` in degrees.
    #[serde(default)]
    pub rotation_deg: [f64; 3],
    #[serde(default)]
    pub options: LocationOptions,
    /// Entities with a motion script are kinematic; the rest are static.
    #[serde(default)]
    pub motion: Option<MotionConfig>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "type")]
#[serde(rename_all = "PascalCase")]
pub enum AnchorConfig {
    Geodetic {
        lat: f64,
        lon: f64,
        #[serde(default)]
        alt: f64,
    },
    /// World (earth-centred) cartesian coordinates.
    Cartesian { x: f64, y: f64, z: f64 },
    /// Coordinates in the anchor context, X east, Y up, Z south.
    Local { x: f64, y: f64, z: f64 },
}

/// A scripted trajectory, sampled like a stream of network updates.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MotionConfig {
    /// `[east, north, up]` in m/s, fixed at the start point.
    pub velocity_enu: [f64; 3],
    /// `[east, north, up]` in m/s^2.
    #[serde(default)]
    pub acceleration_enu: [f64; 3],
    /// Seconds between kinematic samples; the entity dead-reckons in between.
    pub update_interval: f64,
    /// Standard deviation of the position noise added to each sample, in metres.
    #[serde(default)]
    pub position_noise_stddev: f64,
    /// Standard deviation of the velocity noise added to each sample, in m/s.
    #[serde(default)]
    pub velocity_noise_stddev: f64,
}
