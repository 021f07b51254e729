// geoanchor_sim/src/simulation/config/mod.rs

//! Loading and validating the scenario configuration.

pub mod structs;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;
use tracing::info;

use crate::cli::Cli;
pub use structs::{
    AnchorConfig, EntityConfig, GeodeticPoint, MotionConfig, ScenarioConfig, Simulation,
    TerrainConfig, TerrainShape, World,
};

/// Prefix of environment variables that override scenario values, e.g.
/// `GEOANCHOR_SIMULATION__RATE_HZ=30`.
pub const ENV_PREFIX: &str = "GEOANCHOR_";

/// The figment stack behind every scenario: the TOML file, then the environment.
pub fn scenario_figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Loads the scenario named on the command line and applies the CLI overrides.
pub fn load_scenario(cli: &Cli) -> Result<ScenarioConfig, figment::Error> {
    info!("Loading scenario from: {}", cli.scenario.display());
    let mut config: ScenarioConfig = scenario_figment(&cli.scenario).extract()?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

/// Command-line flags win over both the file and the environment.
pub fn apply_overrides(config: &mut ScenarioConfig, cli: &Cli) {
    if let Some(duration) = cli.duration {
        config.simulation.duration_seconds = duration;
    }
    if let Some(rate) = cli.rate {
        config.simulation.rate_hz = rate;
    }
    if cli.seed.is_some() {
        config.simulation.seed = cli.seed;
    }
    if cli.quiet {
        config.simulation.log_steps = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoanchor_core::prelude::{LoadOptions, PositionOptions, QualityOptions};
    use std::path::PathBuf;

    const SCENARIO: &str = r#"
        [simulation]
        seed = 7
        duration_seconds = 4.0
        rate_hz = 5.0

        [world]
        context_name = "quay"
        origin = { lat = 57.7, lon = 11.9 }

        [world.terrain]
        preload = true
        grid = { origin_x = -64.0, origin_z = -64.0, spacing = 2.0, columns = 65, rows = 65, tile_size = 16 }
        shape = { type = "Slope", grade_z = 0.1 }

        [[entities]]
        name = "crane"
        anchor = { type = "Local", x = 4.0, y = 0.0, z = -2.0 }
        rotation_deg = [90.0, 0.0, 0.0]
        options = { position = "Surface", rotation = ["AlignToSurface"] }

        [[entities]]
        name = "tug"
        anchor = { type = "Geodetic", lat = 57.7001, lon = 11.9002 }
        options = { position = "Surface", rotation = ["AlignToSurface", "AlignToVelocity"], load = "WaitForData", quality = "Highest" }
        motion = { velocity_enu = [1.5, 0.5, 0.0], update_interval = 0.5, position_noise_stddev = 0.2 }
    "#;

    fn parse(toml: &str) -> Result<ScenarioConfig, figment::Error> {
        Figment::new().merge(Toml::string(toml)).extract()
    }

    #[test]
    fn test_parse_full_scenario() {
        let config = parse(SCENARIO).unwrap();
        assert_eq!(config.simulation.seed, Some(7));
        assert!(config.simulation.log_steps);
        assert_eq!(config.world.origin.alt, 0.0);

        let terrain = config.world.terrain.as_ref().unwrap();
        assert!(terrain.preload);
        assert_eq!(terrain.grid.columns, 65);
        assert_eq!(
            terrain.shape,
            TerrainShape::Slope {
                height: 0.0,
                grade_x: 0.0,
                grade_z: 0.1
            }
        );

        assert_eq!(config.entities.len(), 2);
        let crane = &config.entities[0];
        assert!(crane.motion.is_none());
        assert_eq!(crane.options.position, PositionOptions::Surface);
        assert_eq!(crane.options.load, LoadOptions::NoWait);

        let tug = &config.entities[1];
        assert!(tug.options.rotation.align_to_velocity());
        assert_eq!(tug.options.quality, QualityOptions::Highest);
        let motion = tug.motion.unwrap();
        assert_eq!(motion.acceleration_enu, [0.0; 3]);
        assert_eq!(motion.position_noise_stddev, 0.2);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = parse(
            r#"
            [simulation]
            duration_seconds = 1.0
            rate_hz = 1.0
            gravity = 9.81
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_rotation_flag_is_rejected() {
        let err = parse(
            r#"
            [[entities]]
            name = "x"
            anchor = { type = "Local", x = 0.0, y = 0.0, z = 0.0 }
            options = { rotation = ["AlignToWind"] }
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = parse(SCENARIO).unwrap();
        let cli = Cli {
            scenario: PathBuf::from("unused.toml"),
            duration: Some(1.0),
            rate: None,
            seed: Some(99),
            quiet: true,
        };
        apply_overrides(&mut config, &cli);
        assert_eq!(config.simulation.duration_seconds, 1.0);
        assert_eq!(config.simulation.rate_hz, 5.0);
        assert_eq!(config.simulation.seed, Some(99));
        assert!(!config.simulation.log_steps);
    }

    #[test]
    fn test_terrain_shapes() {
        let flat = TerrainShape::Flat { height: 3.0 };
        assert_eq!(flat.height_at(100.0, -40.0), 3.0);

        let slope = TerrainShape::Slope {
            height: 1.0,
            grade_x: 0.5,
            grade_z: -0.25,
        };
        assert_eq!(slope.height_at(2.0, 4.0), 1.0);

        let waves = TerrainShape::Waves {
            amplitude: 2.0,
            wavelength: 40.0,
        };
        assert_eq!(waves.height_at(0.0, 0.0), 0.0);
        approx::assert_abs_diff_eq!(waves.height_at(10.0, 0.0), 2.0, epsilon = 1e-12);
    }
}
