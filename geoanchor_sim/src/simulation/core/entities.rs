// geoanchor_sim/src/simulation/core/entities.rs

//! Scenario entities: a `MapLocation`, the options it is stepped with and an
//! optional scripted trajectory that feeds it kinematic samples.

use nalgebra::Vector3;
use rand_distr::Normal;
use tracing::{debug, warn};

use geoanchor_core::prelude::*;

use crate::simulation::config::{AnchorConfig, EntityConfig, MotionConfig};
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::core::world::SimWorld;

/// Ground truth of a scripted entity: constant world-frame acceleration from a
/// fixed start point, sampled every `update_interval` seconds.
#[derive(Debug, Clone)]
pub struct MotionScript {
    start_world: Vector3<f64>,
    velocity_world: Vector3<f64>,
    acceleration_world: Vector3<f64>,
    update_interval: f64,
    position_noise: Option<Normal<f64>>,
    velocity_noise: Option<Normal<f64>>,
    next_update: f64,
}

impl MotionScript {
    /// Rotates the east/north/up rates of `config` into the world frame at `start_world`.
    pub fn new(
        map: &SystemMap,
        start_world: Vector3<f64>,
        config: &MotionConfig,
    ) -> Result<Self, MapError> {
        if !(config.update_interval.is_finite() && config.update_interval > 0.0) {
            return Err(MapError::InvalidInput(format!(
                "update interval must be positive, got {}",
                config.update_interval
            )));
        }

        let enu = map.geodetic()?.orientation_matrix_at(&start_world);
        let [ve, vn, vu] = config.velocity_enu;
        let [ae, an, au] = config.acceleration_enu;

        Ok(Self {
            start_world,
            velocity_world: enu * Vector3::new(ve, vn, vu),
            acceleration_world: enu * Vector3::new(ae, an, au),
            update_interval: config.update_interval,
            position_noise: noise(config.position_noise_stddev)?,
            velocity_noise: noise(config.velocity_noise_stddev)?,
            next_update: 0.0,
        })
    }

    /// True world position at `t`.
    pub fn position_at(&self, t: f64) -> Vector3<f64> {
        self.start_world + self.velocity_world * t + 0.5 * self.acceleration_world * t * t
    }

    pub fn velocity_at(&self, t: f64) -> Vector3<f64> {
        self.velocity_world + self.acceleration_world * t
    }

    fn is_due(&self, t: f64) -> bool {
        t >= self.next_update
    }
}

fn noise(stddev: f64) -> Result<Option<Normal<f64>>, MapError> {
    if stddev == 0.0 {
        return Ok(None);
    }
    Normal::new(0.0, stddev)
        .map(Some)
        .map_err(|e| MapError::InvalidInput(format!("noise stddev {stddev}: {e}")))
}

/// Running statistics of one entity over a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStats {
    pub steps: usize,
    pub clamped_steps: usize,
    pub kinematic_updates: usize,
    /// Largest horizontal (X/Z) distance between the stepped and the true
    /// position, scripted entities only.
    pub max_horizontal_error: f64,
    pub last_transform: Option<Transform>,
}

#[derive(Debug, Clone)]
pub struct SimEntity {
    pub name: String,
    pub location: MapLocation,
    pub options: LocationOptions,
    pub script: Option<MotionScript>,
    pub stats: EntityStats,
}

impl SimEntity {
    /// Places the entity in `world.context` and, for scripted entities, takes the
    /// first kinematic sample at `t = 0`.
    pub fn spawn(world: &SimWorld, config: &EntityConfig) -> Result<Self, MapError> {
        let map = &world.map;
        let mut location = match config.motion {
            Some(_) => MapLocation::new_kinematic(world.context),
            None => MapLocation::new_static(world.context),
        };

        let start_world = match config.anchor {
            AnchorConfig::Geodetic { lat, lon, alt } => map.geodetic()?.to_cartesian(lat, lon, alt),
            AnchorConfig::Cartesian { x, y, z } => Vector3::new(x, y, z),
            AnchorConfig::Local { x, y, z } => map
                .contexts
                .get(world.context)?
                .local_to_world(&Vector3::new(x, y, z)),
        };
        location
            .map_pos_mut()
            .set_cartesian_position(map, start_world.x, start_world.y, start_world.z)?;

        let [yaw, pitch, roll] = config.rotation_deg;
        location.map_pos_mut().set_intrinsic_rotation(
            yaw.to_radians(),
            pitch.to_radians(),
            roll.to_radians(),
        );

        let script = config
            .motion
            .as_ref()
            .map(|motion| MotionScript::new(map, start_world, motion))
            .transpose()?;

        debug!(entity = %config.name, kinematic = script.is_some(), "Entity spawned");
        Ok(Self {
            name: config.name.clone(),
            location,
            options: config.options,
            script,
            stats: EntityStats::default(),
        })
    }

    /// Feeds a (noisy) kinematic sample if one is due at `time`.
    pub fn update(&mut self, map: &SystemMap, time: f64, rng: &mut SimulationRng) {
        let Some(script) = self.script.as_mut() else {
            return;
        };
        if !script.is_due(time) {
            return;
        }
        script.next_update += script.update_interval;

        let position = script.position_at(time) + rng.jitter(script.position_noise.as_ref());
        let velocity = script.velocity_at(time) + rng.jitter(script.velocity_noise.as_ref());
        let acceleration = script.acceleration_world;

        match self.location.set_kinematic_params(
            map,
            position.x,
            position.y,
            position.z,
            velocity,
            acceleration,
            time,
        ) {
            Ok(()) => self.stats.kinematic_updates += 1,
            Err(err) => warn!(entity = %self.name, %err, "Kinematic update rejected"),
        }
    }

    /// Steps the location and folds the result into the statistics.
    pub fn step(&mut self, world: &SimWorld, time: f64) -> Transform {
        let transform = self.location.step(&world.map, time, &self.options);

        self.stats.steps += 1;
        if self.location.map_pos().is_clamped() {
            self.stats.clamped_steps += 1;
        }
        if let Some(error) = self.horizontal_error(world, time) {
            self.stats.max_horizontal_error = self.stats.max_horizontal_error.max(error);
        }
        self.stats.last_transform = Some(transform);
        transform
    }

    fn horizontal_error(&self, world: &SimWorld, time: f64) -> Option<f64> {
        let script = self.script.as_ref()?;
        let context = world.map.contexts.get(self.location.map_pos().context()).ok()?;
        let truth = context.world_to_local(&script.position_at(time));
        let stepped = self.location.map_pos().local_position();
        Some(((truth.x - stepped.x).powi(2) + (truth.z - stepped.z).powi(2)).sqrt())
    }
}
