// geoanchor_sim/src/simulation/core/runner.rs

use tracing::{info, warn};

use geoanchor_core::prelude::MapError;

use crate::simulation::config::ScenarioConfig;
use crate::simulation::core::entities::{EntityStats, SimEntity};
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::core::report::RunSummary;
use crate::simulation::core::world::SimWorld;

/// A fully built scenario, ready to be stepped.
#[derive(Debug)]
pub struct SimulationRunner {
    world: SimWorld,
    entities: Vec<SimEntity>,
    rng: SimulationRng,
    duration: f64,
    rate_hz: f64,
    log_steps: bool,
}

impl SimulationRunner {
    pub fn build(config: &ScenarioConfig) -> Result<Self, MapError> {
        let sim = &config.simulation;
        if !(sim.rate_hz.is_finite() && sim.rate_hz > 0.0) {
            return Err(MapError::InvalidInput(format!(
                "step rate must be positive, got {}",
                sim.rate_hz
            )));
        }
        if !(sim.duration_seconds.is_finite() && sim.duration_seconds >= 0.0) {
            return Err(MapError::InvalidInput(format!(
                "duration must be non-negative, got {}",
                sim.duration_seconds
            )));
        }

        let world = SimWorld::build(&config.world)?;
        let mut entities = Vec::with_capacity(config.entities.len());
        for entity_config in &config.entities {
            match SimEntity::spawn(&world, entity_config) {
                Ok(entity) => entities.push(entity),
                Err(err) => {
                    warn!(entity = %entity_config.name, %err, "Failed to spawn entity. Skipping.")
                }
            }
        }
        info!(entities = entities.len(), "Scenario built");

        Ok(Self {
            world,
            entities,
            rng: SimulationRng::new(sim.seed),
            duration: sim.duration_seconds,
            rate_hz: sim.rate_hz,
            log_steps: sim.log_steps,
        })
    }

    pub fn entities(&self) -> &[SimEntity] {
        &self.entities
    }

    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    /// Number of steps after the initial one at `t = 0`.
    pub fn step_count(&self) -> usize {
        (self.duration * self.rate_hz).round() as usize
    }

    /// Advances every entity by one step at `time`.
    pub fn tick(&mut self, time: f64) {
        for entity in &mut self.entities {
            entity.update(&self.world.map, time, &mut self.rng);
            let transform = entity.step(&self.world, time);

            if self.log_steps {
                let p = transform.position;
                let euler = entity.location.map_pos().euler();
                info!(
                    t = time,
                    entity = %entity.name,
                    x = p.x,
                    y = p.y,
                    z = p.z,
                    yaw_deg = euler.yaw.to_degrees(),
                    pitch_deg = euler.pitch.to_degrees(),
                    roll_deg = euler.roll.to_degrees(),
                    clamped = entity.location.map_pos().is_clamped(),
                    "step"
                );
            }
        }
    }

    /// Runs the whole scenario and collects the per-entity statistics.
    pub fn run(&mut self) -> RunSummary {
        let steps = self.step_count();
        info!(steps, rate_hz = self.rate_hz, "Running scenario");
        for i in 0..=steps {
            let time = i as f64 / self.rate_hz;
            self.tick(time);
        }

        RunSummary {
            duration: self.duration,
            steps: steps + 1,
            tiles_loaded: self.world.tiles_loaded(),
            entities: self
                .entities
                .iter()
                .map(|e| (e.name.clone(), e.stats.clone()))
                .collect::<Vec<(String, EntityStats)>>(),
        }
    }
}
