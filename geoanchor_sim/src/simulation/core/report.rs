// geoanchor_sim/src/simulation/core/report.rs

use std::fmt;

use crate::simulation::core::entities::EntityStats;

/// What a finished run hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub duration: f64,
    pub steps: usize,
    pub tiles_loaded: usize,
    pub entities: Vec<(String, EntityStats)>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} steps over {:.2} s, {} terrain tiles paged in",
            self.steps, self.duration, self.tiles_loaded
        )?;
        writeln!(
            f,
            "{:<16} {:>7} {:>7} {:>8} {:>10} {:>10} {:>10} {:>10}",
            "entity", "steps", "clamped", "updates", "max err m", "x", "y", "z"
        )?;
        for (name, stats) in &self.entities {
            let clamped = if stats.steps == 0 {
                0.0
            } else {
                100.0 * stats.clamped_steps as f64 / stats.steps as f64
            };
            write!(
                f,
                "{:<16} {:>7} {:>6.1}% {:>8} {:>10.3}",
                name, stats.steps, clamped, stats.kinematic_updates, stats.max_horizontal_error
            )?;
            match &stats.last_transform {
                Some(tf) => writeln!(
                    f,
                    " {:>10.3} {:>10.3} {:>10.3}",
                    tf.position.x, tf.position.y, tf.position.z
                )?,
                None => writeln!(f, " {:>10} {:>10} {:>10}", "-", "-", "-")?,
            }
        }
        Ok(())
    }
}
