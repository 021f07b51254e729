// geoanchor_sim/src/simulation/core/world.rs

//! Builds the collaborator bundle (geodetic service, anchor context, terrain)
//! described by the `[world]` section of a scenario.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use geoanchor_core::prelude::*;

use crate::simulation::config::{TerrainConfig, World};

/// The map plus the handles the runner needs to keep around.
#[derive(Debug)]
pub struct SimWorld {
    pub map: SystemMap,
    pub context: ContextHandle,
    pub terrain: Option<Arc<HeightFieldTerrain>>,
    /// Tiles paged in by blocking clamps so far.
    pub tiles_loaded: Arc<AtomicUsize>,
}

impl SimWorld {
    pub fn build(config: &World) -> Result<Self, MapError> {
        let mut map = SystemMap::new().with_geodetic(Arc::new(Wgs84::default()));
        let origin = config.origin;
        let context =
            map.add_topocentric_context(&config.context_name, origin.lat, origin.lon, origin.alt)?;
        info!(
            context = %config.context_name,
            lat = origin.lat,
            lon = origin.lon,
            "Anchor context created"
        );

        let tiles_loaded = Arc::new(AtomicUsize::new(0));
        let terrain = match &config.terrain {
            Some(terrain_config) => {
                let terrain = Arc::new(build_terrain(context, terrain_config, tiles_loaded.clone())?);
                map.set_terrain(Some(terrain.clone()));
                Some(terrain)
            }
            None => {
                info!("No terrain configured, ground clamps will miss");
                None
            }
        };

        Ok(Self {
            map,
            context,
            terrain,
            tiles_loaded,
        })
    }

    pub fn tiles_loaded(&self) -> usize {
        self.tiles_loaded.load(Ordering::Relaxed)
    }
}

fn build_terrain(
    context: ContextHandle,
    config: &TerrainConfig,
    tiles_loaded: Arc<AtomicUsize>,
) -> Result<HeightFieldTerrain, MapError> {
    let shape = config.shape;
    let latency = Duration::from_millis(config.load_latency_ms);

    // Heights are generated up front; the loader only models the paging delay.
    let loader: TileLoader = Box::new(move |tile| {
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        tiles_loaded.fetch_add(1, Ordering::Relaxed);
        debug!(?tile, "Paged in terrain tile");
        true
    });

    let terrain = HeightFieldTerrain::from_fn(context, config.grid, move |x, z| shape.height_at(x, z))?
        .with_loader(loader);

    let (cols, rows) = terrain.tile_count();
    if config.preload {
        terrain.make_all_resident();
    }
    info!(
        tiles = cols * rows,
        preload = config.preload,
        "Height field terrain ready"
    );
    Ok(terrain)
}
