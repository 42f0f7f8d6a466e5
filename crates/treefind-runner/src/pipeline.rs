//! The full run: project, fetch, compute doubt maps, load.

use crate::config::RunConfig;
use crate::crs::{project_bbox, CrsTransform};
use crate::loader::BulkLoader;
use crate::Result;
use std::path::PathBuf;
use tracing::info;
use treefind_fetch::{
    DoubtMapStage, DoubtTile, FetchOrchestrator, FetchReport, RasterTools, Sleeper, TilePaths,
    Transport,
};
use treefind_roughness::RoughnessEngine;

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Fetched tiles and counters.
    pub fetch: FetchReport,
    /// Doubt maps, for surface models.
    pub doubt: Vec<DoubtTile>,
}

impl RunReport {
    /// Doubt map files in tile order.
    pub fn doubt_paths(&self) -> Vec<PathBuf> {
        self.doubt.iter().map(|d| d.path.clone()).collect()
    }
}

/// Run the pipeline for `config` with the given collaborators.
pub fn run_pipeline<C, T, R, S, L>(
    config: &RunConfig,
    crs: &C,
    orchestrator: &FetchOrchestrator<T, R, S>,
    loader: &L,
) -> Result<RunReport>
where
    C: CrsTransform + ?Sized,
    T: Transport,
    R: RasterTools,
    S: Sleeper,
    L: BulkLoader + ?Sized,
{
    config.validate()?;

    let projected = project_bbox(crs, &config.bbox);
    info!(
        model = %config.model,
        lat_min = config.bbox.lat_min,
        lat_max = config.bbox.lat_max,
        lon_min = config.bbox.lon_min,
        lon_max = config.bbox.lon_max,
        ulx = projected.ulx,
        uly = projected.uly,
        lrx = projected.lrx,
        lry = projected.lry,
        "Projected bounding box"
    );

    let fetch = orchestrator.run(&projected)?;
    info!(tiles = fetch.tiles.len(), "Downloaded tiles");

    let doubt = if config.model.is_surface_model() {
        let stage = DoubtMapStage::new(
            RoughnessEngine::default(),
            TilePaths::new(&config.fetch.out_dir),
        );
        let doubt = stage.run(&fetch.tiles)?;
        info!(doubt_maps = doubt.len(), "Generated all doubt maps");
        doubt
    } else {
        Vec::new()
    };

    let report = RunReport { fetch, doubt };
    loader.load(config.model.table(), &report.fetch.paths())?;
    if let Some(table) = config.model.doubt_table() {
        loader.load(table, &report.doubt_paths())?;
    }
    Ok(report)
}
