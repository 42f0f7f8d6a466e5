//! End-to-end runs over tiles that are already on disk.

use std::cell::Cell;
use std::fs;
use std::time::{Duration, SystemTime};

use treefind_fetch::{
    DoubtOutcome, ElevationModel, FetchOrchestrator, GdalTools, GridPlanner, RetryPolicy,
    TileOutcome, TilePaths, Transport, TransportError,
};
use treefind_raster::{GeoReference, Grid, RasterTile};
use treefind_runner::crs::project_bbox;
use treefind_runner::loader::Manifest;
use treefind_runner::{run_pipeline, GeoBbox, LoaderKind, ManifestLoader, Puwg1992, RunConfig};

#[derive(Default)]
struct OfflineTransport {
    calls: Cell<usize>,
}

impl Transport for OfflineTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.calls.set(self.calls.get() + 1);
        Err(TransportError {
            url: url.to_string(),
            reason: "offline".to_string(),
        })
    }
}

fn small_bbox() -> GeoBbox {
    GeoBbox {
        lat_min: 50.050,
        lat_max: 50.060,
        lon_min: 19.840,
        lon_max: 19.855,
    }
}

fn config(model: ElevationModel, out_dir: &std::path::Path) -> RunConfig {
    let mut config = RunConfig::new(model);
    config.bbox = small_bbox();
    config.fetch.out_dir = out_dir.to_path_buf();
    config.fetch.retry = RetryPolicy::no_retry();
    config.loader = LoaderKind::Manifest;
    config
}

/// Write a 10x10 tile with a rough patch for every planned tile, dated in the past.
fn seed_tiles(config: &RunConfig) -> usize {
    let planner = GridPlanner::new(config.fetch.tile_size, config.fetch.scale_factor).unwrap();
    let tiles = planner.plan(&project_bbox(&Puwg1992, &config.bbox)).unwrap();
    let paths = TilePaths::new(&config.fetch.out_dir);
    fs::create_dir_all(&config.fetch.out_dir).unwrap();

    for tile in &tiles {
        RasterTile::new(
            Grid::from_fn(10, 10, |row, col| {
                if (3..7).contains(&row) && (3..7).contains(&col) && (row + col) % 2 == 0 {
                    240.0
                } else {
                    220.0
                }
            }),
            GeoReference::projected(tile.xmin as f64, tile.ymax as f64, 100.0, 2180),
            None,
        )
        .write(paths.tile_path(tile))
        .unwrap();
        fs::File::options()
            .write(true)
            .open(paths.tile_path(tile))
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000))
            .unwrap();
    }
    tiles.len()
}

fn read_manifest(dir: &std::path::Path, table: &str) -> Manifest {
    let text = fs::read_to_string(dir.join(format!("{table}.json"))).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[test]
fn test_surface_model_run_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(ElevationModel::Nmpt, dir.path());
    let planned = seed_tiles(&config);
    assert!(planned >= 2);

    let orchestrator = FetchOrchestrator::new(
        config.fetch.clone(),
        OfflineTransport::default(),
        GdalTools::default(),
    );
    let loader = ManifestLoader::new(dir.path());
    let report = run_pipeline(&config, &Puwg1992, &orchestrator, &loader).unwrap();

    assert_eq!(orchestrator.transport().calls.get(), 0);
    assert_eq!(report.fetch.tiles.len(), planned);
    assert!(report.fetch.tiles.iter().all(|t| t.outcome == TileOutcome::Cached));
    assert_eq!(report.doubt.len(), planned);
    assert!(report.doubt.iter().all(|d| d.outcome == DoubtOutcome::Generated));
    for doubt in &report.doubt {
        let written = RasterTile::from_file(&doubt.path).unwrap();
        assert_eq!(written.dimensions(), (10, 10));
    }

    let tiles = read_manifest(dir.path(), "dtcm");
    assert_eq!(tiles.tiles, report.fetch.paths());
    let doubt = read_manifest(dir.path(), "dtcm_doubt");
    assert_eq!(doubt.tiles, report.doubt_paths());

    // A second run reuses the doubt maps.
    let again = run_pipeline(&config, &Puwg1992, &orchestrator, &loader).unwrap();
    assert!(again.doubt.iter().all(|d| d.outcome == DoubtOutcome::Reused));
}

#[test]
fn test_terrain_model_has_no_doubt_maps() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(ElevationModel::Nmt, dir.path());
    seed_tiles(&config);

    let orchestrator = FetchOrchestrator::new(
        config.fetch.clone(),
        OfflineTransport::default(),
        GdalTools::default(),
    );
    let loader = ManifestLoader::new(dir.path());
    let report = run_pipeline(&config, &Puwg1992, &orchestrator, &loader).unwrap();

    assert!(report.doubt.is_empty());
    assert!(dir.path().join("dtm.json").exists());
    assert!(!dir.path().join("dtcm_doubt.json").exists());
}

#[test]
fn test_missing_tile_without_network_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(ElevationModel::Nmt, dir.path());

    let orchestrator = FetchOrchestrator::new(
        config.fetch.clone(),
        OfflineTransport::default(),
        GdalTools::default(),
    );
    let loader = ManifestLoader::new(dir.path());
    let err = run_pipeline(&config, &Puwg1992, &orchestrator, &loader).unwrap_err();

    assert!(err.to_string().contains("after 1 attempts"), "{err}");
    assert_eq!(orchestrator.transport().calls.get(), 1);
}
