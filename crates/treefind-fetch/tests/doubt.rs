//! Doubt map stage: freshness rule and the real roughness engine.

use std::cell::RefCell;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use treefind_fetch::{
    DoubtGenerator, DoubtMapStage, DoubtOutcome, ProducedTile, TileDescriptor, TileOutcome,
    TilePaths,
};
use treefind_raster::{GeoReference, Grid, RasterTile};
use treefind_roughness::RoughnessEngine;

#[derive(Default)]
struct CountingGenerator {
    calls: RefCell<Vec<PathBuf>>,
}

impl DoubtGenerator for CountingGenerator {
    fn generate_doubt(&self, source: &Path, output: &Path) -> treefind_fetch::Result<()> {
        self.calls.borrow_mut().push(source.to_path_buf());
        fs::write(output, b"doubt")?;
        Ok(())
    }
}

const TILE: TileDescriptor = TileDescriptor {
    xmin: 566_000,
    xmax: 567_000,
    ymin: 244_000,
    ymax: 245_000,
    size: 1000,
    scale_factor: 1.0,
};

fn produced(paths: &TilePaths) -> ProducedTile {
    ProducedTile {
        index: 1,
        descriptor: TILE,
        path: paths.tile_path(&TILE),
        outcome: TileOutcome::Cached,
    }
}

fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

#[test]
fn test_newer_doubt_map_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let paths = TilePaths::new(dir.path());
    let tile = produced(&paths);
    let doubt = paths.doubt_path(&TILE);
    fs::write(&tile.path, b"tile").unwrap();
    fs::write(&doubt, b"old doubt").unwrap();

    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    set_mtime(&tile.path, base);
    set_mtime(&doubt, base + Duration::from_secs(60));

    let stage = DoubtMapStage::new(CountingGenerator::default(), paths.clone());
    let result = stage.run(&[tile]).unwrap();

    assert!(stage.generator().calls.borrow().is_empty());
    assert_eq!(result[0].outcome, DoubtOutcome::Reused);
    assert_eq!(result[0].path, doubt);
    assert_eq!(fs::read(&doubt).unwrap(), b"old doubt");
}

#[test]
fn test_stale_or_missing_doubt_map_is_regenerated() {
    let dir = tempfile::tempdir().unwrap();
    let paths = TilePaths::new(dir.path());
    let tile = produced(&paths);
    let doubt = paths.doubt_path(&TILE);
    fs::write(&tile.path, b"tile").unwrap();

    let stage = DoubtMapStage::new(CountingGenerator::default(), paths.clone());
    assert_eq!(stage.run(&[tile.clone()]).unwrap()[0].outcome, DoubtOutcome::Generated);

    // Same timestamp is not newer.
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    set_mtime(&tile.path, base);
    set_mtime(&doubt, base);
    assert_eq!(stage.run(&[tile.clone()]).unwrap()[0].outcome, DoubtOutcome::Generated);

    assert_eq!(stage.generator().calls.borrow().len(), 2);
}

#[test]
fn test_roughness_engine_writes_doubt_map_next_to_tile() {
    let dir = tempfile::tempdir().unwrap();
    let paths = TilePaths::new(dir.path());
    let tile = produced(&paths);
    RasterTile::new(
        Grid::from_fn(16, 16, |row, col| if (row + col) % 2 == 0 { 230.0 } else { 226.0 }),
        GeoReference::projected(566_000.0, 245_000.0, 62.5, 2180),
        None,
    )
    .write(&tile.path)
    .unwrap();

    let stage = DoubtMapStage::new(RoughnessEngine::default(), paths.clone());
    let result = stage.run(&[tile]).unwrap();

    let written = RasterTile::from_file(&result[0].path).unwrap();
    assert_eq!(written.dimensions(), (16, 16));
    assert_eq!(written.corners().upper_left, (566_000.0, 245_000.0));
    assert!(written.samples().data().iter().all(|&v| v == 1.0));
}
