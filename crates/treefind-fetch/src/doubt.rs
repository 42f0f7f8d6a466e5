//! Doubt maps for fetched surface model tiles.
//!
//! A doubt map is recomputed unless it is strictly newer than its source
//! tile.

use crate::metrics::metric_defs;
use crate::{ProducedTile, Result, TilePaths};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::info;
use treefind_roughness::RoughnessEngine;

/// Computes a doubt map from one tile file into another.
pub trait DoubtGenerator {
    /// Read `source`, write its doubt map to `output`.
    fn generate_doubt(&self, source: &Path, output: &Path) -> Result<()>;
}

impl DoubtGenerator for RoughnessEngine {
    fn generate_doubt(&self, source: &Path, output: &Path) -> Result<()> {
        self.generate(source, output, false)?;
        Ok(())
    }
}

/// Whether a derived file with modification time `derived` is up to date
/// with a source modified at `source`.
pub fn is_fresh(derived: Option<SystemTime>, source: SystemTime) -> bool {
    derived.is_some_and(|derived| derived > source)
}

/// Modification time of `path`, or `None` if it does not exist.
pub fn modified_time(path: &Path) -> Result<Option<SystemTime>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.modified()?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// How a doubt map was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoubtOutcome {
    /// Computed in this run.
    Generated,
    /// Existing file newer than its source.
    Reused,
}

/// A doubt map ready for loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoubtTile {
    /// Source tile file.
    pub source: PathBuf,
    /// Doubt map file.
    pub path: PathBuf,
    /// How it was obtained.
    pub outcome: DoubtOutcome,
}

/// Produces doubt maps for a list of tiles, reusing fresh ones.
#[derive(Debug, Clone)]
pub struct DoubtMapStage<G> {
    generator: G,
    paths: TilePaths,
}

impl<G: DoubtGenerator> DoubtMapStage<G> {
    /// Stage writing next to the tiles of `paths`.
    pub fn new(generator: G, paths: TilePaths) -> Self {
        Self { generator, paths }
    }

    /// Generator in use.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Doubt maps for `tiles`, in the same order.
    pub fn run(&self, tiles: &[ProducedTile]) -> Result<Vec<DoubtTile>> {
        info!(tiles = tiles.len(), "Computing doubt maps");
        let mut doubt_tiles = Vec::with_capacity(tiles.len());
        for (i, tile) in tiles.iter().enumerate() {
            let output = self.paths.doubt_path(&tile.descriptor);
            let outcome = self.ensure(&tile.path, &output)?;
            info!(
                index = i + 1,
                total = tiles.len(),
                path = %output.display(),
                ?outcome,
                "Doubt map ready"
            );
            doubt_tiles.push(DoubtTile {
                source: tile.path.clone(),
                path: output,
                outcome,
            });
        }
        Ok(doubt_tiles)
    }

    /// Bring `output` up to date with `source`.
    pub fn ensure(&self, source: &Path, output: &Path) -> Result<DoubtOutcome> {
        let source_time = fs::metadata(source)?.modified()?;
        if is_fresh(modified_time(output)?, source_time) {
            info!(
                path = %output.display(),
                source = %source.display(),
                "Doubt map is newer than its tile, skipping"
            );
            metric_defs::DOUBT_REUSED.increment(1);
            return Ok(DoubtOutcome::Reused);
        }

        self.generator.generate_doubt(source, output)?;
        metric_defs::DOUBT_GENERATED.increment(1);
        Ok(DoubtOutcome::Generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_is_fresh_requires_strictly_newer() {
        let source = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        assert!(is_fresh(Some(source + Duration::from_millis(1)), source));
        assert!(!is_fresh(Some(source), source));
        assert!(!is_fresh(Some(source - Duration::from_secs(1)), source));
        assert!(!is_fresh(None, source));
    }

    #[test]
    fn test_modified_time_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(modified_time(&dir.path().join("absent.tif")).unwrap(), None);
    }
}
