//! Sequential per-tile download, conversion and validation.
//!
//! Every tile goes through the same steps:
//!
//! 1. cache check: an existing tile file is taken as done
//! 2. with downloads disabled, a missing tile is left out
//! 3. request with retry on the fixed wait schedule
//! 4. multipart decoding (ASCII grid responses only)
//! 5. conversion to a compressed GeoTIFF at the tile path
//! 6. corner validation against the requested bounds
//!
//! Any error other than a retried transport failure aborts the run. The
//! filesystem is the only state: a rerun picks up every tile already on disk.

use crate::metrics::metric_defs;
use crate::multipart::{extract_to_dir, MultipartDecoder, AAIGRID_PARTS};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::tools::{corner_matches, RasterTools};
use crate::{
    CornerKind, CoverageService, ElevationModel, FetchError, GridPlanner, ProjectedBbox,
    ResponseFormat, Result, TileDescriptor, TilePaths, Transport,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default tile edge in meters.
pub const DEFAULT_TILE_SIZE: i64 = 1000;

/// Default request scale factor.
pub const DEFAULT_SCALE_FACTOR: f64 = 1.0;

/// Processing state of one tile.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchState {
    /// Tile file already present.
    Cached,
    /// Request in flight.
    Fetching {
        /// 1-based attempt number.
        attempt: usize,
        /// Wait taken should this attempt fail.
        next_wait: Option<Duration>,
    },
    /// Splitting a multipart response.
    Decoding,
    /// Converting the response to the tile file.
    Converting,
    /// Checking the tile corners.
    Validating,
    /// Tile file is valid.
    Done,
    /// Tile corners did not match; the run stops.
    MalformedFatal,
    /// Retry schedule used up; the run stops.
    ExhaustedFatal,
}

/// Called on every state change of a tile.
pub type StateCallback = Box<dyn Fn(&TileDescriptor, &FetchState) + Send + Sync>;

/// Settings of one fetch run.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Directory receiving tiles and the response buffer.
    pub out_dir: PathBuf,
    /// Tile edge in meters.
    pub tile_size: i64,
    /// Request scale factor.
    pub scale_factor: f64,
    /// Use only tiles already on disk.
    pub skip_download: bool,
    /// Wait schedule for failed requests.
    pub retry: RetryPolicy,
    /// Coverage endpoint.
    pub service: CoverageService,
}

impl FetchConfig {
    /// Defaults for `service`, writing to `out_dir`.
    pub fn new<P: AsRef<Path>>(service: CoverageService, out_dir: P) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            tile_size: DEFAULT_TILE_SIZE,
            scale_factor: DEFAULT_SCALE_FACTOR,
            skip_download: false,
            retry: RetryPolicy::default(),
            service,
        }
    }

    /// Defaults for a published elevation model, in its usual directory.
    pub fn for_model(model: ElevationModel) -> Self {
        Self::new(model.service(), model.default_out_dir())
    }
}

/// How a produced tile was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOutcome {
    /// Found on disk.
    Cached,
    /// Downloaded and validated in this run.
    Downloaded,
}

/// A tile file ready for loading.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedTile {
    /// 1-based position in the planned sequence.
    pub index: usize,
    /// Tile bounds.
    pub descriptor: TileDescriptor,
    /// Tile file.
    pub path: PathBuf,
    /// How it was obtained.
    pub outcome: TileOutcome,
}

/// Counters of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Tiles found on disk.
    pub tiles_cached: usize,
    /// Tiles downloaded.
    pub tiles_downloaded: usize,
    /// Missing tiles left out with downloads disabled.
    pub tiles_skipped: usize,
    /// Response bytes received.
    pub bytes_downloaded: u64,
    /// Failed attempts that were retried.
    pub retries: usize,
}

/// Result of a fetch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchReport {
    /// Produced tiles in planning order.
    pub tiles: Vec<ProducedTile>,
    /// Run counters.
    pub stats: FetchStats,
}

impl FetchReport {
    /// Tile files in planning order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.tiles.iter().map(|t| t.path.clone()).collect()
    }
}

/// Drives tiles through download, conversion and validation, one at a time.
pub struct FetchOrchestrator<T, R, S = ThreadSleeper> {
    config: FetchConfig,
    paths: TilePaths,
    transport: T,
    tools: R,
    sleeper: S,
    decoder: MultipartDecoder,
    on_state: Option<StateCallback>,
}

impl<T, R, S> std::fmt::Debug for FetchOrchestrator<T, R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Transport, R: RasterTools> FetchOrchestrator<T, R> {
    /// Orchestrator sleeping on the current thread between attempts.
    pub fn new(config: FetchConfig, transport: T, tools: R) -> Self {
        Self {
            paths: TilePaths::new(&config.out_dir),
            config,
            transport,
            tools,
            sleeper: ThreadSleeper,
            decoder: MultipartDecoder::default(),
            on_state: None,
        }
    }
}

impl<T: Transport, R: RasterTools, S: Sleeper> FetchOrchestrator<T, R, S> {
    /// Replace the sleeper used between attempts.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> FetchOrchestrator<T, R, S2> {
        FetchOrchestrator {
            config: self.config,
            paths: self.paths,
            transport: self.transport,
            tools: self.tools,
            sleeper,
            decoder: self.decoder,
            on_state: self.on_state,
        }
    }

    /// Observe tile state changes.
    pub fn with_state_callback(mut self, callback: StateCallback) -> Self {
        self.on_state = Some(callback);
        self
    }

    /// Run settings.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Output path scheme.
    pub fn paths(&self) -> &TilePaths {
        &self.paths
    }

    /// Transport in use.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Raster tools in use.
    pub fn tools(&self) -> &R {
        &self.tools
    }

    /// Plan tiles over `bbox` and process them in order.
    pub fn run(&self, bbox: &ProjectedBbox) -> Result<FetchReport> {
        let planner = GridPlanner::new(self.config.tile_size, self.config.scale_factor)?;
        let tiles = planner.plan(bbox)?;
        self.run_tiles(&tiles)
    }

    /// Process `tiles` in order.
    pub fn run_tiles(&self, tiles: &[TileDescriptor]) -> Result<FetchReport> {
        fs::create_dir_all(self.paths.out_dir())?;
        info!(
            tiles = tiles.len(),
            out_dir = %self.paths.out_dir().display(),
            coverage = %self.config.service.coverage_id,
            "Fetching tiles"
        );

        let mut report = FetchReport::default();
        for (i, tile) in tiles.iter().enumerate() {
            let index = i + 1;
            let produced = self.process_tile(index, tiles.len(), tile, &mut report.stats)?;
            if let Some(produced) = produced {
                report.tiles.push(produced);
            }
        }

        info!(
            produced = report.tiles.len(),
            cached = report.stats.tiles_cached,
            downloaded = report.stats.tiles_downloaded,
            skipped = report.stats.tiles_skipped,
            bytes = report.stats.bytes_downloaded,
            retries = report.stats.retries,
            "Finished fetching tiles"
        );
        Ok(report)
    }

    fn emit(&self, tile: &TileDescriptor, state: FetchState) {
        debug!(tile = %tile.bounds_label(), ?state, "Tile state");
        if let Some(callback) = &self.on_state {
            callback(tile, &state);
        }
    }

    fn process_tile(
        &self,
        index: usize,
        total: usize,
        tile: &TileDescriptor,
        stats: &mut FetchStats,
    ) -> Result<Option<ProducedTile>> {
        let tif_path = self.paths.tile_path(tile);
        info!(index, total, tile = %tile.bounds_label(), "Processing tile");

        if tif_path.exists() {
            info!(index, path = %tif_path.display(), "Tile already exists, skipping download");
            self.emit(tile, FetchState::Cached);
            stats.tiles_cached += 1;
            metric_defs::TILES_CACHED.increment(1);
            return Ok(Some(ProducedTile {
                index,
                descriptor: *tile,
                path: tif_path,
                outcome: TileOutcome::Cached,
            }));
        }

        if self.config.skip_download {
            info!(index, path = %tif_path.display(), "Downloads disabled, leaving tile out");
            stats.tiles_skipped += 1;
            metric_defs::TILES_SKIPPED.increment(1);
            return Ok(None);
        }

        let url = self.config.service.request_url(tile)?;
        let body = self.fetch_with_retry(&url, tile, stats)?;
        stats.bytes_downloaded += body.len() as u64;
        metric_defs::FETCH_BYTES.increment(body.len() as u64);

        let buffer = self.paths.buffer_path();
        fs::write(&buffer, &body)?;
        debug!(path = %buffer.display(), bytes = body.len(), "Response buffered");

        self.materialize(tile, &body, &buffer, &tif_path)?;
        self.validate(tile, &tif_path)?;

        self.emit(tile, FetchState::Done);
        stats.tiles_downloaded += 1;
        metric_defs::TILES_DOWNLOADED.increment(1);
        info!(index, path = %tif_path.display(), "Finished tile");

        Ok(Some(ProducedTile {
            index,
            descriptor: *tile,
            path: tif_path,
            outcome: TileOutcome::Downloaded,
        }))
    }

    fn fetch_with_retry(
        &self,
        url: &str,
        tile: &TileDescriptor,
        stats: &mut FetchStats,
    ) -> Result<Vec<u8>> {
        let mut backoff = self.config.retry.backoff();
        loop {
            let attempt = backoff.attempt();
            self.emit(
                tile,
                FetchState::Fetching {
                    attempt,
                    next_wait: backoff.peek(),
                },
            );
            debug!(url, attempt, "Requesting coverage");

            let error = match self.transport.fetch(url) {
                Ok(body) => {
                    info!(attempt, bytes = body.len(), "Download OK");
                    return Ok(body);
                }
                Err(e) => e,
            };

            let wait = backoff.fail();
            warn!(
                attempt,
                wait_secs = wait.map(|w| w.as_secs()),
                error = %error,
                "Download failed"
            );
            if let Some(wait) = wait {
                self.sleeper.sleep(wait);
            }

            if backoff.is_exhausted() {
                self.emit(tile, FetchState::ExhaustedFatal);
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: backoff.failed(),
                    last_error: error,
                });
            }
            stats.retries += 1;
            metric_defs::FETCH_RETRIES.increment(1);
        }
    }

    /// Turn a buffered response into the tile file at `tif_path`.
    fn materialize(
        &self,
        tile: &TileDescriptor,
        body: &[u8],
        buffer: &Path,
        tif_path: &Path,
    ) -> Result<()> {
        match &self.config.service.format {
            ResponseFormat::GeoTiff => {
                self.emit(tile, FetchState::Converting);
                move_file(buffer, tif_path)
            }
            ResponseFormat::AsciiGrid => {
                self.emit(tile, FetchState::Decoding);
                let parts = self.decoder.decode(body, Some(&AAIGRID_PARTS))?;
                // Side files must sit next to the grid for the converter to
                // pick up the projection.
                let files = extract_to_dir(&parts, self.paths.out_dir())?;

                self.emit(tile, FetchState::Converting);
                self.tools.convert(&files[0], tif_path)
            }
            ResponseFormat::Other(mime) => Err(FetchError::UnsupportedFormat(mime.clone())),
        }
    }

    fn validate(&self, tile: &TileDescriptor, tif_path: &Path) -> Result<()> {
        self.emit(tile, FetchState::Validating);
        let corners = self.tools.read_corners(tif_path)?;

        let checks = [
            (CornerKind::UpperLeft, (tile.xmin, tile.ymax), corners.upper_left),
            (CornerKind::LowerRight, (tile.xmax, tile.ymin), corners.lower_right),
        ];
        for (corner, expected, reported) in checks {
            if corner_matches(expected, reported) {
                continue;
            }
            let malformed_path = TilePaths::malformed_path(tif_path);
            let error = FetchError::GeometryMismatch {
                corner,
                expected,
                reported,
                xmin: tile.xmin,
                xmax: tile.xmax,
                ymin: tile.ymin,
                ymax: tile.ymax,
                malformed_path: malformed_path.clone(),
            };
            if let Err(e) = fs::rename(tif_path, &malformed_path) {
                warn!(
                    path = %tif_path.display(),
                    malformed = %malformed_path.display(),
                    error = %e,
                    "Could not set the malformed tile aside"
                );
            }
            self.emit(tile, FetchState::MalformedFatal);
            return Err(error);
        }
        Ok(())
    }
}

/// Rename `from` to `to`, copying across filesystems when needed.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = FetchConfig::for_model(ElevationModel::Nmpt);
        assert_eq!(config.out_dir, PathBuf::from("tiles/nmpt"));
        assert_eq!(config.tile_size, 1000);
        assert_eq!(config.scale_factor, 1.0);
        assert!(!config.skip_download);
        assert_eq!(config.retry.max_attempts(), 5);
        assert_eq!(config.service.format, ResponseFormat::AsciiGrid);
    }

    #[test]
    fn test_move_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("buffer.txt");
        let to = dir.path().join("tile.tif");
        fs::write(&from, b"data").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"data");
    }

    #[test]
    fn test_report_paths_keep_order() {
        let tile = TileDescriptor {
            xmin: 0,
            xmax: 1000,
            ymin: 0,
            ymax: 1000,
            size: 1000,
            scale_factor: 1.0,
        };
        let report = FetchReport {
            tiles: vec![
                ProducedTile {
                    index: 1,
                    descriptor: tile,
                    path: PathBuf::from("b.tif"),
                    outcome: TileOutcome::Cached,
                },
                ProducedTile {
                    index: 2,
                    descriptor: tile,
                    path: PathBuf::from("a.tif"),
                    outcome: TileOutcome::Downloaded,
                },
            ],
            stats: FetchStats::default(),
        };
        assert_eq!(report.paths(), vec![PathBuf::from("b.tif"), PathBuf::from("a.tif")]);
    }
}
