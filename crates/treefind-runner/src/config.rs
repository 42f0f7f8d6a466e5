//! Run configuration assembled from the command line and environment.

use crate::{Result, RunnerError};
use std::path::PathBuf;
use treefind_fetch::{ElevationModel, FetchConfig};

/// Default box: the road up to the Kraków zoo.
pub const DEFAULT_LAT_MIN: f64 = 50.04183857007973;
/// See [`DEFAULT_LAT_MIN`].
pub const DEFAULT_LAT_MAX: f64 = 50.06514819273997;
/// See [`DEFAULT_LAT_MIN`].
pub const DEFAULT_LON_MIN: f64 = 19.828946554412852;
/// See [`DEFAULT_LAT_MIN`].
pub const DEFAULT_LON_MAX: f64 = 19.871964006870684;

/// Geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBbox {
    /// South edge.
    pub lat_min: f64,
    /// North edge.
    pub lat_max: f64,
    /// West edge.
    pub lon_min: f64,
    /// East edge.
    pub lon_max: f64,
}

impl Default for GeoBbox {
    fn default() -> Self {
        Self {
            lat_min: DEFAULT_LAT_MIN,
            lat_max: DEFAULT_LAT_MAX,
            lon_min: DEFAULT_LON_MIN,
            lon_max: DEFAULT_LON_MAX,
        }
    }
}

impl GeoBbox {
    /// Check ranges and ordering.
    pub fn validate(&self) -> Result<()> {
        let in_range = (-90.0..=90.0).contains(&self.lat_min)
            && (-90.0..=90.0).contains(&self.lat_max)
            && (-180.0..=180.0).contains(&self.lon_min)
            && (-180.0..=180.0).contains(&self.lon_max);
        if !in_range {
            return Err(RunnerError::Config(format!("bounding box out of range: {self:?}")));
        }
        if self.lat_min >= self.lat_max || self.lon_min >= self.lon_max {
            return Err(RunnerError::Config(format!(
                "bounding box must have lat_min < lat_max and lon_min < lon_max: {self:?}"
            )));
        }
        Ok(())
    }
}

/// Where fetched tiles are handed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LoaderKind {
    /// Write `<out_dir>/<table>.json` listing the tiles.
    Manifest,
    /// Load into PostGIS with `raster2pgsql | psql`.
    Postgis,
    /// Do not load.
    #[value(name = "none")]
    Disabled,
}

/// PostgreSQL connection settings passed to `psql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConnection {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Role.
    pub user: String,
    /// Database.
    pub database: String,
    /// Password, exported as `PGPASSWORD` to the tools.
    pub password: String,
}

impl Default for PgConnection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5439,
            user: "postgres".to_string(),
            database: "osm".to_string(),
            password: "postgres".to_string(),
        }
    }
}

/// Everything a `treefind fetch` run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Area to cover.
    pub bbox: GeoBbox,
    /// Elevation model to fetch.
    pub model: ElevationModel,
    /// Fetch settings.
    pub fetch: FetchConfig,
    /// Loader selection.
    pub loader: LoaderKind,
    /// Database connection for [`LoaderKind::Postgis`].
    pub postgres: PgConnection,
}

impl RunConfig {
    /// Defaults for `model`.
    pub fn new(model: ElevationModel) -> Self {
        Self {
            bbox: GeoBbox::default(),
            model,
            fetch: FetchConfig::for_model(model),
            loader: LoaderKind::Manifest,
            postgres: PgConnection::default(),
        }
    }

    /// Output directory.
    pub fn out_dir(&self) -> PathBuf {
        self.fetch.out_dir.clone()
    }

    /// Check the settings that the fetch crate cannot check itself.
    pub fn validate(&self) -> Result<()> {
        self.bbox.validate()?;
        if self.fetch.tile_size <= 0 {
            return Err(RunnerError::Config(format!(
                "tile size must be positive, got {}",
                self.fetch.tile_size
            )));
        }
        if !(self.fetch.scale_factor.is_finite() && self.fetch.scale_factor > 0.0) {
            return Err(RunnerError::Config(format!(
                "scale factor must be positive, got {}",
                self.fetch.scale_factor
            )));
        }
        Ok(())
    }
}
