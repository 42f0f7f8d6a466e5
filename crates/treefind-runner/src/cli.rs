//! Command line interface of the `treefind` binary.

use crate::config::{
    GeoBbox, LoaderKind, PgConnection, RunConfig, DEFAULT_LAT_MAX, DEFAULT_LAT_MIN,
    DEFAULT_LON_MAX, DEFAULT_LON_MIN,
};
use crate::crs::Puwg1992;
use crate::loader::build_loader;
use crate::pipeline::{run_pipeline, RunReport};
use crate::Result;
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use treefind_fetch::multipart::{extract_to_dir, MultipartDecoder};
use treefind_fetch::{
    ElevationModel, FetchConfig, FetchOrchestrator, GdalTools, HttpTransport, DEFAULT_SCALE_FACTOR,
    DEFAULT_TILE_SIZE,
};
use treefind_roughness::{DoubtValues, RoughnessEngine, RoughnessParams};

#[derive(Parser, Debug)]
#[command(name = "treefind")]
#[command(about = "Fetch elevation tiles and flag irregular surface patches")]
pub struct Cli {
    /// Log filter (e.g. `debug`, `treefind_fetch=trace`); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch all tiles of a bounding box, compute doubt maps and load them
    Fetch(FetchArgs),
    /// Compute the doubt map of one GeoTIFF
    Doubt(DoubtArgs),
    /// Split a saved multi-part coverage response into files
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// South edge in degrees
    #[arg(long, env = "LAT_MIN", default_value_t = DEFAULT_LAT_MIN, allow_hyphen_values = true)]
    pub lat_min: f64,

    /// North edge in degrees
    #[arg(long, env = "LAT_MAX", default_value_t = DEFAULT_LAT_MAX, allow_hyphen_values = true)]
    pub lat_max: f64,

    /// West edge in degrees
    #[arg(long, env = "LON_MIN", default_value_t = DEFAULT_LON_MIN, allow_hyphen_values = true)]
    pub lon_min: f64,

    /// East edge in degrees
    #[arg(long, env = "LON_MAX", default_value_t = DEFAULT_LON_MAX, allow_hyphen_values = true)]
    pub lon_max: f64,

    /// Elevation model: NMT (terrain) or NMPT (surface)
    #[arg(long, env = "MODEL", default_value = "NMPT")]
    pub model: ElevationModel,

    /// Only use tiles already on disk
    #[arg(long, env = "SKIP_DOWNLOAD")]
    pub skip_download: bool,

    /// Tile edge in meters
    #[arg(long, env = "TILE_SIZE", default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_size: i64,

    /// Scale factor requested from the service
    #[arg(long, env = "SCALE_FACTOR", default_value_t = DEFAULT_SCALE_FACTOR)]
    pub scale_factor: f64,

    /// Output directory (default: tiles/nmt or tiles/nmpt)
    #[arg(long, env = "OUT_DIR")]
    pub out_dir: Option<PathBuf>,

    /// Coverage service endpoint (default: the model's geoportal endpoint)
    #[arg(long, env = "WCS_BASE")]
    pub wcs_url: Option<String>,

    /// Where to hand the finished tiles
    #[arg(long, value_enum, default_value = "manifest")]
    pub loader: LoaderKind,

    /// PostgreSQL host
    #[arg(long, env = "PGHOST", default_value = "localhost")]
    pub pg_host: String,

    /// PostgreSQL port
    #[arg(long, env = "PGPORT", default_value_t = 5439)]
    pub pg_port: u16,

    /// PostgreSQL user
    #[arg(long, env = "PGUSER", default_value = "postgres")]
    pub pg_user: String,

    /// PostgreSQL database
    #[arg(long, env = "PGDATABASE", default_value = "osm")]
    pub pg_database: String,

    /// PostgreSQL password
    #[arg(long, env = "PGPASSWORD", default_value = "postgres", hide_env_values = true)]
    pub pg_password: String,
}

impl FetchArgs {
    /// Assemble the run configuration.
    pub fn into_config(self) -> Result<RunConfig> {
        let mut service = self.model.service();
        if let Some(url) = self.wcs_url {
            service.base_url = url;
        }
        let out_dir = self
            .out_dir
            .unwrap_or_else(|| PathBuf::from(self.model.default_out_dir()));

        let mut fetch = FetchConfig::new(service, out_dir);
        fetch.tile_size = self.tile_size;
        fetch.scale_factor = self.scale_factor;
        fetch.skip_download = self.skip_download;

        let config = RunConfig {
            bbox: GeoBbox {
                lat_min: self.lat_min,
                lat_max: self.lat_max,
                lon_min: self.lon_min,
                lon_max: self.lon_max,
            },
            model: self.model,
            fetch,
            loader: self.loader,
            postgres: PgConnection {
                host: self.pg_host,
                port: self.pg_port,
                user: self.pg_user,
                database: self.pg_database,
                password: self.pg_password,
            },
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct DoubtArgs {
    /// Source GeoTIFF
    pub input: PathBuf,

    /// Doubt map to write
    pub output: PathBuf,

    /// Also write PNG previews of the intermediate stages
    #[arg(long)]
    pub png: bool,

    /// Write the continuous score instead of the cleaned mask
    #[arg(long)]
    pub continuous: bool,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Saved multi-part response body
    pub input: PathBuf,

    /// Directory for the extracted parts
    #[arg(default_value = ".")]
    pub out_dir: PathBuf,
}

/// Execute a parsed command.
pub fn execute(command: Command) -> Result<()> {
    match command {
        Command::Fetch(args) => {
            let config = args.into_config()?;
            fetch(&config)?;
        }
        Command::Doubt(args) => doubt(&args)?,
        Command::Extract(args) => {
            extract(&args)?;
        }
    }
    Ok(())
}

/// `treefind fetch`
pub fn fetch(config: &RunConfig) -> Result<RunReport> {
    let orchestrator = FetchOrchestrator::new(
        config.fetch.clone(),
        HttpTransport::new()?,
        GdalTools::default(),
    );
    let loader = build_loader(config.loader, &config.fetch.out_dir, &config.postgres);
    let report = run_pipeline(config, &Puwg1992, &orchestrator, loader.as_ref())?;

    let stats = report.fetch.stats;
    info!(
        tiles = report.fetch.tiles.len(),
        cached = stats.tiles_cached,
        downloaded = stats.tiles_downloaded,
        skipped = stats.tiles_skipped,
        doubt_maps = report.doubt.len(),
        "Finished"
    );
    Ok(report)
}

/// `treefind doubt`
pub fn doubt(args: &DoubtArgs) -> Result<()> {
    let engine = RoughnessEngine::new(RoughnessParams {
        binarize: !args.continuous,
        ..RoughnessParams::default()
    });
    let values = engine.generate(&args.input, &args.output, args.png)?;
    let kind = match values {
        DoubtValues::Mask(_) => "mask",
        DoubtValues::Score(_) => "score",
    };
    info!(output = %args.output.display(), kind, "Generated doubt map");
    Ok(())
}

/// `treefind extract`
pub fn extract(args: &ExtractArgs) -> Result<Vec<PathBuf>> {
    info!(input = %args.input.display(), "Extracting parts of multipart body");
    let body = fs::read(&args.input)?;
    let parts = MultipartDecoder::default().decode(&body, None)?;
    Ok(extract_to_dir(&parts, &args.out_dir)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_args_build_config() {
        let cli = Cli::try_parse_from([
            "treefind",
            "fetch",
            "--model",
            "nmt",
            "--tile-size",
            "500",
            "--scale-factor",
            "0.5",
            "--out-dir",
            "/tmp/tiles",
            "--loader",
            "none",
            "--pg-port",
            "5432",
        ])
        .unwrap();

        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch command");
        };
        let config = args.into_config().unwrap();
        assert_eq!(config.model, ElevationModel::Nmt);
        assert_eq!(config.fetch.tile_size, 500);
        assert_eq!(config.fetch.scale_factor, 0.5);
        assert_eq!(config.fetch.out_dir, PathBuf::from("/tmp/tiles"));
        assert_eq!(config.fetch.service.coverage_id, "DTM_PL-KRON86-NH_TIFF");
        assert_eq!(config.loader, LoaderKind::Disabled);
        assert_eq!(config.postgres.port, 5432);
    }

    #[test]
    fn test_doubt_args() {
        let cli = Cli::try_parse_from([
            "treefind",
            "--log-level",
            "debug",
            "doubt",
            "a.tif",
            "b.tif",
            "--png",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Doubt(args) => {
                assert_eq!(args.input, PathBuf::from("a.tif"));
                assert!(args.png);
                assert!(!args.continuous);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_extract_default_dir() {
        let cli = Cli::try_parse_from(["treefind", "extract", "buffer.txt"]).unwrap();
        match cli.command {
            Command::Extract(args) => assert_eq!(args.out_dir, PathBuf::from(".")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
