//! Hand-over of finished tiles to a spatial database.

use crate::config::{LoaderKind, PgConnection};
use crate::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info};

/// SRID of every loaded raster.
pub const TILE_SRID: u32 = 2180;

/// Loads an ordered list of raster files into a named table.
pub trait BulkLoader {
    /// Replace `table` with the contents of `tiles`.
    fn load(&self, table: &str, tiles: &[PathBuf]) -> Result<()>;
}

/// Build the loader selected by `kind`.
pub fn build_loader(kind: LoaderKind, out_dir: &Path, conn: &PgConnection) -> Box<dyn BulkLoader> {
    match kind {
        LoaderKind::Manifest => Box::new(ManifestLoader::new(out_dir)),
        LoaderKind::Postgis => Box::new(PostgisLoader::new(conn.clone())),
        LoaderKind::Disabled => Box::new(NoopLoader),
    }
}

/// Contents of a manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Target table.
    pub table: String,
    /// SRID of the rasters.
    pub srid: u32,
    /// Raster files in load order.
    pub tiles: Vec<PathBuf>,
}

/// Writes `<dir>/<table>.json` instead of touching a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestLoader {
    dir: PathBuf,
}

impl ManifestLoader {
    /// Loader writing manifests into `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Manifest path for `table`.
    pub fn manifest_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }
}

impl BulkLoader for ManifestLoader {
    fn load(&self, table: &str, tiles: &[PathBuf]) -> Result<()> {
        let manifest = Manifest {
            table: table.to_string(),
            srid: TILE_SRID,
            tiles: tiles.to_vec(),
        };
        fs::create_dir_all(&self.dir)?;
        let path = self.manifest_path(table);
        fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
        info!(table, tiles = tiles.len(), path = %path.display(), "Wrote tile manifest");
        Ok(())
    }
}

/// Skips loading.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoader;

impl BulkLoader for NoopLoader {
    fn load(&self, table: &str, tiles: &[PathBuf]) -> Result<()> {
        info!(table, tiles = tiles.len(), "Loading disabled");
        Ok(())
    }
}

/// Loads rasters into PostGIS with `raster2pgsql` piped into `psql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgisLoader {
    conn: PgConnection,
    psql: String,
    raster2pgsql: String,
}

impl PostgisLoader {
    /// Loader using the tools on `PATH`.
    pub fn new(conn: PgConnection) -> Self {
        Self {
            conn,
            psql: "psql".to_string(),
            raster2pgsql: "raster2pgsql".to_string(),
        }
    }

    fn psql(&self) -> Command {
        let mut cmd = Command::new(&self.psql);
        cmd.args(psql_args(&self.conn))
            .env("PGPASSWORD", &self.conn.password);
        cmd
    }

    fn execute_sql(&self, sql: &str) -> Result<()> {
        debug!(sql, "Running SQL");
        let output = self.psql().arg("-c").arg(sql).output()?;
        check_status(&self.psql, &output.status, &output.stderr)
    }

    fn load_file(&self, table: &str, file: &Path, first: bool) -> Result<()> {
        let mut producer = Command::new(&self.raster2pgsql)
            .args(raster2pgsql_args(file, table, first))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let sql = producer.stdout.take().ok_or_else(|| RunnerError::ToolFailed {
            tool: self.raster2pgsql.clone(),
            status: "no stdout".to_string(),
            output: String::new(),
        })?;

        // Drained concurrently: a full stderr pipe would stall the producer.
        let stderr = producer.stderr.take();
        let drain = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_end(&mut buf);
            }
            buf
        });

        let consumer = self.psql().stdin(Stdio::from(sql)).output()?;
        let status = producer.wait()?;
        let produced_stderr = drain.join().unwrap_or_default();

        check_status(&self.raster2pgsql, &status, &produced_stderr)?;
        check_status(&self.psql, &consumer.status, &consumer.stderr)
    }
}

impl BulkLoader for PostgisLoader {
    fn load(&self, table: &str, tiles: &[PathBuf]) -> Result<()> {
        info!(table, tiles = tiles.len(), host = %self.conn.host, "Uploading tiles");
        self.execute_sql("CREATE EXTENSION IF NOT EXISTS postgis;")?;
        self.execute_sql("CREATE EXTENSION IF NOT EXISTS postgis_raster;")?;

        info!(table, "Dropping the target table if it exists");
        self.execute_sql(&format!("DROP TABLE IF EXISTS {table} CASCADE;"))?;

        for (i, file) in tiles.iter().enumerate() {
            self.load_file(table, file, i == 0)?;
            debug!(table, index = i + 1, file = %file.display(), "Loaded tile");
        }
        info!(table, "Finished loading");
        Ok(())
    }
}

/// Connection arguments for `psql`.
pub fn psql_args(conn: &PgConnection) -> Vec<String> {
    vec![
        "-h".to_string(),
        conn.host.clone(),
        "-p".to_string(),
        conn.port.to_string(),
        "-U".to_string(),
        conn.user.clone(),
        "-d".to_string(),
        conn.database.clone(),
    ]
}

/// Arguments for `raster2pgsql` loading `file` into `public.<table>`.
///
/// The first file creates the table (`-I` also builds the spatial index),
/// later files append to it.
pub fn raster2pgsql_args(file: &Path, table: &str, first: bool) -> Vec<OsString> {
    let mode = if first { "-I" } else { "-a" };
    let srid = TILE_SRID.to_string();
    let mut args: Vec<OsString> = ["-s", srid.as_str(), "-Y", "-M", mode, "-t", "auto"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(file.as_os_str().to_os_string());
    args.push(OsString::from(format!("public.{table}")));
    args
}

fn check_status(tool: &str, status: &std::process::ExitStatus, stderr: &[u8]) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    Err(RunnerError::ToolFailed {
        tool: tool.to_string(),
        status: status.to_string(),
        output: String::from_utf8_lossy(stderr).trim().to_string(),
    })
}
