//! External raster tools: format conversion and geometry readback.

use crate::error::CornerKind;
use crate::{FetchError, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;
use treefind_raster::Corners;

/// Conversion and inspection of raster files by an external tool.
pub trait RasterTools {
    /// Convert `input` into a compressed, georeferenced GeoTIFF at `output`.
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;

    /// Upper-left and lower-right corners of the raster at `path`.
    fn read_corners(&self, path: &Path) -> Result<Corners>;
}

/// [`RasterTools`] backed by the GDAL command line utilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GdalTools {
    translate: String,
    info: String,
}

impl Default for GdalTools {
    fn default() -> Self {
        Self {
            translate: "gdal_translate".to_string(),
            info: "gdalinfo".to_string(),
        }
    }
}

impl GdalTools {
    fn run(&self, program: &str, args: &[&std::ffi::OsStr]) -> Result<String> {
        debug!(program, ?args, "Running external tool");
        let output = Command::new(program).args(args).output()?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::ToolFailed {
                tool: program.to_string(),
                status: output.status.to_string(),
                output: format!("{}{}", stdout, stderr).trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

impl RasterTools for GdalTools {
    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        self.run(
            &self.translate,
            &[
                "-of".as_ref(),
                "GTiff".as_ref(),
                "-co".as_ref(),
                "COMPRESS=LZW".as_ref(),
                input.as_os_str(),
                output.as_os_str(),
            ],
        )?;
        Ok(())
    }

    fn read_corners(&self, path: &Path) -> Result<Corners> {
        let report = self.run(&self.info, &[path.as_os_str()])?;
        parse_corners(&report).map_err(|reason| FetchError::CornerParse {
            path: path.to_path_buf(),
            reason,
        })
    }
}

/// Parse the `Upper Left (x, y)` and `Lower Right (x, y)` lines of a
/// `gdalinfo` report.
pub fn parse_corners(report: &str) -> std::result::Result<Corners, String> {
    Ok(Corners {
        upper_left: find_corner(report, CornerKind::UpperLeft)?,
        lower_right: find_corner(report, CornerKind::LowerRight)?,
    })
}

fn find_corner(report: &str, corner: CornerKind) -> std::result::Result<(f64, f64), String> {
    let label = corner.to_string();
    let line = report
        .lines()
        .map(str::trim_start)
        .find(|line| line.starts_with(&label))
        .ok_or_else(|| format!("no {label} line"))?;

    let inner = line
        .split_once('(')
        .and_then(|(_, rest)| rest.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(|| format!("malformed {label} line {line:?}"))?;

    let (x, y) = inner
        .split_once(',')
        .ok_or_else(|| format!("malformed {label} line {line:?}"))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| format!("bad {label} coordinate {s:?}: {e}"))
    };
    Ok((parse(x)?, parse(y)?))
}

/// Whether a reported corner sits exactly on the expected integer meters.
///
/// Trailing fractional zeros (`566000.000`) match, anything else does not.
pub fn corner_matches(expected: (i64, i64), reported: (f64, f64)) -> bool {
    reported.0 == expected.0 as f64 && reported.1 == expected.1 as f64
}
