//! Coverage service endpoints and request construction.

use crate::{FetchError, Result, TileDescriptor};
use std::fmt;
use std::str::FromStr;

/// WCS protocol version spoken by the coverage service.
pub const WCS_VERSION: &str = "2.0.1";

/// CRS of the tile grid and of every subset request.
pub const SUBSETTING_CRS: &str = "EPSG:2180";

const NMT_BASE_URL: &str =
    "https://mapy.geoportal.gov.pl/wss/service/PZGIK/NMT/GRID1/WCS/DigitalTerrainModelFormatTIFF";
const NMPT_BASE_URL: &str =
    "https://mapy.geoportal.gov.pl/wss/service/PZGIK/NMPT/GRID1/WCS/DigitalSurfaceModel";

/// Encoding of a coverage response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFormat {
    /// `image/tiff`: a single GeoTIFF, used as is.
    GeoTiff,
    /// `image/x-aaigrid`: multi-part body with an ASCII grid and side files.
    AsciiGrid,
    /// Any other MIME type. Requests can be made, responses are rejected.
    Other(String),
}

impl ResponseFormat {
    /// MIME type sent as `FORMAT`.
    pub fn mime(&self) -> &str {
        match self {
            ResponseFormat::GeoTiff => "image/tiff",
            ResponseFormat::AsciiGrid => "image/x-aaigrid",
            ResponseFormat::Other(mime) => mime,
        }
    }
}

impl From<&str> for ResponseFormat {
    fn from(mime: &str) -> Self {
        match mime {
            "image/tiff" => ResponseFormat::GeoTiff,
            "image/x-aaigrid" => ResponseFormat::AsciiGrid,
            other => ResponseFormat::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A WCS `GetCoverage` endpoint for one coverage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageService {
    /// Endpoint URL without query.
    pub base_url: String,
    /// `COVERAGEID`.
    pub coverage_id: String,
    /// `FORMAT`.
    pub format: ResponseFormat,
    /// `SUBSETTINGCRS`.
    pub subsetting_crs: String,
    /// `VERSION`.
    pub version: String,
}

impl CoverageService {
    /// Service at `base_url` serving `coverage_id` in `format`, EPSG:2180 subsets.
    pub fn new(
        base_url: impl Into<String>,
        coverage_id: impl Into<String>,
        format: ResponseFormat,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            coverage_id: coverage_id.into(),
            format,
            subsetting_crs: SUBSETTING_CRS.to_string(),
            version: WCS_VERSION.to_string(),
        }
    }

    /// `GetCoverage` URL for `tile`.
    pub fn request_url(&self, tile: &TileDescriptor) -> Result<String> {
        let scale = format!("{:?}", tile.scale_factor);
        let subset_x = format!("x({},{})", tile.xmin, tile.xmax);
        let subset_y = format!("y({},{})", tile.ymin, tile.ymax);

        let params = [
            ("SERVICE", "WCS"),
            ("VERSION", self.version.as_str()),
            ("REQUEST", "GetCoverage"),
            ("COVERAGEID", self.coverage_id.as_str()),
            ("FORMAT", self.format.mime()),
            ("SUBSETTINGCRS", self.subsetting_crs.as_str()),
            ("SCALEFACTOR", scale.as_str()),
            ("SUBSET", subset_x.as_str()),
            ("SUBSET", subset_y.as_str()),
        ];

        let url = reqwest::Url::parse_with_params(&self.base_url, &params).map_err(|e| {
            FetchError::InvalidUrl {
                url: self.base_url.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(url.into())
    }
}

/// Elevation models published by the national geoportal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElevationModel {
    /// NMT: bare-earth terrain model.
    Nmt,
    /// NMPT: surface model including buildings and vegetation.
    Nmpt,
}

impl ElevationModel {
    /// Coverage endpoint for this model.
    pub fn service(self) -> CoverageService {
        match self {
            ElevationModel::Nmt => CoverageService::new(
                NMT_BASE_URL,
                "DTM_PL-KRON86-NH_TIFF",
                ResponseFormat::GeoTiff,
            ),
            ElevationModel::Nmpt => CoverageService::new(
                NMPT_BASE_URL,
                "DSM_PL-KRON86-NH",
                ResponseFormat::AsciiGrid,
            ),
        }
    }

    /// Default output directory.
    pub fn default_out_dir(self) -> &'static str {
        match self {
            ElevationModel::Nmt => "tiles/nmt",
            ElevationModel::Nmpt => "tiles/nmpt",
        }
    }

    /// Database table receiving the elevation tiles.
    pub fn table(self) -> &'static str {
        match self {
            ElevationModel::Nmt => "dtm",
            ElevationModel::Nmpt => "dtcm",
        }
    }

    /// Database table receiving doubt maps, for surface models.
    pub fn doubt_table(self) -> Option<&'static str> {
        match self {
            ElevationModel::Nmt => None,
            ElevationModel::Nmpt => Some("dtcm_doubt"),
        }
    }

    /// Whether tiles of this model get doubt maps.
    pub fn is_surface_model(self) -> bool {
        matches!(self, ElevationModel::Nmpt)
    }
}

impl FromStr for ElevationModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NMT" => Ok(ElevationModel::Nmt),
            "NMPT" => Ok(ElevationModel::Nmpt),
            _ => Err(format!("unknown model {s:?}, expected NMT or NMPT")),
        }
    }
}

impl fmt::Display for ElevationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationModel::Nmt => f.write_str("NMT"),
            ElevationModel::Nmpt => f.write_str("NMPT"),
        }
    }
}
