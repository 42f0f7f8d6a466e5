//! Georeferenced raster tiles stored as GeoTIFF.

use crate::{Grid, RasterError, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::compression::Deflate;
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;

/// Corner coordinates of a raster in its own CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    /// `(x, y)` of the north-west corner.
    pub upper_left: (f64, f64),
    /// `(x, y)` of the south-east corner.
    pub lower_right: (f64, f64),
}

/// Georeferencing of a north-up raster.
///
/// The GeoKey directory and its parameter tags are kept verbatim so a derived
/// raster can carry exactly the same CRS description as its source.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoReference {
    /// X of the upper-left corner of the upper-left pixel.
    pub origin_x: f64,
    /// Y of the upper-left corner of the upper-left pixel.
    pub origin_y: f64,
    /// Pixel width in CRS units.
    pub pixel_width: f64,
    /// Pixel height in CRS units (positive, rows run southward).
    pub pixel_height: f64,
    /// Raw GeoKeyDirectoryTag contents.
    pub geo_keys: Option<Vec<u16>>,
    /// Raw GeoDoubleParamsTag contents.
    pub geo_doubles: Option<Vec<f64>>,
    /// Raw GeoAsciiParamsTag contents.
    pub geo_ascii: Option<String>,
}

impl GeoReference {
    /// Georeferencing for a projected CRS identified by its EPSG code.
    pub fn projected(origin_x: f64, origin_y: f64, pixel_size: f64, epsg: u16) -> Self {
        // Version 1.1.0, three keys: projected model, pixel-is-area, CRS code.
        let geo_keys = vec![
            1,
            1,
            0,
            3,
            GT_MODEL_TYPE_KEY,
            0,
            1,
            1,
            GT_RASTER_TYPE_KEY,
            0,
            1,
            1,
            PROJECTED_CS_TYPE_KEY,
            0,
            1,
            epsg,
        ];
        Self {
            origin_x,
            origin_y,
            pixel_width: pixel_size,
            pixel_height: pixel_size,
            geo_keys: Some(geo_keys),
            geo_doubles: None,
            geo_ascii: None,
        }
    }

    /// EPSG code declared in the GeoKey directory, if any.
    pub fn epsg(&self) -> Option<u16> {
        let keys = self.geo_keys.as_ref()?;
        if keys.len() < 4 {
            return None;
        }
        let declared = keys[3] as usize;
        let entries = keys[4..].chunks_exact(4).take(declared);

        let mut geographic = None;
        for entry in entries {
            // Only inline (location 0) values carry a code directly.
            if entry[1] != 0 {
                continue;
            }
            match entry[0] {
                PROJECTED_CS_TYPE_KEY => return Some(entry[3]),
                GEOGRAPHIC_TYPE_KEY => geographic = Some(entry[3]),
                _ => {}
            }
        }
        geographic
    }

    /// Corners of a `width` x `height` raster with this georeferencing.
    pub fn corners(&self, width: usize, height: usize) -> Corners {
        Corners {
            upper_left: (self.origin_x, self.origin_y),
            lower_right: (
                self.origin_x + width as f64 * self.pixel_width,
                self.origin_y - height as f64 * self.pixel_height,
            ),
        }
    }
}

/// A single-band elevation raster with its georeferencing.
#[derive(Debug, Clone)]
pub struct RasterTile {
    /// Elevation samples, north to south, west to east.
    samples: Grid<f32>,
    /// Placement of the grid in the CRS.
    georef: GeoReference,
    /// No-data value (samples equal to this are missing).
    nodata: Option<f64>,
}

impl RasterTile {
    /// Assemble a tile from parts.
    pub fn new(samples: Grid<f32>, georef: GeoReference, nodata: Option<f64>) -> Self {
        Self {
            samples,
            georef,
            nodata,
        }
    }

    /// Load a tile from a GeoTIFF file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut decoder = Decoder::new(BufReader::new(file))?;

        // Tiles are small (1000 m at 1 m/px is 4 MB of f32), but the default
        // limits are tighter than a scaled-up request could produce.
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024;
        limits.intermediate_buffer_size = 1024 * 1024 * 1024;
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let georef = Self::read_georeference(&mut decoder, path)?;
        let data = Self::decode_samples(&mut decoder)?;
        let nodata = Self::read_nodata_value(&mut decoder);
        let samples = Grid::new(width as usize, height as usize, data)?;

        Ok(Self {
            samples,
            georef,
            nodata,
        })
    }

    /// Read the tiepoint, pixel scale and GeoKeys.
    fn read_georeference<R: Read + Seek>(
        decoder: &mut Decoder<R>,
        path: &Path,
    ) -> Result<GeoReference> {
        let missing = |reason: &str| RasterError::MissingGeoreference {
            path: path.display().to_string(),
            reason: reason.to_string(),
        };

        let tiepoint = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
            .map_err(|_| missing("no ModelTiepointTag"))?;
        let scale = decoder
            .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
            .map_err(|_| missing("no ModelPixelScaleTag"))?;

        if tiepoint.len() < 6 || scale.len() < 2 {
            return Err(missing("short tiepoint or pixel scale"));
        }

        // Tiepoint format: [i, j, k, x, y, z], raster (i, j) sits at model (x, y).
        let (i, j) = (tiepoint[0], tiepoint[1]);
        let (x, y) = (tiepoint[3], tiepoint[4]);
        let (pixel_width, pixel_height) = (scale[0], scale[1]);

        Ok(GeoReference {
            origin_x: x - i * pixel_width,
            origin_y: y + j * pixel_height,
            pixel_width,
            pixel_height,
            geo_keys: decoder.get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY)).ok(),
            geo_doubles: decoder.get_tag_f64_vec(Tag::from_u16_exhaustive(GEO_DOUBLE_PARAMS)).ok(),
            geo_ascii: decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS)).ok(),
        })
    }

    /// Decode the first band into `f32` samples.
    fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
        let result = decoder.read_image()?;

        match result {
            DecodingResult::F32(data) => Ok(data),
            DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        }
    }

    /// Read the no-data value from the GDAL_NODATA tag.
    fn read_nodata_value<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
        decoder
            .get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA))
            .ok()
            .and_then(|s| s.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok())
    }

    /// Elevation samples.
    pub fn samples(&self) -> &Grid<f32> {
        &self.samples
    }

    /// Georeferencing.
    pub fn georeference(&self) -> &GeoReference {
        &self.georef
    }

    /// No-data value, if declared.
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Dimensions in pixels.
    pub fn dimensions(&self) -> (usize, usize) {
        self.samples.dimensions()
    }

    /// Corner coordinates in the tile's CRS.
    pub fn corners(&self) -> Corners {
        let (width, height) = self.samples.dimensions();
        self.georef.corners(width, height)
    }

    /// Write the tile as a deflate-compressed `f32` GeoTIFF.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_f32(path, &self.samples, &self.georef, self.nodata)
    }
}

/// True if `value` is NaN or equal to the `nodata` marker.
pub fn is_nodata(value: f32, nodata: Option<f64>) -> bool {
    value.is_nan() || nodata.is_some_and(|nd| (value as f64 - nd).abs() < 1e-3)
}

/// Write a single-band `f32` GeoTIFF with deflate compression.
pub fn write_f32<P: AsRef<Path>>(
    path: P,
    samples: &Grid<f32>,
    georef: &GeoReference,
    nodata: Option<f64>,
) -> Result<()> {
    encode::<colortype::Gray32Float>(path.as_ref(), samples, georef, nodata)
}

/// Write a single-band `u8` GeoTIFF with deflate compression.
pub fn write_u8<P: AsRef<Path>>(path: P, samples: &Grid<u8>, georef: &GeoReference) -> Result<()> {
    encode::<colortype::Gray8>(path.as_ref(), samples, georef, None)
}

fn encode<C>(
    path: &Path,
    samples: &Grid<C::Inner>,
    georef: &GeoReference,
    nodata: Option<f64>,
) -> Result<()>
where
    C: ColorType,
    C::Inner: Copy,
    [C::Inner]: TiffValue,
{
    let (width, height) = samples.dimensions();
    let too_large = || RasterError::TooLarge { width, height };
    let w = u32::try_from(width).map_err(|_| too_large())?;
    let h = u32::try_from(height).map_err(|_| too_large())?;

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    let mut image = encoder.new_image_with_compression::<C, _>(w, h, Deflate::default())?;

    let dir = image.encoder();
    dir.write_tag(
        Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE),
        &[georef.pixel_width, georef.pixel_height, 0.0][..],
    )?;
    dir.write_tag(
        Tag::from_u16_exhaustive(MODEL_TIEPOINT),
        &[0.0, 0.0, 0.0, georef.origin_x, georef.origin_y, 0.0][..],
    )?;
    if let Some(keys) = &georef.geo_keys {
        dir.write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &keys[..])?;
    }
    if let Some(doubles) = &georef.geo_doubles {
        dir.write_tag(Tag::from_u16_exhaustive(GEO_DOUBLE_PARAMS), &doubles[..])?;
    }
    if let Some(ascii) = &georef.geo_ascii {
        dir.write_tag(Tag::from_u16_exhaustive(GEO_ASCII_PARAMS), ascii.as_str())?;
    }
    if let Some(nodata) = nodata {
        dir.write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), nodata.to_string().as_str())?;
    }

    image.write_data(samples.data())?;
    Ok(())
}
