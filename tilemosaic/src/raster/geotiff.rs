//! 8-bit GeoTIFF reading and writing
//!
//! Georeferencing is stored as ModelPixelScale + ModelTiepoint (north-up
//! rasters) and the CRS as an EPSG code in the GeoKeyDirectory. On read,
//! ModelTransformation is accepted as well.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, Write};
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray8, RGB8, RGBA8};
use tiff::encoder::{DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use super::{AffineTransform, PixelArray, RasterError};

// GeoTIFF tag IDs
const GEOTIFF_MODELPIXELSCALE: u16 = 33550;
const GEOTIFF_MODELTIEPOINT: u16 = 33922;
const GEOTIFF_MODELTRANSFORMATION: u16 = 34264;
const GEOTIFF_GEOKEYDIRECTORY: u16 = 34735;

// GeoKey IDs
const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

// GeoKey values
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// A georeferenced raster read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoRaster {
    pub pixels: PixelArray,
    pub transform: AffineTransform,
    /// EPSG code from the GeoKeyDirectory, if present
    pub epsg: Option<u16>,
}

fn is_geographic(epsg: u16) -> bool {
    crs_definitions::from_code(epsg)
        .map(|def| def.proj4.contains("+proj=longlat"))
        .unwrap_or(epsg == 4326)
}

fn geokey_directory(epsg: u16) -> Vec<u16> {
    let (model_type, crs_key) = if is_geographic(epsg) {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_GEO_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_GEO_KEY)
    };
    // Header: version, revision, minor revision, key count.
    // Entries: key id, tag location (0 = inline), count, value.
    vec![
        1,
        1,
        0,
        3,
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        model_type,
        GT_RASTER_TYPE_GEO_KEY,
        0,
        1,
        RASTER_PIXEL_IS_AREA,
        crs_key,
        0,
        1,
        epsg,
    ]
}

fn write_geo_tags<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<W, K>,
    transform: &AffineTransform,
    epsg: u16,
) -> Result<(), RasterError> {
    let pixel_scale = [transform.a, -transform.e, 0.0];
    dir.write_tag(Tag::from_u16_exhaustive(GEOTIFF_MODELPIXELSCALE), pixel_scale.as_slice())?;

    // Ties pixel (0, 0) to the top-left corner
    let tiepoint = [0.0, 0.0, 0.0, transform.c, transform.f, 0.0];
    dir.write_tag(Tag::from_u16_exhaustive(GEOTIFF_MODELTIEPOINT), tiepoint.as_slice())?;

    let geokeys = geokey_directory(epsg);
    dir.write_tag(Tag::from_u16_exhaustive(GEOTIFF_GEOKEYDIRECTORY), geokeys.as_slice())?;
    Ok(())
}

/// Writes a north-up 8-bit raster with 1, 3 or 4 bands.
pub fn write_geotiff(
    path: impl AsRef<Path>,
    pixels: &PixelArray,
    transform: &AffineTransform,
    epsg: u16,
) -> Result<(), RasterError> {
    let path = path.as_ref();
    if pixels.width() == 0 || pixels.height() == 0 || pixels.bands() == 0 {
        return Err(RasterError::Empty);
    }
    if transform.b != 0.0 || transform.d != 0.0 {
        return Err(RasterError::UnsupportedLayout(
            "rotated transforms cannot be stored as pixel scale and tiepoint".to_string(),
        ));
    }

    let width = pixels.width() as u32;
    let height = pixels.height() as u32;
    let writer = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(writer)?;

    match pixels.bands() {
        1 => {
            let mut image = encoder.new_image::<Gray8>(width, height)?;
            write_geo_tags(image.encoder(), transform, epsg)?;
            image.write_data(pixels.as_slice())?;
        }
        3 => {
            let mut image = encoder.new_image::<RGB8>(width, height)?;
            write_geo_tags(image.encoder(), transform, epsg)?;
            image.write_data(pixels.as_slice())?;
        }
        4 => {
            let mut image = encoder.new_image::<RGBA8>(width, height)?;
            write_geo_tags(image.encoder(), transform, epsg)?;
            image.write_data(pixels.as_slice())?;
        }
        n => {
            return Err(RasterError::UnsupportedLayout(format!(
                "{} bands (expected 1, 3 or 4)",
                n
            )))
        }
    }

    debug!(
        path = %path.display(),
        width = width,
        height = height,
        epsg = epsg,
        "Wrote GeoTIFF"
    );
    Ok(())
}

fn find_f64_vec<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
    tag: u16,
) -> Result<Option<Vec<f64>>, RasterError> {
    Ok(decoder
        .find_tag(Tag::from_u16_exhaustive(tag))?
        .map(|value| value.into_f64_vec())
        .transpose()?)
}

fn read_transform<R: std::io::Read + Seek>(
    decoder: &mut Decoder<R>,
) -> Result<AffineTransform, RasterError> {
    if let Some(m) = find_f64_vec(decoder, GEOTIFF_MODELTRANSFORMATION)? {
        if m.len() < 8 {
            return Err(RasterError::MissingGeoreference(
                "ModelTransformation has fewer than 8 values".to_string(),
            ));
        }
        return Ok(AffineTransform::new(m[0], m[1], m[3], m[4], m[5], m[7]));
    }

    let scale = find_f64_vec(decoder, GEOTIFF_MODELPIXELSCALE)?;
    let tiepoint = find_f64_vec(decoder, GEOTIFF_MODELTIEPOINT)?;
    match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => {
            let (sx, sy) = (scale[0], scale[1]);
            Ok(AffineTransform::from_origin(
                tie[3] - tie[0] * sx,
                tie[4] + tie[1] * sy,
                sx,
                sy,
            ))
        }
        _ => Err(RasterError::MissingGeoreference(
            "expected ModelTransformation or ModelPixelScale with ModelTiepoint".to_string(),
        )),
    }
}

fn read_epsg<R: std::io::Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<u16>, RasterError> {
    let Some(value) = decoder.find_tag(Tag::from_u16_exhaustive(GEOTIFF_GEOKEYDIRECTORY))? else {
        return Ok(None);
    };
    let keys = value.into_u16_vec()?;
    let entries = keys.get(4..).unwrap_or(&[]);
    let lookup = |wanted: u16| {
        entries
            .chunks_exact(4)
            .find(|entry| entry[0] == wanted && entry[1] == 0)
            .map(|entry| entry[3])
    };
    Ok(lookup(PROJECTED_CS_TYPE_GEO_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY)))
}

/// Reads an 8-bit gray, RGB or RGBA GeoTIFF.
pub fn read_geotiff(path: impl AsRef<Path>) -> Result<GeoRaster, RasterError> {
    let path = path.as_ref();
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;

    let bands = match decoder.colortype()? {
        ColorType::Gray(8) => 1,
        ColorType::RGB(8) => 3,
        ColorType::RGBA(8) => 4,
        other => {
            return Err(RasterError::UnsupportedLayout(format!(
                "color type {:?} (expected 8-bit gray, RGB or RGBA)",
                other
            )))
        }
    };
    let (width, height) = decoder.dimensions()?;
    let transform = read_transform(&mut decoder)?;
    let epsg = read_epsg(&mut decoder)?;

    let data = match decoder.read_image()? {
        DecodingResult::U8(data) => data,
        _ => {
            return Err(RasterError::UnsupportedLayout(
                "non 8-bit sample data".to_string(),
            ))
        }
    };
    let pixels = PixelArray::from_vec(height as usize, width as usize, bands, data)?;

    debug!(
        path = %path.display(),
        width = width,
        height = height,
        bands = bands,
        epsg = ?epsg,
        "Read GeoTIFF"
    );
    Ok(GeoRaster {
        pixels,
        transform,
        epsg,
    })
}
