use anyhow::{Context, Result};
use image::{ColorType, DynamicImage, ImageFormat};
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::{Bytes, ImageEXIF};
use std::borrow::Cow;
use std::io::{Read, Write};

use super::exif::Ifd0;
use super::{
    ImageMetadata, ImageReaderPlugin, ImageWriterPlugin, MetadataScope, PluginDescriptor,
    builtin_descriptor, chroma, compression, dimension, encode_pixels, read_all, standard_root,
    target_dpi,
};
use crate::error::MetadataError;
use crate::metadata::{
    AttributeSpec, ChildPolicy, DataType, DeclaredSchema, ElementSpec, MetadataNode, MetadataSchema,
    STANDARD_FORMAT_NAME, standard_schema,
};
use crate::resolution::{HORIZONTAL_PIXEL_SIZE, MM_PER_INCH, VERTICAL_PIXEL_SIZE};

pub const NATIVE_FORMAT_NAME: &str = "jpeg_image_1.0";

const APP0: u8 = 0xE0;
const JFIF_ID: &[u8] = b"JFIF\0";
const DENSITY_ASPECT: u8 = 0;
const DENSITY_INCH: u8 = 1;
const DENSITY_CENTIMETER: u8 = 2;

fn jpeg_descriptor(name: &str) -> PluginDescriptor {
    builtin_descriptor(name)
        .with_suffixes(&["jpg", "jpeg"])
        .with_format_names(&["JPEG", "jpeg", "JPG", "jpg"])
        .with_mime_types(&["image/jpeg"])
        .with_standard_metadata(true, false)
        .with_native_image_format(NATIVE_FORMAT_NAME)
}

/// SOF0..SOF15, minus DHT (0xC4), JPG (0xC8) and DAC (0xCC).
fn is_sof(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn is_jfif(segment: &JpegSegment) -> bool {
    segment.marker() == APP0 && segment.contents().starts_with(JFIF_ID)
}

/// Reads the JFIF density, falling back to the EXIF IFD0 resolution.
pub struct JpegReader {
    descriptor: PluginDescriptor,
    native: DeclaredSchema,
}

impl JpegReader {
    pub fn new() -> Self {
        Self {
            descriptor: jpeg_descriptor("JpegReader"),
            native: native_schema(),
        }
    }
}

impl Default for JpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReaderPlugin for JpegReader {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn metadata_schema(&self, scope: MetadataScope, format_name: &str) -> Option<&dyn MetadataSchema> {
        match (scope, format_name) {
            (MetadataScope::Image, STANDARD_FORMAT_NAME) => Some(standard_schema()),
            (MetadataScope::Image, NATIVE_FORMAT_NAME) => Some(&self.native),
            _ => None,
        }
    }

    fn read_image_metadata(&self, source: &mut dyn Read, image_index: usize) -> Result<MetadataNode> {
        let data = Bytes::from(read_all(source, image_index)?);
        let jpeg = Jpeg::from_bytes(data.clone()).map_err(|e| MetadataError::malformed("JPEG", e.to_string()))?;

        let components = jpeg
            .segments()
            .iter()
            .find(|s| is_sof(s.marker()))
            .and_then(|s| s.contents().get(5).copied())
            .ok_or_else(|| MetadataError::malformed("JPEG", "no frame header before scan data"))?;
        let space = match components {
            1 => "GRAY",
            4 => "CMYK",
            _ => "YCbCr",
        };

        let mut tree = standard_root([chroma(space, components), compression("JPEG", false)]);

        let jfif = jpeg.segments().iter().find(|s| is_jfif(s)).and_then(|s| jfif_dimension(s.contents()));
        let dim = match jfif {
            Some(dim) if has_pixel_size(&dim) => Some(dim),
            aspect_only => {
                let exif = jpeg.exif().is_some().then(|| exif_dimension(&data)).flatten();
                exif.or(aspect_only)
            }
        };
        if let Some(dim) = dim {
            tree.push_child(dim);
        }

        log::debug!("JPEG metadata:\n{tree}");
        Ok(tree)
    }
}

fn has_pixel_size(dim: &MetadataNode) -> bool {
    dim.child(HORIZONTAL_PIXEL_SIZE).is_some() || dim.child(VERTICAL_PIXEL_SIZE).is_some()
}

/// `Dimension` from the EXIF IFD0 resolution of a whole JPEG file.
fn exif_dimension(file: &[u8]) -> Option<MetadataNode> {
    let ifd = match Ifd0::read(file) {
        Ok(ifd) => ifd?,
        Err(e) => {
            log::warn!("Ignoring unreadable EXIF block: {e:#}");
            return None;
        }
    };
    let (h, v) = ifd.pixel_size_mm();
    (h.is_some() || v.is_some()).then(|| dimension(None, h, v))
}

/// `Dimension` from a JFIF APP0 body: pixel sizes for a physical density,
/// only the aspect ratio for unit 0, `None` for no usable density.
fn jfif_dimension(app0: &[u8]) -> Option<MetadataNode> {
    if app0.len() < 12 {
        return None;
    }
    let units = app0[7];
    let x = u16::from_be_bytes([app0[8], app0[9]]);
    let y = u16::from_be_bytes([app0[10], app0[11]]);
    if x == 0 || y == 0 {
        return None;
    }

    let size = |mm_per_unit: f64| {
        let mm = |density: u16| mm_per_unit / f64::from(density);
        dimension(None, Some(mm(x)), Some(mm(y)))
    };
    Some(match units {
        DENSITY_INCH => size(MM_PER_INCH),
        DENSITY_CENTIMETER => size(10.0),
        DENSITY_ASPECT => dimension(Some(f64::from(y) / f64::from(x)), None, None),
        _ => return None,
    })
}

/// Encodes baseline JPEG and stores the resolution in the JFIF header.
pub struct JpegWriter {
    descriptor: PluginDescriptor,
}

impl JpegWriter {
    pub fn new() -> Self {
        Self {
            descriptor: jpeg_descriptor("JpegWriter"),
        }
    }
}

impl Default for JpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriterPlugin for JpegWriter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn default_image_metadata(&self, color: ColorType) -> ImageMetadata {
        let channels = if color.has_color() { 3 } else { 1 };
        let space = if channels == 1 { "GRAY" } else { "YCbCr" };
        ImageMetadata::new(standard_root([
            chroma(space, channels),
            compression("JPEG", false),
            dimension(Some(1.0), None, None),
        ]))
    }

    fn write(&self, image: &DynamicImage, metadata: &ImageMetadata, sink: &mut dyn Write) -> Result<()> {
        // The baseline encoder only takes 8-bit gray or RGB.
        let pixels: Cow<'_, DynamicImage> = match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
            other if !other.color().has_color() => Cow::Owned(DynamicImage::ImageLuma8(other.to_luma8())),
            other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
        };
        let encoded = encode_pixels(&pixels, ImageFormat::Jpeg)?;

        let output = match target_dpi(metadata)? {
            None => encoded,
            Some((x_dpi, y_dpi)) => {
                let mut jpeg = Jpeg::from_bytes(Bytes::from(encoded))
                    .map_err(|e| MetadataError::malformed("JPEG", e.to_string()))?;
                let app0 = JpegSegment::new_with_contents(APP0, Bytes::from(jfif_contents(x_dpi, y_dpi)));
                let segments = jpeg.segments_mut();
                match segments.iter().position(is_jfif) {
                    Some(at) => segments[at] = app0,
                    None => segments.insert(0, app0),
                }
                log::debug!("JFIF density set to {x_dpi} x {y_dpi} dpi");
                jpeg.encoder().bytes().to_vec()
            }
        };

        sink.write_all(&output).context("Failed to write JPEG data")?;
        sink.flush().context("Failed to flush JPEG data")?;
        Ok(())
    }
}

fn jfif_contents(x_dpi: f64, y_dpi: f64) -> Vec<u8> {
    let density = |dpi: f64| dpi.round().clamp(1.0, f64::from(u16::MAX)) as u16;
    let mut contents = JFIF_ID.to_vec();
    contents.extend_from_slice(&[1, 2, DENSITY_INCH]);
    contents.extend_from_slice(&density(x_dpi).to_be_bytes());
    contents.extend_from_slice(&density(y_dpi).to_be_bytes());
    contents.extend_from_slice(&[0, 0]);
    contents
}

fn native_schema() -> DeclaredSchema {
    let int = |name: &str, min: &str, max: &str| {
        AttributeSpec::new(name, DataType::Integer).range(min, max, true, true).required()
    };

    DeclaredSchema::new(NATIVE_FORMAT_NAME, NATIVE_FORMAT_NAME)
        .with_element(
            ElementSpec::new(NATIVE_FORMAT_NAME, ChildPolicy::All).with_children(&["JPEGvariety", "markerSequence"]),
        )
        .with_element(ElementSpec::new("JPEGvariety", ChildPolicy::Choice).with_children(&["app0JFIF"]))
        .with_element(
            ElementSpec::new("app0JFIF", ChildPolicy::Empty)
                .with_attribute(int("majorVersion", "0", "255").default_value("1"))
                .with_attribute(int("minorVersion", "0", "255").default_value("2"))
                .with_attribute(
                    AttributeSpec::new("resUnits", DataType::Integer)
                        .enumeration(&["0", "1", "2"])
                        .default_value("0"),
                )
                .with_attribute(int("Xdensity", "1", "65535").default_value("1"))
                .with_attribute(int("Ydensity", "1", "65535").default_value("1"))
                .with_attribute(int("thumbWidth", "0", "255").default_value("0"))
                .with_attribute(int("thumbHeight", "0", "255").default_value("0")),
        )
        .with_element(
            ElementSpec::new("markerSequence", ChildPolicy::Sequence)
                .with_children(&["dqt", "dht", "dri", "com", "unknown", "sof", "sos"]),
        )
        .with_element(ElementSpec::new("dqt", ChildPolicy::Repeat).with_children(&["dqtable"]))
        .with_element(
            ElementSpec::new("dqtable", ChildPolicy::Empty)
                .with_attribute(
                    AttributeSpec::new("elementPrecision", DataType::Integer)
                        .enumeration(&["0", "1"])
                        .default_value("0"),
                )
                .with_attribute(int("qtableId", "0", "3")),
        )
        .with_element(ElementSpec::new("dht", ChildPolicy::Repeat).with_children(&["dhtable"]))
        .with_element(
            ElementSpec::new("dhtable", ChildPolicy::Empty)
                .with_attribute(
                    AttributeSpec::new("class", DataType::Integer)
                        .enumeration(&["0", "1"])
                        .required(),
                )
                .with_attribute(int("htableId", "0", "3")),
        )
        .with_element(ElementSpec::value("dri", int("interval", "0", "65535")))
        .with_element(
            ElementSpec::new("com", ChildPolicy::Empty)
                .with_attribute(AttributeSpec::new("comment", DataType::String)),
        )
        .with_element(
            ElementSpec::new("unknown", ChildPolicy::Empty).with_attribute(int("MarkerTag", "0", "255")),
        )
        .with_element(
            ElementSpec::new("sof", ChildPolicy::Repeat)
                .with_children(&["componentSpec"])
                .with_attribute(
                    AttributeSpec::new("process", DataType::Integer)
                        .enumeration(&["0", "1", "2", "3", "5", "6", "7", "9", "10", "11", "13", "14", "15"]),
                )
                .with_attribute(int("samplePrecision", "8", "16").default_value("8"))
                .with_attribute(int("numLines", "0", "65535"))
                .with_attribute(int("samplesPerLine", "0", "65535"))
                .with_attribute(int("numFrameComponents", "1", "4")),
        )
        .with_element(
            ElementSpec::new("componentSpec", ChildPolicy::Empty)
                .with_attribute(int("componentId", "0", "255"))
                .with_attribute(int("HsamplingFactor", "1", "255"))
                .with_attribute(int("VsamplingFactor", "1", "255"))
                .with_attribute(int("QtableSelector", "0", "3")),
        )
        .with_element(
            ElementSpec::new("sos", ChildPolicy::Repeat)
                .with_children(&["scanComponentSpec"])
                .with_attribute(int("numScanComponents", "1", "4"))
                .with_attribute(int("startSpectralSelection", "0", "63"))
                .with_attribute(int("endSpectralSelection", "0", "63"))
                .with_attribute(int("approxHigh", "0", "15"))
                .with_attribute(int("approxLow", "0", "15")),
        )
        .with_element(
            ElementSpec::new("scanComponentSpec", ChildPolicy::Empty)
                .with_attribute(int("componentSelector", "0", "255"))
                .with_attribute(int("dcHuffTable", "0", "3"))
                .with_attribute(int("acHuffTable", "0", "3")),
        )
}
