use anyhow::{Context, Result};
use image::{ColorType, DynamicImage, ImageFormat};
use img_parts::Bytes;
use img_parts::png::{Png, PngChunk};
use std::io::{Read, Write};

use super::{
    ImageMetadata, ImageReaderPlugin, ImageWriterPlugin, MetadataScope, PluginDescriptor,
    builtin_descriptor, chroma, chroma_for, compression, dimension, encode_pixels, read_all,
    standard_root, target_dpi,
};
use crate::error::MetadataError;
use crate::metadata::{
    AttributeSpec, ChildPolicy, DataType, DeclaredSchema, ElementSpec, MetadataNode, MetadataSchema,
    STANDARD_FORMAT_NAME, standard_schema,
};

pub const NATIVE_FORMAT_NAME: &str = "png_image_1.0";

const IHDR: [u8; 4] = *b"IHDR";
const PHYS: [u8; 4] = *b"pHYs";
const UNIT_METER: u8 = 1;
const METERS_PER_INCH: f64 = 0.0254;

fn png_descriptor(name: &str) -> PluginDescriptor {
    builtin_descriptor(name)
        .with_suffixes(&["png"])
        .with_format_names(&["png", "PNG"])
        .with_mime_types(&["image/png", "image/x-png"])
        .with_standard_metadata(true, false)
        .with_native_image_format(NATIVE_FORMAT_NAME)
}

/// Reads `IHDR` and `pHYs` into the standard tree.
pub struct PngReader {
    descriptor: PluginDescriptor,
    native: DeclaredSchema,
}

impl PngReader {
    pub fn new() -> Self {
        Self {
            descriptor: png_descriptor("PngReader"),
            native: native_schema(),
        }
    }
}

impl Default for PngReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReaderPlugin for PngReader {
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
        let data = read_all(source, image_index)?;
        let png = Png::from_bytes(Bytes::from(data))
            .map_err(|e| MetadataError::malformed("PNG", e.to_string()))?;

        let header = png
            .chunk_by_type(IHDR)
            .map(|c| c.contents().clone())
            .filter(|c| c.len() >= 13)
            .ok_or_else(|| MetadataError::malformed("PNG", "missing IHDR chunk"))?;
        let (space, channels) = match header[9] {
            0 => ("GRAY", 1),
            2 => ("RGB", 3),
            3 => ("RGB", 3),
            4 => ("GRAY", 2),
            6 => ("RGB", 4),
            other => return Err(MetadataError::malformed("PNG", format!("unknown color type {other}")).into()),
        };

        let mut tree = standard_root([chroma(space, channels), compression("deflate", true)]);
        if let Some(phys) = png.chunk_by_type(PHYS) {
            tree.push_child(physical_dimension(phys.contents()));
        }

        log::debug!("PNG metadata:\n{tree}");
        Ok(tree)
    }
}

fn physical_dimension(phys: &[u8]) -> MetadataNode {
    if phys.len() < 9 {
        return dimension(None, None, None);
    }
    let x = u32::from_be_bytes([phys[0], phys[1], phys[2], phys[3]]);
    let y = u32::from_be_bytes([phys[4], phys[5], phys[6], phys[7]]);
    if x == 0 || y == 0 {
        return dimension(None, None, None);
    }

    if phys[8] == UNIT_METER {
        let mm = |ppm: u32| 1000.0 / f64::from(ppm);
        dimension(None, Some(mm(x)), Some(mm(y)))
    } else {
        dimension(Some(f64::from(y) / f64::from(x)), None, None)
    }
}

/// Encodes with the `image` PNG encoder and adds a `pHYs` chunk when the
/// metadata declares a resolution.
pub struct PngWriter {
    descriptor: PluginDescriptor,
}

impl PngWriter {
    pub fn new() -> Self {
        Self {
            descriptor: png_descriptor("PngWriter"),
        }
    }
}

impl Default for PngWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriterPlugin for PngWriter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn default_image_metadata(&self, color: ColorType) -> ImageMetadata {
        ImageMetadata::new(standard_root([chroma_for(color), compression("deflate", true)]))
    }

    fn write(&self, image: &DynamicImage, metadata: &ImageMetadata, sink: &mut dyn Write) -> Result<()> {
        let encoded = encode_pixels(image, ImageFormat::Png)?;

        let output = match target_dpi(metadata)? {
            None => encoded,
            Some((x_dpi, y_dpi)) => {
                let mut png = Png::from_bytes(Bytes::from(encoded))
                    .map_err(|e| MetadataError::malformed("PNG", e.to_string()))?;
                let chunks = png.chunks_mut();
                chunks.retain(|c| c.kind() != PHYS);
                let at = chunks.iter().position(|c| c.kind() == IHDR).map_or(0, |p| p + 1);
                chunks.insert(at, PngChunk::new(PHYS, Bytes::from(phys_contents(x_dpi, y_dpi))));
                log::debug!("PNG pHYs set to {x_dpi} x {y_dpi} dpi");
                png.encoder().bytes().to_vec()
            }
        };

        sink.write_all(&output).context("Failed to write PNG data")?;
        sink.flush().context("Failed to flush PNG data")?;
        Ok(())
    }
}

fn phys_contents(x_dpi: f64, y_dpi: f64) -> Vec<u8> {
    let ppm = |dpi: f64| (dpi / METERS_PER_INCH).round().clamp(1.0, f64::from(u32::MAX)) as u32;
    let mut contents = Vec::with_capacity(9);
    contents.extend_from_slice(&ppm(x_dpi).to_be_bytes());
    contents.extend_from_slice(&ppm(y_dpi).to_be_bytes());
    contents.push(UNIT_METER);
    contents
}

fn native_schema() -> DeclaredSchema {
    let int_range = |name: &str, min: &str, max: &str| {
        AttributeSpec::new(name, DataType::Integer).range(min, max, true, true).required()
    };
    let rgb = |spec: ElementSpec| {
        spec.with_attribute(int_range("red", "0", "255"))
            .with_attribute(int_range("green", "0", "255"))
            .with_attribute(int_range("blue", "0", "255"))
    };

    DeclaredSchema::new(NATIVE_FORMAT_NAME, NATIVE_FORMAT_NAME)
        .with_element(
            ElementSpec::new(NATIVE_FORMAT_NAME, ChildPolicy::Some)
                .with_children(&["IHDR", "PLTE", "gAMA", "pHYs", "tEXt", "tIME"]),
        )
        .with_element(
            ElementSpec::new("IHDR", ChildPolicy::Empty)
                .with_attribute(int_range("width", "1", "2147483647"))
                .with_attribute(int_range("height", "1", "2147483647"))
                .with_attribute(
                    AttributeSpec::new("bitDepth", DataType::Integer)
                        .enumeration(&["1", "2", "4", "8", "16"])
                        .required(),
                )
                .with_attribute(
                    AttributeSpec::new("colorType", DataType::String)
                        .enumeration(&["Grayscale", "RGB", "Palette", "GrayAlpha", "RGBAlpha"])
                        .required(),
                )
                .with_attribute(
                    AttributeSpec::new("compressionMethod", DataType::String)
                        .enumeration(&["deflate"])
                        .required(),
                )
                .with_attribute(
                    AttributeSpec::new("filterMethod", DataType::String)
                        .enumeration(&["adaptive"])
                        .required(),
                )
                .with_attribute(
                    AttributeSpec::new("interlaceMethod", DataType::String)
                        .enumeration(&["none", "adam7"])
                        .required(),
                ),
        )
        .with_element(ElementSpec::new("PLTE", ChildPolicy::Repeat).with_children(&["PLTEEntry"]))
        .with_element(rgb(
            ElementSpec::new("PLTEEntry", ChildPolicy::Empty).with_attribute(int_range("index", "0", "255")),
        ))
        .with_element(ElementSpec::value("gAMA", int_range("value", "0", "2147483647")))
        .with_element(
            ElementSpec::new("pHYs", ChildPolicy::Empty)
                .with_attribute(int_range("pixelsPerUnitXAxis", "0", "2147483647"))
                .with_attribute(int_range("pixelsPerUnitYAxis", "0", "2147483647"))
                .with_attribute(
                    AttributeSpec::new("unitSpecifier", DataType::String)
                        .enumeration(&["unknown", "meter"])
                        .required(),
                ),
        )
        .with_element(ElementSpec::new("tEXt", ChildPolicy::Repeat).with_children(&["tEXtEntry"]))
        .with_element(
            ElementSpec::new("tEXtEntry", ChildPolicy::Empty)
                .with_attribute(AttributeSpec::new("keyword", DataType::String).required())
                .with_attribute(AttributeSpec::new("value", DataType::String).required()),
        )
        .with_element(
            ElementSpec::new("tIME", ChildPolicy::Empty)
                .with_attribute(int_range("year", "0", "65535"))
                .with_attribute(int_range("month", "1", "12"))
                .with_attribute(int_range("day", "1", "31"))
                .with_attribute(int_range("hour", "0", "23"))
                .with_attribute(int_range("minute", "0", "59"))
                .with_attribute(int_range("second", "0", "60")),
        )
}
