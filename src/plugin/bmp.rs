use anyhow::{Context, Result};
use image::{ColorType, DynamicImage, ImageFormat};
use std::borrow::Cow;
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

pub const NATIVE_FORMAT_NAME: &str = "bmp_1.0";

// Offsets into the file header + BITMAPINFOHEADER.
const BITS_PER_PIXEL: usize = 28;
const COMPRESSION: usize = 30;
const X_PELS_PER_METER: usize = 38;
const Y_PELS_PER_METER: usize = 42;
const HEADER_END: usize = 46;

const METERS_PER_INCH: f64 = 0.0254;

fn bmp_descriptor(name: &str) -> PluginDescriptor {
    builtin_descriptor(name)
        .with_suffixes(&["bmp"])
        .with_format_names(&["bmp", "BMP"])
        .with_mime_types(&["image/bmp", "image/x-bmp", "image/x-windows-bmp"])
        .with_standard_metadata(true, false)
        .with_native_image_format(NATIVE_FORMAT_NAME)
}

fn check_header(data: &[u8]) -> Result<(), MetadataError> {
    if !data.starts_with(b"BM") {
        return Err(MetadataError::malformed("BMP", "missing BM signature"));
    }
    if data.len() < HEADER_END {
        return Err(MetadataError::malformed("BMP", "info header too short"));
    }
    Ok(())
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

pub struct BmpReader {
    descriptor: PluginDescriptor,
    native: DeclaredSchema,
}

impl BmpReader {
    pub fn new() -> Self {
        Self {
            descriptor: bmp_descriptor("BmpReader"),
            native: native_schema(),
        }
    }
}

impl Default for BmpReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReaderPlugin for BmpReader {
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
        check_header(&data)?;

        let bits = u16::from_le_bytes([data[BITS_PER_PIXEL], data[BITS_PER_PIXEL + 1]]);
        let channels = if bits == 32 { 4 } else { 3 };
        let codec = match read_i32(&data, COMPRESSION) {
            0 => "BI_RGB",
            1 => "BI_RLE8",
            2 => "BI_RLE4",
            3 => "BI_BITFIELDS",
            4 => "BI_JPEG",
            5 => "BI_PNG",
            _ => "Unknown",
        };

        let mut tree = standard_root([chroma("RGB", channels), compression(codec, true)]);

        // Zero means unspecified.
        let mm = |ppm: i32| (ppm > 0).then(|| 1000.0 / f64::from(ppm));
        let h = mm(read_i32(&data, X_PELS_PER_METER));
        let v = mm(read_i32(&data, Y_PELS_PER_METER));
        if h.is_some() || v.is_some() {
            tree.push_child(dimension(None, h, v));
        }

        log::debug!("BMP metadata:\n{tree}");
        Ok(tree)
    }
}

pub struct BmpWriter {
    descriptor: PluginDescriptor,
}

impl BmpWriter {
    pub fn new() -> Self {
        Self {
            descriptor: bmp_descriptor("BmpWriter"),
        }
    }
}

impl Default for BmpWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriterPlugin for BmpWriter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn default_image_metadata(&self, color: ColorType) -> ImageMetadata {
        ImageMetadata::new(standard_root([chroma_for(color), compression("BI_RGB", true)]))
    }

    fn write(&self, image: &DynamicImage, metadata: &ImageMetadata, sink: &mut dyn Write) -> Result<()> {
        let pixels: Cow<'_, DynamicImage> = match image {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageRgb8(_)
            | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
            other if other.color().has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8())),
            other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
        };
        let mut encoded = encode_pixels(&pixels, ImageFormat::Bmp)?;

        if let Some((x_dpi, y_dpi)) = target_dpi(metadata)? {
            check_header(&encoded)?;
            let ppm = |dpi: f64| (dpi / METERS_PER_INCH).round().clamp(1.0, f64::from(i32::MAX)) as i32;
            encoded[X_PELS_PER_METER..X_PELS_PER_METER + 4].copy_from_slice(&ppm(x_dpi).to_le_bytes());
            encoded[Y_PELS_PER_METER..Y_PELS_PER_METER + 4].copy_from_slice(&ppm(y_dpi).to_le_bytes());
            log::debug!("BMP pels per meter set for {x_dpi} x {y_dpi} dpi");
        }

        sink.write_all(&encoded).context("Failed to write BMP data")?;
        sink.flush().context("Failed to flush BMP data")?;
        Ok(())
    }
}

fn native_schema() -> DeclaredSchema {
    let int = |name: &str| ElementSpec::value(name, AttributeSpec::new("value", DataType::Integer).required());
    let xy = |name: &str| {
        ElementSpec::new(name, ChildPolicy::All).with_children(&["X", "Y"])
    };

    DeclaredSchema::new(NATIVE_FORMAT_NAME, NATIVE_FORMAT_NAME)
        .with_element(ElementSpec::new(NATIVE_FORMAT_NAME, ChildPolicy::Some).with_children(&[
            "BMPVersion",
            "Width",
            "Height",
            "BitsPerPixel",
            "Compression",
            "ImageSize",
            "PixelsPerMeter",
            "ColorsUsed",
            "ColorsImportant",
            "Palette",
        ]))
        .with_element(ElementSpec::value(
            "BMPVersion",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&["BMP v. 3.x", "BMP v. 4.x", "BMP v. 5.x"])
                .required(),
        ))
        .with_element(int("Width"))
        .with_element(int("Height"))
        .with_element(ElementSpec::value(
            "BitsPerPixel",
            AttributeSpec::new("value", DataType::Integer)
                .enumeration(&["1", "4", "8", "16", "24", "32"])
                .required(),
        ))
        .with_element(ElementSpec::value(
            "Compression",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&["BI_RGB", "BI_RLE8", "BI_RLE4", "BI_BITFIELDS", "BI_JPEG", "BI_PNG"])
                .required(),
        ))
        .with_element(int("ImageSize"))
        .with_element(xy("PixelsPerMeter"))
        .with_element(int("X"))
        .with_element(int("Y"))
        .with_element(int("ColorsUsed"))
        .with_element(int("ColorsImportant"))
        .with_element(ElementSpec::new("Palette", ChildPolicy::Repeat).with_children(&["PaletteEntry"]))
        .with_element(
            ElementSpec::new("PaletteEntry", ChildPolicy::Empty)
                .with_attribute(AttributeSpec::new("index", DataType::Integer).required())
                .with_attribute(AttributeSpec::new("red", DataType::Integer).range("0", "255", true, true).required())
                .with_attribute(AttributeSpec::new("green", DataType::Integer).range("0", "255", true, true).required())
                .with_attribute(AttributeSpec::new("blue", DataType::Integer).range("0", "255", true, true).required()),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::{self, decode};
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn write_with(dpi: Option<f64>) -> Vec<u8> {
        let writer = BmpWriter::new();
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])));
        let mut metadata = writer.default_image_metadata(image.color());
        if let Some(dpi) = dpi {
            metadata
                .merge_tree(STANDARD_FORMAT_NAME, &resolution::encode(dpi).unwrap())
                .unwrap();
        }
        let mut out = Vec::new();
        writer.write(&image, &metadata, &mut out).unwrap();
        out
    }

    #[test]
    fn round_trip_resolution() {
        let bytes = write_with(Some(96.0));
        assert_eq!(read_i32(&bytes, X_PELS_PER_METER), 3780);
        let tree = BmpReader::new().read_image_metadata(&mut Cursor::new(bytes), 0).unwrap();
        let res = decode(&tree).unwrap();
        assert_eq!(format!("{:.1}", res.horizontal.unwrap()), "96.0");
        assert_eq!(format!("{:.1}", res.vertical.unwrap()), "96.0");
    }

    #[test]
    fn zero_pels_per_meter_is_unspecified() {
        let mut bytes = write_with(None);
        bytes[X_PELS_PER_METER..Y_PELS_PER_METER + 4].fill(0);
        let tree = BmpReader::new().read_image_metadata(&mut Cursor::new(bytes), 0).unwrap();
        assert!(tree.child("Dimension").is_none());
        assert_eq!(
            tree.child("Compression").unwrap().child("CompressionTypeName").unwrap().attribute("value"),
            Some("BI_RGB")
        );
    }

    #[test]
    fn rejects_truncated_header() {
        let result = BmpReader::new().read_image_metadata(&mut Cursor::new(b"BM\0\0".to_vec()), 0);
        assert!(result.is_err());
    }
}
