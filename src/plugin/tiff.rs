use anyhow::{Context, Result};
use image::{ColorType, DynamicImage, ImageFormat};
use std::borrow::Cow;
use std::io::{Read, Write};

use super::exif::{Ifd0, TAG_COMPRESSION, TAG_SAMPLES_PER_PIXEL};
use super::tiff_ifd::patch_resolution;
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

pub const NATIVE_FORMAT_NAME: &str = "tiff_image_1.0";
pub const NATIVE_STREAM_FORMAT_NAME: &str = "tiff_stream_1.0";

fn tiff_descriptor(name: &str) -> PluginDescriptor {
    builtin_descriptor(name)
        .with_suffixes(&["tif", "tiff"])
        .with_format_names(&["tif", "TIF", "tiff", "TIFF"])
        .with_mime_types(&["image/tiff"])
        .with_standard_metadata(true, false)
        .with_native_image_format(NATIVE_FORMAT_NAME)
        .with_native_stream_format(NATIVE_STREAM_FORMAT_NAME)
}

fn compression_name(code: u32) -> (&'static str, bool) {
    match code {
        1 => ("None", true),
        2 => ("CCITT RLE", true),
        3 => ("CCITT T.4", true),
        4 => ("CCITT T.6", true),
        5 => ("LZW", true),
        6 | 7 => ("JPEG", false),
        8 | 32946 => ("Deflate", true),
        32773 => ("PackBits", true),
        _ => ("Unknown", true),
    }
}

pub struct TiffReader {
    descriptor: PluginDescriptor,
    native: DeclaredSchema,
    native_stream: DeclaredSchema,
}

impl TiffReader {
    pub fn new() -> Self {
        Self {
            descriptor: tiff_descriptor("TiffReader"),
            native: native_schema(),
            native_stream: native_stream_schema(),
        }
    }
}

impl Default for TiffReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReaderPlugin for TiffReader {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn metadata_schema(&self, scope: MetadataScope, format_name: &str) -> Option<&dyn MetadataSchema> {
        match (scope, format_name) {
            (MetadataScope::Image, STANDARD_FORMAT_NAME) => Some(standard_schema()),
            (MetadataScope::Image, NATIVE_FORMAT_NAME) => Some(&self.native),
            (MetadataScope::Stream, NATIVE_STREAM_FORMAT_NAME) => Some(&self.native_stream),
            _ => None,
        }
    }

    fn read_image_metadata(&self, source: &mut dyn Read, image_index: usize) -> Result<MetadataNode> {
        let data = read_all(source, image_index)?;
        let ifd = Ifd0::read(&data)
            .context("Failed to parse TIFF")?
            .ok_or_else(|| MetadataError::malformed("TIFF", "no readable IFD0"))?;

        let channels = ifd.unsigned(TAG_SAMPLES_PER_PIXEL).unwrap_or(1).min(u32::from(u8::MAX)) as u8;
        let space = if channels <= 2 { "GRAY" } else { "RGB" };
        let (codec, lossless) = compression_name(ifd.unsigned(TAG_COMPRESSION).unwrap_or(1));

        let mut tree = standard_root([chroma(space, channels), compression(codec, lossless)]);
        let (h, v) = ifd.pixel_size_mm();
        if h.is_some() || v.is_some() {
            tree.push_child(dimension(None, h, v));
        }

        log::debug!("TIFF metadata:\n{tree}");
        Ok(tree)
    }
}

/// Writes uncompressed TIFF and rewrites the IFD0 resolution entries.
pub struct TiffWriter {
    descriptor: PluginDescriptor,
}

impl TiffWriter {
    pub fn new() -> Self {
        Self {
            descriptor: tiff_descriptor("TiffWriter"),
        }
    }
}

impl Default for TiffWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriterPlugin for TiffWriter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn default_image_metadata(&self, color: ColorType) -> ImageMetadata {
        ImageMetadata::new(standard_root([chroma_for(color), compression("None", true)]))
    }

    fn write(&self, image: &DynamicImage, metadata: &ImageMetadata, sink: &mut dyn Write) -> Result<()> {
        let pixels: Cow<'_, DynamicImage> = match image {
            DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
                Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8()))
            }
            _ => Cow::Borrowed(image),
        };
        let mut encoded = encode_pixels(&pixels, ImageFormat::Tiff)?;

        if let Some((x_dpi, y_dpi)) = target_dpi(metadata)? {
            patch_resolution(&mut encoded, x_dpi, y_dpi)?;
            log::debug!("TIFF resolution set to {x_dpi} x {y_dpi} dpi");
        }

        sink.write_all(&encoded).context("Failed to write TIFF data")?;
        sink.flush().context("Failed to flush TIFF data")?;
        Ok(())
    }
}

fn native_schema() -> DeclaredSchema {
    let values = |list: &str, item: &str, data_type: DataType| {
        [
            ElementSpec::new(list, ChildPolicy::Repeat).with_children(&[item]),
            ElementSpec::value(item, AttributeSpec::new("value", data_type)),
        ]
    };

    let mut schema = DeclaredSchema::new(NATIVE_FORMAT_NAME, NATIVE_FORMAT_NAME)
        .with_element(ElementSpec::new(NATIVE_FORMAT_NAME, ChildPolicy::Repeat).with_children(&["TIFFIFD"]))
        .with_element(
            ElementSpec::new("TIFFIFD", ChildPolicy::Repeat)
                .with_children(&["TIFFField"])
                .with_attribute(AttributeSpec::new("tagSets", DataType::String).required())
                .with_attribute(AttributeSpec::new("parentTagNumber", DataType::Integer))
                .with_attribute(AttributeSpec::new("parentTagName", DataType::String)),
        )
        .with_element(
            ElementSpec::new("TIFFField", ChildPolicy::Choice)
                .with_children(&[
                    "TIFFBytes",
                    "TIFFAsciis",
                    "TIFFShorts",
                    "TIFFLongs",
                    "TIFFRationals",
                    "TIFFUndefined",
                    "TIFFIFD",
                ])
                .with_attribute(
                    AttributeSpec::new("number", DataType::Integer)
                        .range("0", "65535", true, true)
                        .required(),
                )
                .with_attribute(AttributeSpec::new("name", DataType::String)),
        )
        .with_element(
            ElementSpec::new("TIFFUndefined", ChildPolicy::Empty)
                .with_attribute(AttributeSpec::new("value", DataType::Integer).list(0, u32::MAX).required()),
        );

    for element in [
        values("TIFFBytes", "TIFFByte", DataType::Integer),
        values("TIFFAsciis", "TIFFAscii", DataType::String),
        values("TIFFShorts", "TIFFShort", DataType::Integer),
        values("TIFFLongs", "TIFFLong", DataType::Integer),
        values("TIFFRationals", "TIFFRational", DataType::String),
    ]
    .into_iter()
    .flatten()
    {
        schema.add_element(element);
    }
    schema
}

fn native_stream_schema() -> DeclaredSchema {
    DeclaredSchema::new(NATIVE_STREAM_FORMAT_NAME, NATIVE_STREAM_FORMAT_NAME)
        .with_element(
            ElementSpec::new(NATIVE_STREAM_FORMAT_NAME, ChildPolicy::Some).with_children(&["ByteOrder"]),
        )
        .with_element(ElementSpec::value(
            "ByteOrder",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&["BIG_ENDIAN", "LITTLE_ENDIAN"])
                .required(),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::render;
    use crate::plugin::tiff_ifd::tests::tiff_with_resolution;
    use crate::resolution::{self, decode};
    use image::{GrayImage, Luma};
    use std::io::Cursor;

    fn write_with(image: &DynamicImage, dpi: Option<f64>) -> Vec<u8> {
        let writer = TiffWriter::new();
        let mut metadata = writer.default_image_metadata(image.color());
        if let Some(dpi) = dpi {
            metadata
                .merge_tree(STANDARD_FORMAT_NAME, &resolution::encode(dpi).unwrap())
                .unwrap();
        }
        let mut out = Vec::new();
        writer.write(image, &metadata, &mut out).unwrap();
        out
    }

    fn read(bytes: Vec<u8>) -> MetadataNode {
        TiffReader::new().read_image_metadata(&mut Cursor::new(bytes), 0).unwrap()
    }

    #[test]
    fn round_trip_resolution() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(5, 5, Luma([128])));
        let tree = read(write_with(&image, Some(600.0)));
        let res = decode(&tree).unwrap();
        assert_eq!(format!("{:.1}", res.horizontal.unwrap()), "600.0");
        assert_eq!(format!("{:.1}", res.vertical.unwrap()), "600.0");
        assert_eq!(
            tree.child("Chroma").unwrap().child("ColorSpaceType").unwrap().attribute("name"),
            Some("GRAY")
        );
    }

    #[test]
    fn unwritten_resolution_has_no_dimension() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([0])));
        let tree = read(write_with(&image, None));
        assert!(tree.child("Dimension").is_none());
    }

    #[test]
    fn gray_alpha_is_widened() {
        let image = DynamicImage::ImageLumaA8(image::GrayAlphaImage::from_pixel(2, 2, image::LumaA([9, 255])));
        let tree = read(write_with(&image, Some(72.0)));
        assert_eq!(
            tree.child("Chroma").unwrap().child("NumChannels").unwrap().attribute("value"),
            Some("4")
        );
    }

    #[test]
    fn reads_hand_built_ifd() {
        let tree = read(tiff_with_resolution((300, 1), (150, 1), 2));
        let res = decode(&tree).unwrap();
        assert_eq!(format!("{:.1}", res.horizontal.unwrap()), "300.0");
        assert_eq!(format!("{:.1}", res.vertical.unwrap()), "150.0");
        let dim = tree.child("Dimension").unwrap();
        assert_eq!(dim.child("PixelAspectRatio").unwrap().attribute("value"), Some("0.5"));
    }

    #[test]
    fn native_schema_cycle_renders_finitely() {
        let schema = native_schema();
        let lines: Vec<String> = render(&schema, 0).collect();
        assert!(lines.iter().any(|l| l.trim() == "<TIFFIFD/> (see above)"));
        assert_eq!(lines.last().unwrap(), &format!("</{NATIVE_FORMAT_NAME}>"));
    }

    #[test]
    fn stream_schema_only_in_stream_scope() {
        let reader = TiffReader::new();
        assert!(reader.metadata_schema(MetadataScope::Stream, NATIVE_STREAM_FORMAT_NAME).is_some());
        assert!(reader.metadata_schema(MetadataScope::Image, NATIVE_STREAM_FORMAT_NAME).is_none());
        assert!(reader.metadata_schema(MetadataScope::Stream, STANDARD_FORMAT_NAME).is_none());
    }

    #[test]
    fn compression_names() {
        assert_eq!(compression_name(5), ("LZW", true));
        assert_eq!(compression_name(7), ("JPEG", false));
    }
}
