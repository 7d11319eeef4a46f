//! The format-neutral metadata vocabulary shared by every plugin that
//! reports standard metadata support.

use std::sync::OnceLock;

use super::schema::{AttributeSpec, ChildPolicy, DataType, DeclaredSchema, ElementSpec};

/// Name of the standard metadata format, also the root element name of
/// every standard tree.
pub const STANDARD_FORMAT_NAME: &str = "standard_image_metadata_1.0";

const BOOLEAN_VALUES: &[&str] = &["TRUE", "FALSE"];

/// The standard schema, built once per process.
pub fn standard_schema() -> &'static DeclaredSchema {
    static SCHEMA: OnceLock<DeclaredSchema> = OnceLock::new();
    SCHEMA.get_or_init(build_standard_schema)
}

fn value(name: &str, data_type: DataType) -> ElementSpec {
    ElementSpec::value(name, AttributeSpec::new("value", data_type).required())
}

fn boolean(name: &str, default: &str) -> ElementSpec {
    ElementSpec::value(
        name,
        AttributeSpec::new("value", DataType::Boolean)
            .enumeration(BOOLEAN_VALUES)
            .default_value(default),
    )
}

fn rgb_entry(name: &str, with_index: bool) -> ElementSpec {
    let channel = |c: &str| {
        AttributeSpec::new(c, DataType::Integer)
            .range("0", "255", true, true)
            .required()
    };
    let mut spec = ElementSpec::new(name, ChildPolicy::Empty);
    if with_index {
        spec = spec.with_attribute(AttributeSpec::new("index", DataType::Integer).required());
    }
    spec.with_attribute(channel("red"))
        .with_attribute(channel("green"))
        .with_attribute(channel("blue"))
}

fn build_standard_schema() -> DeclaredSchema {
    DeclaredSchema::new(STANDARD_FORMAT_NAME, STANDARD_FORMAT_NAME)
        .with_element(ElementSpec::new(STANDARD_FORMAT_NAME, ChildPolicy::Some).with_children(&[
            "Chroma",
            "Compression",
            "Data",
            "Dimension",
            "Document",
            "Text",
            "Transparency",
        ]))
        // Chroma
        .with_element(ElementSpec::new("Chroma", ChildPolicy::Some).with_children(&[
            "ColorSpaceType",
            "NumChannels",
            "Gamma",
            "BlackIsZero",
            "Palette",
            "BackgroundIndex",
            "BackgroundColor",
        ]))
        .with_element(ElementSpec::value(
            "ColorSpaceType",
            AttributeSpec::new("name", DataType::String)
                .enumeration(&[
                    "XYZ", "Lab", "Luv", "YCbCr", "Yxy", "YCCK", "PhotoYCC", "RGB", "GRAY", "HSV",
                    "HLS", "CMYK", "CMY",
                ])
                .required(),
        ))
        .with_element(ElementSpec::value(
            "NumChannels",
            AttributeSpec::new("value", DataType::Integer).list(0, u32::MAX).required(),
        ))
        .with_element(value("Gamma", DataType::Float))
        .with_element(boolean("BlackIsZero", "TRUE"))
        .with_element(ElementSpec::new("Palette", ChildPolicy::Repeat).with_children(&["PaletteEntry"]))
        .with_element(rgb_entry("PaletteEntry", true))
        .with_element(ElementSpec::value(
            "BackgroundIndex",
            AttributeSpec::new("value", DataType::Integer).required(),
        ))
        .with_element(rgb_entry("BackgroundColor", false))
        // Compression
        .with_element(ElementSpec::new("Compression", ChildPolicy::Some).with_children(&[
            "CompressionTypeName",
            "Lossless",
            "NumProgressiveScans",
            "BitRate",
        ]))
        .with_element(value("CompressionTypeName", DataType::String))
        .with_element(boolean("Lossless", "TRUE"))
        .with_element(value("NumProgressiveScans", DataType::Integer))
        .with_element(value("BitRate", DataType::Float))
        // Data
        .with_element(ElementSpec::new("Data", ChildPolicy::Some).with_children(&[
            "PlanarConfiguration",
            "SampleFormat",
            "BitsPerSample",
            "SignificantBitsPerSample",
            "SampleMSB",
        ]))
        .with_element(ElementSpec::value(
            "PlanarConfiguration",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&["PixelInterleaved", "PlaneInterleaved", "LineInterleaved", "TileInterleaved"])
                .required(),
        ))
        .with_element(ElementSpec::value(
            "SampleFormat",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&["SignedIntegral", "UnsignedIntegral", "Real", "Index"])
                .required(),
        ))
        .with_element(ElementSpec::value(
            "BitsPerSample",
            AttributeSpec::new("value", DataType::Integer).list(1, u32::MAX).required(),
        ))
        .with_element(ElementSpec::value(
            "SignificantBitsPerSample",
            AttributeSpec::new("value", DataType::Integer).list(1, u32::MAX).required(),
        ))
        .with_element(ElementSpec::value(
            "SampleMSB",
            AttributeSpec::new("value", DataType::Integer).list(1, u32::MAX).required(),
        ))
        // Dimension
        .with_element(ElementSpec::new("Dimension", ChildPolicy::Some).with_children(&[
            "PixelAspectRatio",
            "ImageOrientation",
            "HorizontalPixelSize",
            "VerticalPixelSize",
            "HorizontalPhysicalPixelSpacing",
            "VerticalPhysicalPixelSpacing",
            "HorizontalPosition",
            "VerticalPosition",
            "HorizontalPixelOffset",
            "VerticalPixelOffset",
            "HorizontalScreenSize",
            "VerticalScreenSize",
        ]))
        .with_element(value("PixelAspectRatio", DataType::Float))
        .with_element(ElementSpec::value(
            "ImageOrientation",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&[
                    "Normal", "Rotate90", "Rotate180", "Rotate270", "FlipH", "FlipV", "FlipHRotate90",
                    "FlipVRotate90",
                ])
                .required(),
        ))
        .with_element(value("HorizontalPixelSize", DataType::Float))
        .with_element(value("VerticalPixelSize", DataType::Float))
        .with_element(value("HorizontalPhysicalPixelSpacing", DataType::Float))
        .with_element(value("VerticalPhysicalPixelSpacing", DataType::Float))
        .with_element(value("HorizontalPosition", DataType::Float))
        .with_element(value("VerticalPosition", DataType::Float))
        .with_element(value("HorizontalPixelOffset", DataType::Integer))
        .with_element(value("VerticalPixelOffset", DataType::Integer))
        .with_element(value("HorizontalScreenSize", DataType::Integer))
        .with_element(value("VerticalScreenSize", DataType::Integer))
        // Document
        .with_element(ElementSpec::new("Document", ChildPolicy::Some).with_children(&[
            "FormatVersion",
            "SubimageInterpretation",
            "ImageCreationTime",
            "ImageModificationTime",
        ]))
        .with_element(value("FormatVersion", DataType::String))
        .with_element(ElementSpec::value(
            "SubimageInterpretation",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&[
                    "Standalone",
                    "SinglePage",
                    "FullResolution",
                    "ReducedResolution",
                    "PyramidLayer",
                    "Preview",
                    "VolumeSlice",
                    "ObjectView",
                    "Panorama",
                    "AnimationFrame",
                    "TransparencyMask",
                    "CompositingLayer",
                    "SpectralSlice",
                    "Unknown",
                ])
                .required(),
        ))
        .with_element(time_element("ImageCreationTime"))
        .with_element(time_element("ImageModificationTime"))
        // Text
        .with_element(ElementSpec::new("Text", ChildPolicy::Repeat).with_children(&["TextEntry"]))
        .with_element(
            ElementSpec::new("TextEntry", ChildPolicy::Empty)
                .with_attribute(AttributeSpec::new("keyword", DataType::String))
                .with_attribute(AttributeSpec::new("value", DataType::String).required())
                .with_attribute(AttributeSpec::new("language", DataType::String))
                .with_attribute(AttributeSpec::new("encoding", DataType::String))
                .with_attribute(
                    AttributeSpec::new("compression", DataType::String)
                        .enumeration(&["none", "lzw", "zip", "bzip", "other"])
                        .default_value("none"),
                ),
        )
        // Transparency
        .with_element(ElementSpec::new("Transparency", ChildPolicy::Some).with_children(&[
            "Alpha",
            "TransparentIndex",
            "TransparentColor",
            "TileTransparencies",
            "TileOpacities",
        ]))
        .with_element(ElementSpec::value(
            "Alpha",
            AttributeSpec::new("value", DataType::String)
                .enumeration(&["none", "premultiplied", "nonpremultiplied"])
                .default_value("none"),
        ))
        .with_element(value("TransparentIndex", DataType::Integer))
        .with_element(ElementSpec::value(
            "TransparentColor",
            AttributeSpec::new("value", DataType::Integer).list(0, u32::MAX).required(),
        ))
        .with_element(ElementSpec::new("TileTransparencies", ChildPolicy::Repeat).with_children(&["TransparentTile"]))
        .with_element(tile_element("TransparentTile"))
        .with_element(ElementSpec::new("TileOpacities", ChildPolicy::Repeat).with_children(&["OpaqueTile"]))
        .with_element(tile_element("OpaqueTile"))
}

fn time_element(name: &str) -> ElementSpec {
    let field = |n: &str, min: &str, max: &str| {
        AttributeSpec::new(n, DataType::Integer).range(min, max, true, true)
    };
    ElementSpec::new(name, ChildPolicy::Empty)
        .with_attribute(AttributeSpec::new("year", DataType::Integer).required())
        .with_attribute(field("month", "1", "12").required())
        .with_attribute(field("day", "1", "31").required())
        .with_attribute(field("hour", "0", "23").default_value("0"))
        .with_attribute(field("minute", "0", "59").default_value("0"))
        .with_attribute(field("second", "0", "60").default_value("0"))
}

fn tile_element(name: &str) -> ElementSpec {
    ElementSpec::new(name, ChildPolicy::Empty)
        .with_attribute(AttributeSpec::new("x", DataType::Integer).required())
        .with_attribute(AttributeSpec::new("y", DataType::Integer).required())
}
