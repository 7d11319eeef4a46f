//! Image codec plugins and their capability descriptors.
//!
//! A plugin advertises what it can handle through a [`PluginDescriptor`]:
//! file suffixes, format names, MIME types, and which metadata formats it
//! understands. Selection code in [`negotiate`] only ever looks at
//! descriptors and the two traits below, so any reader or writer can be
//! registered, including test doubles.
//!
//! The crate ships PNG, JPEG, TIFF and BMP plugins; see
//! [`PluginRegistry::with_builtin_plugins`].

mod bmp;
mod exif;
mod jpeg;
pub mod negotiate;
mod png;
pub mod registry;
mod tiff;
mod tiff_ifd;

pub use bmp::{BmpReader, BmpWriter};
pub use jpeg::{JpegReader, JpegWriter};
pub use negotiate::{
    Extracted, WriteStrategy, merge_and_write, merge_and_write_all, select_reader_and_extract,
};
pub use png::{PngReader, PngWriter};
pub use registry::PluginRegistry;
pub use tiff::{TiffReader, TiffWriter};

use anyhow::{Context, Result};
use image::{ColorType, DynamicImage};
use std::io::{Read, Write};

use crate::error::MetadataError;
use crate::metadata::{MetadataNode, MetadataSchema, STANDARD_FORMAT_NAME, standard_schema};
use crate::resolution::{DIMENSION, HORIZONTAL_PIXEL_SIZE, VERTICAL_PIXEL_SIZE};

/// Static capabilities of a reader or writer plugin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginDescriptor {
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub file_suffixes: Vec<String>,
    pub format_names: Vec<String>,
    pub mime_types: Vec<String>,
    pub standard_image_metadata: bool,
    pub standard_stream_metadata: bool,
    pub native_image_metadata_format: Option<String>,
    pub native_stream_metadata_format: Option<String>,
    pub extra_image_metadata_formats: Vec<String>,
    pub extra_stream_metadata_formats: Vec<String>,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl PluginDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>, version: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self.version = version.into();
        self
    }

    pub fn with_suffixes(mut self, suffixes: &[&str]) -> Self {
        self.file_suffixes = strings(suffixes);
        self
    }

    pub fn with_format_names(mut self, names: &[&str]) -> Self {
        self.format_names = strings(names);
        self
    }

    pub fn with_mime_types(mut self, types: &[&str]) -> Self {
        self.mime_types = strings(types);
        self
    }

    pub fn with_standard_metadata(mut self, image: bool, stream: bool) -> Self {
        self.standard_image_metadata = image;
        self.standard_stream_metadata = stream;
        self
    }

    pub fn with_native_image_format(mut self, name: impl Into<String>) -> Self {
        self.native_image_metadata_format = Some(name.into());
        self
    }

    pub fn with_native_stream_format(mut self, name: impl Into<String>) -> Self {
        self.native_stream_metadata_format = Some(name.into());
        self
    }

    /// Exact, case-sensitive format name match.
    pub fn has_format_name(&self, name: &str) -> bool {
        self.format_names.iter().any(|f| f == name)
    }

    pub fn has_format_name_ignore_case(&self, name: &str) -> bool {
        self.format_names.iter().any(|f| f.eq_ignore_ascii_case(name))
    }

    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.file_suffixes.iter().any(|s| s == suffix)
    }
}

/// Whether a metadata format describes one image or the whole stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataScope {
    Image,
    Stream,
}

/// A plugin that can extract metadata from an encoded image.
pub trait ImageReaderPlugin {
    fn descriptor(&self) -> &PluginDescriptor;

    /// Schema of `format_name` in `scope`, if this plugin declares one.
    ///
    /// The default answers for the standard format only, according to the
    /// descriptor's support flags.
    fn metadata_schema(&self, scope: MetadataScope, format_name: &str) -> Option<&dyn MetadataSchema> {
        let supported = match scope {
            MetadataScope::Image => self.descriptor().standard_image_metadata,
            MetadataScope::Stream => self.descriptor().standard_stream_metadata,
        };
        (supported && format_name == STANDARD_FORMAT_NAME).then(|| standard_schema() as &dyn MetadataSchema)
    }

    /// Standard metadata tree of the image at `image_index` in `source`.
    fn read_image_metadata(&self, source: &mut dyn Read, image_index: usize) -> Result<MetadataNode>;
}

/// A plugin that can encode an image together with its metadata.
pub trait ImageWriterPlugin {
    fn descriptor(&self) -> &PluginDescriptor;

    /// Metadata this writer would emit for an image of `color` when nothing
    /// else is specified.
    fn default_image_metadata(&self, color: ColorType) -> ImageMetadata;

    /// Encode `image` with `metadata` into `sink`.
    fn write(&self, image: &DynamicImage, metadata: &ImageMetadata, sink: &mut dyn Write) -> Result<()>;
}

/// A metadata instance owned by a writer, held as a standard tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMetadata {
    tree: MetadataNode,
    read_only: bool,
}

impl ImageMetadata {
    pub fn new(tree: MetadataNode) -> Self {
        Self { tree, read_only: false }
    }

    pub fn read_only(tree: MetadataNode) -> Self {
        Self { tree, read_only: true }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn tree(&self) -> &MetadataNode {
        &self.tree
    }

    /// Merge a standard-format fragment into this instance.
    pub fn merge_tree(&mut self, format_name: &str, fragment: &MetadataNode) -> Result<(), MetadataError> {
        if self.read_only {
            return Err(MetadataError::ReadOnly);
        }
        if format_name != STANDARD_FORMAT_NAME {
            return Err(MetadataError::UnsupportedFormat(format_name.to_string()));
        }
        self.tree.merge(fragment)
    }
}

// ── helpers shared by the built-in plugins ──────────────────────────

fn builtin_descriptor(name: &str) -> PluginDescriptor {
    PluginDescriptor::new(name).with_vendor("metaprobe", env!("CARGO_PKG_VERSION"))
}

fn read_all(source: &mut dyn Read, image_index: usize) -> Result<Vec<u8>> {
    if image_index != 0 {
        return Err(MetadataError::ImageIndexOutOfRange(image_index).into());
    }
    let mut data = Vec::new();
    source.read_to_end(&mut data).context("Failed to read image stream")?;
    Ok(data)
}

fn chroma(color_space: &str, channels: u8) -> MetadataNode {
    MetadataNode::new("Chroma")
        .with_child(MetadataNode::new("ColorSpaceType").with_attribute("name", color_space))
        .with_child(MetadataNode::new("NumChannels").with_attribute("value", channels.to_string()))
}

fn chroma_for(color: ColorType) -> MetadataNode {
    let channels = color.channel_count();
    let space = if channels <= 2 { "GRAY" } else { "RGB" };
    chroma(space, channels)
}

fn compression(name: &str, lossless: bool) -> MetadataNode {
    MetadataNode::new("Compression")
        .with_child(MetadataNode::new("CompressionTypeName").with_attribute("value", name))
        .with_child(
            MetadataNode::new("Lossless").with_attribute("value", if lossless { "TRUE" } else { "FALSE" }),
        )
}

/// `Dimension` element from per-axis pixel sizes in millimeters.
///
/// `aspect` is only used when the sizes themselves are unknown.
fn dimension(aspect: Option<f64>, horizontal_mm: Option<f64>, vertical_mm: Option<f64>) -> MetadataNode {
    let aspect = match (horizontal_mm, vertical_mm) {
        (Some(h), Some(v)) if v > 0.0 => Some(h / v),
        _ => aspect,
    };

    let mut node = MetadataNode::new(DIMENSION);
    if let Some(aspect) = aspect {
        node.push_child(MetadataNode::new("PixelAspectRatio").with_attribute("value", aspect.to_string()));
    }
    node.push_child(MetadataNode::new("ImageOrientation").with_attribute("value", "Normal"));
    if let Some(h) = horizontal_mm {
        node.push_child(MetadataNode::new(HORIZONTAL_PIXEL_SIZE).with_attribute("value", h.to_string()));
    }
    if let Some(v) = vertical_mm {
        node.push_child(MetadataNode::new(VERTICAL_PIXEL_SIZE).with_attribute("value", v.to_string()));
    }
    node
}

fn standard_root(children: impl IntoIterator<Item = MetadataNode>) -> MetadataNode {
    let mut root = MetadataNode::new(STANDARD_FORMAT_NAME);
    for child in children {
        root.push_child(child);
    }
    root
}

/// Per-axis resolution to embed, filling a missing axis from the other one.
fn target_dpi(metadata: &ImageMetadata) -> Result<Option<(f64, f64)>> {
    let resolution = crate::resolution::decode(metadata.tree())?;
    Ok(match (resolution.horizontal, resolution.vertical) {
        (Some(h), Some(v)) => Some((h, v)),
        (Some(h), None) => Some((h, h)),
        (None, Some(v)) => Some((v, v)),
        (None, None) => None,
    })
}

fn encode_pixels(image: &DynamicImage, format: image::ImageFormat) -> Result<Vec<u8>> {
    let mut encoded = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut encoded, format)
        .with_context(|| format!("Failed to encode {format:?} image"))?;
    Ok(encoded.into_inner())
}
