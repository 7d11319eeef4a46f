//! Capability negotiation between metadata and codec plugins.
//!
//! Reading picks the first reader, in registry order, that declares the
//! requested format name and standard image metadata. Writing visits every
//! writer registered for a file suffix, merges the resolution fragment into
//! the writer's own default metadata and lets it encode into a fresh sink.

use anyhow::{Context, Result};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

use super::registry::PluginRegistry;
use crate::metadata::{MetadataNode, STANDARD_FORMAT_NAME};

/// Standard metadata read from one image, and the reader that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub reader: String,
    pub tree: MetadataNode,
}

/// How many qualifying writers [`merge_and_write`] invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStrategy {
    /// Every qualifying writer, each into its own freshly opened sink.
    #[default]
    All,
    /// Stop after the first writer that succeeds.
    First,
}

/// Standard metadata of image 0 in `source`, from the first reader declaring
/// `format_name` (exact match) with standard image metadata support.
///
/// `Ok(None)` when no registered reader qualifies.
pub fn select_reader_and_extract(
    registry: &PluginRegistry,
    format_name: &str,
    source: &mut dyn Read,
) -> Result<Option<Extracted>> {
    let Some(reader) = registry
        .readers_by_format_name(format_name)
        .find(|r| r.descriptor().standard_image_metadata)
    else {
        log::debug!("No reader with standard metadata for format '{format_name}'");
        return Ok(None);
    };

    let name = &reader.descriptor().name;
    log::debug!("Reading '{format_name}' metadata with {name}");
    let tree = reader
        .read_image_metadata(source, 0)
        .with_context(|| format!("{name} failed to read image metadata"))?;

    Ok(Some(Extracted {
        reader: name.clone(),
        tree,
    }))
}

/// [`merge_and_write`] with [`WriteStrategy::All`].
pub fn merge_and_write_all<W, F>(
    registry: &PluginRegistry,
    suffix: &str,
    image: &DynamicImage,
    fragment: &MetadataNode,
    open_sink: F,
) -> Result<usize>
where
    W: Write,
    F: FnMut() -> Result<W>,
{
    merge_and_write(registry, suffix, image, fragment, WriteStrategy::All, open_sink)
}

/// Encode `image` through the writers registered for `suffix`, each carrying
/// its default metadata merged with `fragment`.
///
/// Writers without standard image metadata support, and writers whose
/// default metadata is read-only, are skipped. `open_sink` is called once per
/// invoked writer and the sink is dropped before the next writer runs.
/// Returns the number of writers invoked.
pub fn merge_and_write<W, F>(
    registry: &PluginRegistry,
    suffix: &str,
    image: &DynamicImage,
    fragment: &MetadataNode,
    strategy: WriteStrategy,
    mut open_sink: F,
) -> Result<usize>
where
    W: Write,
    F: FnMut() -> Result<W>,
{
    let mut written = 0;

    for writer in registry.writers_by_suffix(suffix) {
        let name = &writer.descriptor().name;
        if !writer.descriptor().standard_image_metadata {
            log::debug!("Skipping {name}: no standard metadata support");
            continue;
        }

        let mut metadata = writer.default_image_metadata(image.color());
        if metadata.is_read_only() {
            log::debug!("Skipping {name}: default metadata is read-only");
            continue;
        }
        metadata
            .merge_tree(STANDARD_FORMAT_NAME, fragment)
            .with_context(|| format!("Failed to merge metadata for {name}"))?;

        let mut sink = open_sink()?;
        writer
            .write(image, &metadata, &mut sink)
            .with_context(|| format!("{name} failed to write image"))?;
        drop(sink);

        written += 1;
        log::debug!("Wrote image with {name}");

        if strategy == WriteStrategy::First {
            break;
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{
        ImageMetadata, ImageReaderPlugin, ImageWriterPlugin, PluginDescriptor,
    };
    use crate::resolution::{self, decode};
    use image::{ColorType, RgbImage};
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    // ── test doubles ────────────────────────────────────────────────

    struct FakeReader {
        descriptor: PluginDescriptor,
        marker: &'static str,
    }

    impl FakeReader {
        fn new(name: &str, formats: &[&str], standard: bool, marker: &'static str) -> Self {
            Self {
                descriptor: PluginDescriptor::new(name)
                    .with_format_names(formats)
                    .with_standard_metadata(standard, false),
                marker,
            }
        }
    }

    impl ImageReaderPlugin for FakeReader {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        fn read_image_metadata(&self, source: &mut dyn Read, image_index: usize) -> Result<MetadataNode> {
            let mut body = String::new();
            source.read_to_string(&mut body)?;
            Ok(MetadataNode::new(STANDARD_FORMAT_NAME)
                .with_attribute("reader", self.marker)
                .with_attribute("body", body)
                .with_attribute("index", image_index.to_string()))
        }
    }

    /// Records every tree it is asked to write.
    struct FakeWriter {
        descriptor: PluginDescriptor,
        read_only: bool,
        log: Rc<RefCell<Vec<(String, MetadataNode)>>>,
    }

    impl FakeWriter {
        fn new(
            name: &str,
            suffixes: &[&str],
            standard: bool,
            read_only: bool,
            log: &Rc<RefCell<Vec<(String, MetadataNode)>>>,
        ) -> Self {
            Self {
                descriptor: PluginDescriptor::new(name)
                    .with_suffixes(suffixes)
                    .with_standard_metadata(standard, false),
                read_only,
                log: Rc::clone(log),
            }
        }
    }

    impl ImageWriterPlugin for FakeWriter {
        fn descriptor(&self) -> &PluginDescriptor {
            &self.descriptor
        }

        fn default_image_metadata(&self, _color: ColorType) -> ImageMetadata {
            let tree = MetadataNode::new(STANDARD_FORMAT_NAME).with_child(
                MetadataNode::new("Dimension")
                    .with_child(MetadataNode::new("PixelAspectRatio").with_attribute("value", "1.0")),
            );
            if self.read_only {
                ImageMetadata::read_only(tree)
            } else {
                ImageMetadata::new(tree)
            }
        }

        fn write(&self, _image: &DynamicImage, metadata: &ImageMetadata, sink: &mut dyn Write) -> Result<()> {
            sink.write_all(self.descriptor.name.as_bytes())?;
            self.log
                .borrow_mut()
                .push((self.descriptor.name.clone(), metadata.tree().clone()));
            Ok(())
        }
    }

    fn image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::new(1, 1))
    }

    // ── read path ───────────────────────────────────────────────────

    #[test]
    fn first_standard_capable_reader_wins() {
        let mut registry = PluginRegistry::new();
        registry.register_reader(FakeReader::new("A", &["png", "PNG"], false, "a"));
        registry.register_reader(FakeReader::new("B", &["png", "PNG"], true, "b"));
        registry.register_reader(FakeReader::new("C", &["png"], true, "c"));

        let extracted = select_reader_and_extract(&registry, "png", &mut Cursor::new("pixels"))
            .unwrap()
            .unwrap();
        assert_eq!(extracted.reader, "B");
        assert_eq!(extracted.tree.attribute("reader"), Some("b"));
        assert_eq!(extracted.tree.attribute("body"), Some("pixels"));
        assert_eq!(extracted.tree.attribute("index"), Some("0"));
    }

    #[test]
    fn format_name_match_is_case_sensitive() {
        let mut registry = PluginRegistry::new();
        registry.register_reader(FakeReader::new("B", &["png"], true, "b"));
        let found = select_reader_and_extract(&registry, "PNG", &mut Cursor::new("")).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn no_standard_reader_is_not_an_error() {
        let mut registry = PluginRegistry::new();
        registry.register_reader(FakeReader::new("A", &["gif"], false, "a"));
        assert!(select_reader_and_extract(&registry, "gif", &mut Cursor::new("")).unwrap().is_none());
        assert!(select_reader_and_extract(&PluginRegistry::new(), "gif", &mut Cursor::new("")).unwrap().is_none());
    }

    // ── write path ──────────────────────────────────────────────────

    fn tif_registry(log: &Rc<RefCell<Vec<(String, MetadataNode)>>>) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        registry.register_writer(FakeWriter::new("W1", &["tif", "tiff"], true, false, log));
        registry.register_writer(FakeWriter::new("W2", &["tif"], true, true, log));
        registry.register_writer(FakeWriter::new("W3", &["tif"], false, false, log));
        registry.register_writer(FakeWriter::new("W4", &["tif"], true, false, log));
        registry.register_writer(FakeWriter::new("W5", &["png"], true, false, log));
        registry
    }

    #[test]
    fn writes_through_every_qualifying_writer() {
        let log = Rc::default();
        let registry = tif_registry(&log);
        let fragment = resolution::encode(300.0).unwrap();
        let mut opened = 0;

        let count = merge_and_write_all(&registry, "tif", &image(), &fragment, || {
            opened += 1;
            Ok(Cursor::new(Vec::new()))
        })
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(opened, 2);
        let log = log.borrow();
        let names: Vec<&str> = log.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["W1", "W4"]);
        for (_, tree) in log.iter() {
            let res = decode(tree).unwrap();
            assert_eq!(format!("{:.1}", res.horizontal.unwrap()), "300.0");
            // default content survives the merge
            let dim = tree.child("Dimension").unwrap();
            assert_eq!(dim.child("PixelAspectRatio").unwrap().attribute("value"), Some("1.0"));
            assert_eq!(dim.children().len(), 3);
        }
    }

    #[test]
    fn first_strategy_stops_after_one_write() {
        let log = Rc::default();
        let registry = tif_registry(&log);
        let fragment = resolution::encode(72.0).unwrap();
        let count = merge_and_write(&registry, "tif", &image(), &fragment, WriteStrategy::First, || {
            Ok(Vec::new())
        })
        .unwrap();
        assert_eq!(count, 1);
        assert_eq!(log.borrow()[0].0, "W1");
    }

    #[test]
    fn unknown_suffix_writes_nothing() {
        let log = Rc::default();
        let registry = tif_registry(&log);
        let fragment = resolution::encode(72.0).unwrap();
        for suffix in ["gif", "TIF", ""] {
            let count = merge_and_write_all(&registry, suffix, &image(), &fragment, || -> Result<Vec<u8>> {
                panic!("no sink should be opened for '{suffix}'")
            })
            .unwrap();
            assert_eq!(count, 0);
        }
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn sink_errors_propagate() {
        let log = Rc::default();
        let registry = tif_registry(&log);
        let fragment = resolution::encode(72.0).unwrap();
        let result = merge_and_write_all(&registry, "tiff", &image(), &fragment, || -> Result<Vec<u8>> {
            anyhow::bail!("disk full")
        });
        assert!(result.is_err());
    }

    #[test]
    fn strategy_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&WriteStrategy::First).unwrap(), "\"first\"");
        let parsed: WriteStrategy = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(parsed, WriteStrategy::All);
    }
}
