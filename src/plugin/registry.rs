//! Ordered collection of reader and writer plugins.
//!
//! Registration order is significant: every query returns plugins in the
//! order they were registered, and the negotiator picks the first match.

use super::{
    BmpReader, BmpWriter, ImageReaderPlugin, ImageWriterPlugin, JpegReader, JpegWriter, PngReader,
    PngWriter, TiffReader, TiffWriter,
};

#[derive(Default)]
pub struct PluginRegistry {
    readers: Vec<Box<dyn ImageReaderPlugin>>,
    writers: Vec<Box<dyn ImageWriterPlugin>>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the PNG, JPEG, TIFF and BMP plugins, in that order.
    pub fn with_builtin_plugins() -> Self {
        let mut registry = Self::new();
        registry.register_reader(PngReader::new());
        registry.register_reader(JpegReader::new());
        registry.register_reader(TiffReader::new());
        registry.register_reader(BmpReader::new());
        registry.register_writer(PngWriter::new());
        registry.register_writer(JpegWriter::new());
        registry.register_writer(TiffWriter::new());
        registry.register_writer(BmpWriter::new());
        registry
    }

    pub fn register_reader(&mut self, reader: impl ImageReaderPlugin + 'static) {
        log::debug!("Registered reader {}", reader.descriptor().name);
        self.readers.push(Box::new(reader));
    }

    pub fn register_writer(&mut self, writer: impl ImageWriterPlugin + 'static) {
        log::debug!("Registered writer {}", writer.descriptor().name);
        self.writers.push(Box::new(writer));
    }

    pub fn readers(&self) -> impl Iterator<Item = &dyn ImageReaderPlugin> {
        self.readers.iter().map(|r| r.as_ref())
    }

    pub fn writers(&self) -> impl Iterator<Item = &dyn ImageWriterPlugin> {
        self.writers.iter().map(|w| w.as_ref())
    }

    /// Readers declaring exactly `format_name` (case-sensitive).
    pub fn readers_by_format_name<'a>(
        &'a self,
        format_name: &'a str,
    ) -> impl Iterator<Item = &'a dyn ImageReaderPlugin> + 'a {
        self.readers().filter(move |r| r.descriptor().has_format_name(format_name))
    }

    /// Readers declaring `format_name`, ignoring ASCII case.
    pub fn readers_supporting_format<'a>(
        &'a self,
        format_name: &'a str,
    ) -> impl Iterator<Item = &'a dyn ImageReaderPlugin> + 'a {
        self.readers()
            .filter(move |r| r.descriptor().has_format_name_ignore_case(format_name))
    }

    /// Writers declaring exactly `suffix` among their file suffixes.
    pub fn writers_by_suffix<'a>(&'a self, suffix: &'a str) -> impl Iterator<Item = &'a dyn ImageWriterPlugin> + 'a {
        self.writers().filter(move |w| w.descriptor().has_suffix(suffix))
    }

    pub fn reader_file_suffixes(&self) -> Vec<String> {
        self.collect_unique(|r| &r.descriptor().file_suffixes)
    }

    pub fn reader_format_names(&self) -> Vec<String> {
        self.collect_unique(|r| &r.descriptor().format_names)
    }

    pub fn reader_mime_types(&self) -> Vec<String> {
        self.collect_unique(|r| &r.descriptor().mime_types)
    }

    fn collect_unique<F>(&self, field: F) -> Vec<String>
    where
        F: Fn(&dyn ImageReaderPlugin) -> &Vec<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for reader in self.readers() {
            for value in field(reader) {
                if !out.contains(value) {
                    out.push(value.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_and_counts() {
        let registry = PluginRegistry::with_builtin_plugins();
        let names: Vec<&str> = registry.readers().map(|r| r.descriptor().name.as_str()).collect();
        assert_eq!(names, ["PngReader", "JpegReader", "TiffReader", "BmpReader"]);
        assert_eq!(registry.writers().count(), 4);
    }

    #[test]
    fn format_name_lookup_is_case_sensitive() {
        let registry = PluginRegistry::with_builtin_plugins();
        assert_eq!(registry.readers_by_format_name("PNG").count(), 1);
        assert_eq!(registry.readers_by_format_name("Png").count(), 0);
        assert_eq!(registry.readers_supporting_format("Png").count(), 1);
    }

    #[test]
    fn suffix_lookup_is_exact() {
        let registry = PluginRegistry::with_builtin_plugins();
        let tif: Vec<&str> = registry
            .writers_by_suffix("tif")
            .map(|w| w.descriptor().name.as_str())
            .collect();
        assert_eq!(tif, ["TiffWriter"]);
        assert_eq!(registry.writers_by_suffix("TIF").count(), 0);
        assert_eq!(registry.writers_by_suffix("").count(), 0);
    }

    #[test]
    fn aggregates_are_deduplicated_in_order() {
        let registry = PluginRegistry::with_builtin_plugins();
        assert_eq!(
            registry.reader_file_suffixes(),
            ["png", "jpg", "jpeg", "tif", "tiff", "bmp"]
        );
        let mimes = registry.reader_mime_types();
        assert_eq!(mimes.first().map(String::as_str), Some("image/png"));
        let mut sorted = mimes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), mimes.len());
    }

    #[test]
    fn empty_registry() {
        let registry = PluginRegistry::new();
        assert!(registry.reader_format_names().is_empty());
        assert_eq!(registry.writers_by_suffix("png").count(), 0);
    }
}
