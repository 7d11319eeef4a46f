use image::{DynamicImage, Rgb, RgbImage};
use metaprobe::config::Config;
use metaprobe::metadata::{MetadataNode, STANDARD_FORMAT_NAME, render, standard_schema};
use metaprobe::pipeline::{change_resolution, collect_inputs, read_resolution};
use metaprobe::plugin::{
    ImageMetadata, ImageWriterPlugin, PluginDescriptor, PluginRegistry, WriteStrategy,
    merge_and_write,
};
use metaprobe::report::write_resolution_report;
use metaprobe::resolution;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;

fn sample(path: &Path) {
    DynamicImage::ImageRgb8(RgbImage::from_fn(16, 8, |x, y| Rgb([x as u8 * 16, y as u8 * 32, 128])))
        .save(path)
        .unwrap();
}

fn dpi_of(registry: &PluginRegistry, path: &Path) -> (String, String) {
    let result = read_resolution(registry, path);
    assert!(!result.failed(), "{:?}", result.error);
    let res = result.resolution.expect("a reader for the file");
    (
        resolution::format_resolution(res.horizontal, 1),
        resolution::format_resolution(res.vertical, 1),
    )
}

#[test]
fn every_builtin_format_keeps_the_resolution() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("source.png");
    sample(&input);

    let registry = PluginRegistry::with_builtin_plugins();
    for name in ["out.jpg", "out.jpeg", "out.png", "out.tif", "out.tiff", "out.bmp"] {
        let output = dir.path().join(name);
        let written = change_resolution(&registry, &input, 300.0, &output, &Config::default()).unwrap();
        assert_eq!(written, 1, "{name}");
        let (h, v) = dpi_of(&registry, &output);
        assert_eq!(h, "300.0 pixels per inch", "{name}");
        assert_eq!(v, "300.0 pixels per inch", "{name}");
    }
}

#[test]
fn directory_batch_reports_each_file() {
    let dir = TempDir::new().unwrap();
    let registry = PluginRegistry::with_builtin_plugins();
    let source = dir.path().join("a.png");
    sample(&source);
    change_resolution(&registry, &source, 72.0, &dir.path().join("b.jpg"), &Config::default()).unwrap();
    fs::write(dir.path().join("c.txt"), b"not an image").unwrap();
    fs::write(dir.path().join("d.png"), b"not a png either").unwrap();

    let inputs = collect_inputs(&[dir.path().to_path_buf()]);
    let mut out = Vec::new();
    let mut failures = 0;
    for path in &inputs[0].files {
        let result = read_resolution(&registry, path);
        failures += usize::from(result.failed());
        write_resolution_report(&mut out, &result, 1).unwrap();
    }
    let text = String::from_utf8(out).unwrap();

    assert_eq!(failures, 1);
    assert!(text.contains("\nProcessing a.png:\n\n    Horizontal resolution: (none)\n"));
    assert!(text.contains("\nProcessing b.jpg:\n\n    Horizontal resolution: 72.0 pixels per inch\n"));
    assert!(text.contains("\nProcessing c.txt:\n\n    No compatible reader found\n"));
    assert!(text.contains("\nProcessing d.png:\n\n    Error: "));
}

/// A writer that only records how often it ran.
struct CountingWriter {
    descriptor: PluginDescriptor,
}

impl ImageWriterPlugin for CountingWriter {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn default_image_metadata(&self, _color: image::ColorType) -> ImageMetadata {
        ImageMetadata::new(MetadataNode::new(STANDARD_FORMAT_NAME))
    }

    fn write(&self, _image: &DynamicImage, _metadata: &ImageMetadata, sink: &mut dyn Write) -> anyhow::Result<()> {
        writeln!(sink, "{}", self.descriptor.name)?;
        Ok(())
    }
}

#[test]
fn later_writers_overwrite_the_same_destination() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.raw");
    let mut registry = PluginRegistry::new();
    for name in ["first", "second"] {
        registry.register_writer(CountingWriter {
            descriptor: PluginDescriptor::new(name)
                .with_suffixes(&["raw"])
                .with_standard_metadata(true, false),
        });
    }

    let image = DynamicImage::ImageRgb8(RgbImage::new(1, 1));
    let fragment = resolution::encode(150.0).unwrap();
    let count = merge_and_write(&registry, "raw", &image, &fragment, WriteStrategy::All, || {
        Ok(fs::File::create(&output)?)
    })
    .unwrap();

    assert_eq!(count, 2);
    assert_eq!(fs::read_to_string(&output).unwrap(), "second\n");
}

#[test]
fn standard_schema_dump_is_stable() {
    let first: Vec<String> = render(standard_schema(), 3).collect();
    let second: Vec<String> = render(standard_schema(), 3).collect();
    assert_eq!(first, second);
    assert_eq!(first[0], format!("            <{STANDARD_FORMAT_NAME}> (zero or one instance of each of its legal child elements, in order)"));
    assert_eq!(first.last().unwrap(), &format!("            </{STANDARD_FORMAT_NAME}>"));
}
