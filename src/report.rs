//! Line-oriented text reports written to any `io::Write` sink.

use std::io::{self, Write};
use std::path::Path;

use crate::metadata::{STANDARD_FORMAT_NAME, render};
use crate::pipeline::FileResolution;
use crate::plugin::{ImageReaderPlugin, MetadataScope, PluginDescriptor, PluginRegistry};
use crate::resolution::format_resolution;

const INDENT: &str = "    ";

fn indent(out: &mut dyn Write, level: usize) -> io::Result<()> {
    write!(out, "{}", INDENT.repeat(level))
}

// ── schema dump ─────────────────────────────────────────────────────

/// Dump the metadata schemas of every reader declaring each format name.
///
/// Format names are matched ignoring case. Each reader is listed under the
/// format with its image and stream schemas rendered from `base_depth`.
pub fn write_schema_report(
    out: &mut dyn Write,
    registry: &PluginRegistry,
    formats: &[String],
    base_depth: usize,
) -> io::Result<()> {
    for format in formats {
        writeln!(out, "Format: {format}")?;
        for reader in registry.readers_supporting_format(format) {
            write_reader_schemas(out, reader, base_depth)?;
        }
    }
    writeln!(out, "Done")
}

fn write_reader_schemas(out: &mut dyn Write, reader: &dyn ImageReaderPlugin, base_depth: usize) -> io::Result<()> {
    let descriptor = reader.descriptor();
    indent(out, 1)?;
    writeln!(out, "{}", descriptor.name)?;

    let sections = [
        (
            MetadataScope::Image,
            descriptor.standard_image_metadata.then_some(STANDARD_FORMAT_NAME),
        ),
        (MetadataScope::Image, descriptor.native_image_metadata_format.as_deref()),
        (
            MetadataScope::Stream,
            descriptor.standard_stream_metadata.then_some(STANDARD_FORMAT_NAME),
        ),
        (MetadataScope::Stream, descriptor.native_stream_metadata_format.as_deref()),
    ];

    for (scope, name) in sections {
        let Some(name) = name else { continue };
        let label = match scope {
            MetadataScope::Image => "Image format",
            MetadataScope::Stream => "Stream format",
        };
        indent(out, 2)?;
        writeln!(out, "{label}: {name}")?;

        match reader.metadata_schema(scope, name) {
            Some(schema) => {
                for line in render(schema, base_depth) {
                    writeln!(out, "{line}")?;
                }
            }
            None => log::warn!("{} declares '{name}' but provides no schema for it", descriptor.name),
        }
    }
    Ok(())
}

// ── plugin dump ─────────────────────────────────────────────────────

/// Dump the registry: aggregate reader capabilities, then every reader and
/// writer descriptor.
pub fn write_plugin_report(out: &mut dyn Write, registry: &PluginRegistry) -> io::Result<()> {
    write_strings(out, "File Suffixes:", &registry.reader_file_suffixes(), 0)?;
    writeln!(out)?;
    write_strings(out, "Format Names:", &registry.reader_format_names(), 0)?;
    writeln!(out)?;
    write_strings(out, "MIME Types:", &registry.reader_mime_types(), 0)?;

    writeln!(out, "\nReaders:")?;
    for reader in registry.readers() {
        write_descriptor(out, reader.descriptor())?;
    }

    writeln!(out, "\nWriters:")?;
    for writer in registry.writers() {
        write_descriptor(out, writer.descriptor())?;
    }
    Ok(())
}

fn write_descriptor(out: &mut dyn Write, descriptor: &PluginDescriptor) -> io::Result<()> {
    indent(out, 1)?;
    writeln!(out, "{}", descriptor.name)?;
    write_name(out, "Vendor:", Some(descriptor.vendor.as_str()).filter(|v| !v.is_empty()))?;
    write_name(out, "Version:", Some(descriptor.version.as_str()).filter(|v| !v.is_empty()))?;
    write_strings(out, "File Suffixes:", &descriptor.file_suffixes, 2)?;
    write_strings(out, "Format Names:", &descriptor.format_names, 2)?;
    write_strings(out, "MIME Types:", &descriptor.mime_types, 2)?;
    write_flag(
        out,
        "Standard Image Metadata Format Supported:",
        descriptor.standard_image_metadata,
    )?;
    write_flag(
        out,
        "Standard Stream Metadata Format Supported:",
        descriptor.standard_stream_metadata,
    )?;
    write_name(
        out,
        "Native Image Metadata Format Name:",
        descriptor.native_image_metadata_format.as_deref(),
    )?;
    write_name(
        out,
        "Native Stream Metadata Format Name:",
        descriptor.native_stream_metadata_format.as_deref(),
    )?;
    write_strings(
        out,
        "Extra Image Metadata Format Names:",
        &descriptor.extra_image_metadata_formats,
        2,
    )?;
    write_strings(
        out,
        "Extra Stream Metadata Format Names:",
        &descriptor.extra_stream_metadata_formats,
        2,
    )?;
    writeln!(out)
}

fn write_strings(out: &mut dyn Write, title: &str, values: &[String], level: usize) -> io::Result<()> {
    indent(out, level)?;
    writeln!(out, "{title}")?;
    if values.is_empty() {
        indent(out, level + 1)?;
        return writeln!(out, "(none)");
    }
    for value in values {
        indent(out, level + 1)?;
        writeln!(out, "{value}")?;
    }
    Ok(())
}

fn write_flag(out: &mut dyn Write, title: &str, value: bool) -> io::Result<()> {
    indent(out, 2)?;
    writeln!(out, "{title} {}", if value { "YES" } else { "NO" })
}

fn write_name(out: &mut dyn Write, title: &str, value: Option<&str>) -> io::Result<()> {
    indent(out, 2)?;
    writeln!(out, "{title} {}", value.unwrap_or("(null)"))
}

// ── resolution report ───────────────────────────────────────────────

pub fn write_directory_header(out: &mut dyn Write, directory: &Path) -> io::Result<()> {
    let shown = std::fs::canonicalize(directory).unwrap_or_else(|_| directory.to_path_buf());
    writeln!(out, "Processing all files in {}", shown.display())
}

/// Per-file block of the resolution reader.
pub fn write_resolution_report(out: &mut dyn Write, result: &FileResolution, precision: usize) -> io::Result<()> {
    writeln!(out, "\nProcessing {}:\n", result.display_name())?;

    if let Some(ref error) = result.error {
        return writeln!(out, "    Error: {error}");
    }
    let Some(resolution) = result.resolution else {
        return writeln!(out, "    No compatible reader found");
    };

    writeln!(
        out,
        "    Horizontal resolution: {}",
        format_resolution(resolution.horizontal, precision)
    )?;
    writeln!(
        out,
        "    Vertical resolution: {}",
        format_resolution(resolution.vertical, precision)
    )
}
