use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::plugin::{PluginRegistry, merge_and_write, select_reader_and_extract};
use crate::resolution::{self, Resolution};

/// A group of files to read, as named on the command line.
///
/// A file argument becomes a group of one with no `directory`; a directory
/// argument becomes a group of its direct file entries.
#[derive(Debug, Clone, PartialEq)]
pub struct InputSet {
    pub directory: Option<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Outcome of reading the resolution of one file.
///
/// `reader` is `None` when no registered reader accepts the file's extension;
/// `error` holds the per-file failure, if any.
///
/// # Example
///
/// ```rust,no_run
/// use metaprobe::pipeline::read_resolution;
/// use metaprobe::plugin::PluginRegistry;
///
/// let registry = PluginRegistry::with_builtin_plugins();
/// let result = read_resolution(&registry, "scan.png".as_ref());
/// if let Some(ref res) = result.resolution {
///     println!("{:?} x {:?} dpi", res.horizontal, res.vertical);
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResolution {
    pub path: PathBuf,
    pub reader: Option<String>,
    pub resolution: Option<Resolution>,
    pub error: Option<String>,
}

impl FileResolution {
    /// File name shown in reports.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Collect the files to read from the given paths.
///
/// Directories contribute their direct file entries only, in name order;
/// subdirectories are not entered. Paths that do not exist are skipped with
/// a warning.
///
/// # Example
///
/// ```rust,no_run
/// use metaprobe::pipeline::collect_inputs;
/// use std::path::PathBuf;
///
/// let inputs = collect_inputs(&[
///     PathBuf::from("photo.jpg"),       // single file
///     PathBuf::from("./scans/"),        // direct entries of a directory
/// ]);
/// let total: usize = inputs.iter().map(|set| set.files.len()).sum();
/// println!("Found {total} files");
/// ```
pub fn collect_inputs(paths: &[PathBuf]) -> Vec<InputSet> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_file() {
            inputs.push(InputSet {
                directory: None,
                files: vec![path.clone()],
            });
        } else if path.is_dir() {
            let files = WalkDir::new(path)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect();
            inputs.push(InputSet {
                directory: Some(path.clone()),
                files,
            });
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    inputs
}

/// The extension used as format name or suffix, empty when there is none.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read the resolution of one file, capturing any failure in the result.
pub fn read_resolution(registry: &PluginRegistry, path: &Path) -> FileResolution {
    let mut result = FileResolution {
        path: path.to_path_buf(),
        reader: None,
        resolution: None,
        error: None,
    };

    match try_read_resolution(registry, path) {
        Ok(Some((reader, resolution))) => {
            result.reader = Some(reader);
            result.resolution = Some(resolution);
        }
        Ok(None) => {}
        Err(e) => {
            log::warn!("Failed to read {}: {e:#}", path.display());
            result.error = Some(format!("{e:#}"));
        }
    }

    result
}

fn try_read_resolution(registry: &PluginRegistry, path: &Path) -> Result<Option<(String, Resolution)>> {
    let extension = file_extension(path);
    // No file is opened unless some reader qualifies.
    if !registry
        .readers_by_format_name(&extension)
        .any(|r| r.descriptor().standard_image_metadata)
    {
        log::debug!("No compatible reader for {}", path.display());
        return Ok(None);
    }

    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut source = BufReader::new(file);

    let Some(extracted) = select_reader_and_extract(registry, &extension, &mut source)? else {
        return Ok(None);
    };
    let resolution = resolution::decode(&extracted.tree)?;
    Ok(Some((extracted.reader, resolution)))
}

/// Re-encode `input` into `output` with the given resolution.
///
/// The image is decoded fully, then written through the writers registered
/// for the output file's suffix according to `config.output.write_strategy`.
/// Returns the number of writers invoked; zero means no compatible writer.
pub fn change_resolution(
    registry: &PluginRegistry,
    input: &Path,
    dpi: f64,
    output: &Path,
    config: &Config,
) -> Result<usize> {
    let fragment = resolution::encode(dpi)?;

    let image = image::ImageReader::open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?
        .with_guessed_format()
        .with_context(|| format!("Failed to detect format of {}", input.display()))?
        .decode()
        .with_context(|| format!("Failed to decode {}", input.display()))?;
    log::debug!(
        "Decoded {} ({}x{}, {:?})",
        input.display(),
        image.width(),
        image.height(),
        image.color()
    );

    if config.output.backup_originals && output.exists() {
        backup_file(output)?;
    }

    let suffix = file_extension(output);
    let written = merge_and_write(
        registry,
        &suffix,
        &image,
        &fragment,
        config.output.write_strategy,
        || {
            let file = File::create(output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            Ok(BufWriter::new(file))
        },
    )?;

    if written == 0 {
        log::warn!("No compatible writer found for '{suffix}'");
    } else {
        log::info!("Wrote {} with {written} writer(s)", output.display());
    }
    Ok(written)
}

/// Create a backup of an existing file next to it.
fn backup_file(path: &Path) -> Result<PathBuf> {
    let backup_path = path.with_extension(format!(
        "{}.bak",
        path.extension().unwrap_or_default().to_string_lossy()
    ));

    if !backup_path.exists() {
        std::fs::copy(path, &backup_path).context("Failed to create backup")?;
        log::debug!("Backup created: {}", backup_path.display());
    }

    Ok(backup_path)
}
