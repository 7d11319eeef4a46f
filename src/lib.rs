//! # metaprobe
//!
//! Inspect image metadata schemas and read or embed physical print resolution
//! through a registry of codec plugins (PNG, JPEG, TIFF, BMP).
//!
//! ## Quick Start
//!
//! Reading the resolution of a file goes through the pipeline module, which
//! picks a reader by the file's extension and decodes the standard tree:
//!
//! ```rust,no_run
//! use metaprobe::pipeline::{collect_inputs, read_resolution};
//! use metaprobe::plugin::PluginRegistry;
//! use std::path::PathBuf;
//!
//! let registry = PluginRegistry::with_builtin_plugins();
//! for set in collect_inputs(&[PathBuf::from("./scans")]) {
//!     for path in &set.files {
//!         let result = read_resolution(&registry, path);
//!         println!("{}: {:?}", result.display_name(), result.resolution);
//!     }
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The negotiator and the resolution codec can be driven directly:
//!
//! ```rust,no_run
//! use metaprobe::plugin::{PluginRegistry, merge_and_write_all, select_reader_and_extract};
//! use metaprobe::resolution;
//! use std::fs::File;
//! use std::io::BufReader;
//!
//! fn main() -> anyhow::Result<()> {
//!     let registry = PluginRegistry::with_builtin_plugins();
//!
//!     // 1. Read the standard metadata tree
//!     let mut source = BufReader::new(File::open("photo.jpg")?);
//!     if let Some(extracted) = select_reader_and_extract(&registry, "jpg", &mut source)? {
//!         println!("{} says {:?}", extracted.reader, resolution::decode(&extracted.tree)?);
//!     }
//!
//!     // 2. Write the same pixels at 300 dpi
//!     let image = image::open("photo.jpg")?;
//!     let fragment = resolution::encode(300.0)?;
//!     let count = merge_and_write_all(&registry, "png", &image, &fragment, || {
//!         Ok(File::create("photo.png")?)
//!     })?;
//!     println!("{count} writer(s) invoked");
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`metadata`] — metadata trees, schema model, the standard schema and the schema renderer
//! - [`resolution`] — dpi to and from the standard `Dimension` fragment
//! - [`plugin`] — plugin descriptors, built-in codecs, registry and negotiation
//! - [`report`] — text reports for schemas, plugins and resolutions
//! - [`pipeline`] — batch operations behind the command-line tool
//! - [`config`] — configuration types and loading/saving
//! - [`error`] — typed metadata errors

pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod plugin;
pub mod report;
pub mod resolution;
