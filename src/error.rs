//! Domain errors for metadata trees, the resolution codec, and plugins.
//!
//! Library functions return `anyhow::Result` at I/O boundaries; these typed
//! errors are what they wrap when the failure is about the metadata itself.

use thiserror::Error;

/// Errors raised while building, merging, or interpreting metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A resolution that cannot be turned into a physical pixel size.
    #[error("invalid resolution {0}: must be a finite number greater than zero")]
    InvalidResolution(f64),

    /// A stored pixel size attribute that is not a decimal number.
    #[error("invalid {element} value '{value}': expected a decimal number of millimeters")]
    InvalidPixelSize { element: String, value: String },

    /// Merging trees whose roots disagree.
    #[error("cannot merge '{found}' into a '{expected}' tree")]
    RootMismatch { expected: String, found: String },

    /// The metadata instance does not accept modification.
    #[error("metadata is read-only")]
    ReadOnly,

    /// The metadata instance has no representation in the requested format.
    #[error("unsupported metadata format '{0}'")]
    UnsupportedFormat(String),

    /// Only the first image of a container is addressable.
    #[error("image index {0} out of range")]
    ImageIndexOutOfRange(usize),

    /// A container that could not be parsed far enough to reach its metadata.
    #[error("malformed {format} data: {reason}")]
    Malformed { format: &'static str, reason: String },
}

impl MetadataError {
    pub(crate) fn malformed(format: &'static str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }
}
