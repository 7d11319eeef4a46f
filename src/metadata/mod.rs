//! Metadata trees, schemas, and schema rendering.
//!
//! - [`MetadataNode`] — an instance tree attached to one image
//! - [`MetadataSchema`] — a grammar describing what a metadata format may contain
//! - [`render`] — lazy text rendering of a schema, safe on cyclic grammars
//! - [`standard_schema`] — the format-neutral vocabulary every compliant plugin shares

pub mod introspect;
pub mod schema;
mod standard;
mod tree;

pub use introspect::{SchemaLines, render, render_element};
pub use schema::{
    AttributeSpec, ChildPolicy, DataType, DeclaredSchema, ElementSpec, MetadataSchema,
    ValueConstraint,
};
pub use standard::{STANDARD_FORMAT_NAME, standard_schema};
pub use tree::MetadataNode;
