use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::MetadataError;

/// One element of a metadata instance tree.
///
/// Attribute order carries no meaning, so attributes live in a sorted map.
/// Child order is document order and is preserved as given.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct MetadataNode {
    name: String,
    attributes: BTreeMap<String, String>,
    children: Vec<MetadataNode>,
}

impl MetadataNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder form of [`set_attribute`](Self::set_attribute).
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder form of [`push_child`](Self::push_child).
    pub fn with_child(mut self, child: MetadataNode) -> Self {
        self.push_child(child);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn children(&self) -> &[MetadataNode] {
        &self.children
    }

    pub fn push_child(&mut self, child: MetadataNode) {
        self.children.push(child);
    }

    /// First direct child with exactly this name. Grandchildren are never searched.
    pub fn child(&self, name: &str) -> Option<&MetadataNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut MetadataNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Merge `fragment` into this tree.
    ///
    /// The roots must share a name. Each child of the fragment is matched to
    /// the first direct child of the same name; matched elements take the
    /// fragment's attribute values and are merged recursively, unmatched ones
    /// are appended. Everything the fragment does not mention is untouched.
    pub fn merge(&mut self, fragment: &MetadataNode) -> Result<(), MetadataError> {
        if self.name != fragment.name {
            return Err(MetadataError::RootMismatch {
                expected: self.name.clone(),
                found: fragment.name.clone(),
            });
        }
        self.merge_unchecked(fragment);
        Ok(())
    }

    fn merge_unchecked(&mut self, fragment: &MetadataNode) {
        for (key, value) in &fragment.attributes {
            self.attributes.insert(key.clone(), value.clone());
        }
        for incoming in &fragment.children {
            match self.child_mut(&incoming.name) {
                Some(existing) => existing.merge_unchecked(incoming),
                None => self.children.push(incoming.clone()),
            }
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        write!(f, "{pad}<{}", self.name)?;
        for (key, value) in &self.attributes {
            write!(f, " {key}=\"{value}\"")?;
        }
        if self.children.is_empty() {
            return writeln!(f, "/>");
        }
        writeln!(f, ">")?;
        for child in &self.children {
            child.write_indented(f, depth + 1)?;
        }
        writeln!(f, "{pad}</{}>", self.name)
    }
}

impl fmt::Display for MetadataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}
