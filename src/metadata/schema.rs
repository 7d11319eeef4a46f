use std::collections::HashMap;
use std::fmt;

/// How the children of a schema element may combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildPolicy {
    /// Exactly one of every child, all required.
    All,
    /// Zero or one of the listed children.
    Choice,
    /// No children.
    Empty,
    /// Zero or more repeats of the single child type.
    Repeat,
    /// Any legal children, any number, in sequence.
    Sequence,
    /// Zero or one of each child, in declared order.
    Some,
}

impl ChildPolicy {
    /// Fixed phrase shown after an element's opening tag in schema dumps.
    pub fn description(self) -> &'static str {
        match self {
            Self::All => "(single instance of all children required)",
            Self::Choice => "(0 or 1 instance of legal child elements)",
            Self::Empty => "",
            Self::Repeat => "(zero or more instances of child element)",
            Self::Sequence => "(sequence of instances of any of its legal child elements)",
            Self::Some => "(zero or one instance of each of its legal child elements, in order)",
        }
    }
}

/// Value type of a schema attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Boolean,
    Double,
    Float,
    Integer,
    String,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Boolean => "BOOLEAN",
            Self::Double => "DOUBLE",
            Self::Float => "FLOAT",
            Self::Integer => "INTEGER",
            Self::String => "STRING",
        })
    }
}

/// Legal values of a schema attribute.
///
/// Range bounds are kept as the schema's own strings; how they compare is up
/// to the format, and the schema dump only displays them.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueConstraint {
    Arbitrary,
    None,
    Enumeration(Vec<String>),
    List {
        min_length: u32,
        max_length: u32,
    },
    Range {
        min: String,
        max: String,
        min_inclusive: bool,
        max_inclusive: bool,
    },
}

/// Declaration of one attribute of a schema element.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub name: String,
    pub data_type: DataType,
    pub constraint: ValueConstraint,
    pub default: Option<String>,
    pub required: bool,
}

impl AttributeSpec {
    /// An optional attribute with no constraint and no default.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            constraint: ValueConstraint::Arbitrary,
            default: None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn enumeration(mut self, values: &[&str]) -> Self {
        self.constraint = ValueConstraint::Enumeration(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn list(mut self, min_length: u32, max_length: u32) -> Self {
        self.constraint = ValueConstraint::List {
            min_length,
            max_length,
        };
        self
    }

    pub fn range(mut self, min: &str, max: &str, min_inclusive: bool, max_inclusive: bool) -> Self {
        self.constraint = ValueConstraint::Range {
            min: min.to_string(),
            max: max.to_string(),
            min_inclusive,
            max_inclusive,
        };
        self
    }
}

/// Declaration of one schema element: its child grammar and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSpec {
    name: String,
    child_policy: ChildPolicy,
    children: Vec<String>,
    attributes: Vec<AttributeSpec>,
}

impl ElementSpec {
    pub fn new(name: impl Into<String>, child_policy: ChildPolicy) -> Self {
        Self {
            name: name.into(),
            child_policy,
            children: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// An element with no children and a single `value` attribute.
    pub fn value(name: impl Into<String>, attribute: AttributeSpec) -> Self {
        Self::new(name, ChildPolicy::Empty).with_attribute(attribute)
    }

    pub fn with_children(mut self, children: &[&str]) -> Self {
        self.children.extend(children.iter().map(|c| c.to_string()));
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeSpec) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn child_policy(&self) -> ChildPolicy {
        self.child_policy
    }

    /// Child element names in schema order.
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// Attribute declarations in schema order.
    pub fn attributes(&self) -> &[AttributeSpec] {
        &self.attributes
    }
}

/// A self-describing metadata grammar.
///
/// Element names are the only links between elements, so a schema may refer
/// back to an ancestor and describe an unbounded tree.
pub trait MetadataSchema {
    /// Name of the metadata format this schema describes.
    fn format_name(&self) -> &str;
    fn root_name(&self) -> &str;
    /// Declaration of `name`, or `None` for an element the schema only
    /// mentions, which behaves as childless and attribute-less.
    fn element(&self, name: &str) -> Option<&ElementSpec>;
}

/// Table-backed [`MetadataSchema`].
#[derive(Debug, Clone)]
pub struct DeclaredSchema {
    format_name: String,
    root_name: String,
    elements: HashMap<String, ElementSpec>,
}

impl DeclaredSchema {
    pub fn new(format_name: impl Into<String>, root_name: impl Into<String>) -> Self {
        Self {
            format_name: format_name.into(),
            root_name: root_name.into(),
            elements: HashMap::new(),
        }
    }

    pub fn with_element(mut self, element: ElementSpec) -> Self {
        self.add_element(element);
        self
    }

    /// Declare an element, replacing any earlier declaration of the same name.
    pub fn add_element(&mut self, element: ElementSpec) {
        self.elements.insert(element.name.clone(), element);
    }
}

impl MetadataSchema for DeclaredSchema {
    fn format_name(&self) -> &str {
        &self.format_name
    }

    fn root_name(&self) -> &str {
        &self.root_name
    }

    fn element(&self, name: &str) -> Option<&ElementSpec> {
        self.elements.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_builder_defaults() {
        let attr = AttributeSpec::new("value", DataType::Float);
        assert_eq!(attr.constraint, ValueConstraint::Arbitrary);
        assert!(attr.default.is_none());
        assert!(!attr.required);
    }

    #[test]
    fn attribute_builder_range() {
        let attr = AttributeSpec::new("q", DataType::Integer)
            .range("0", "100", true, false)
            .required();
        assert!(attr.required);
        assert_eq!(
            attr.constraint,
            ValueConstraint::Range {
                min: "0".into(),
                max: "100".into(),
                min_inclusive: true,
                max_inclusive: false,
            }
        );
    }

    #[test]
    fn declared_schema_lookup() {
        let schema = DeclaredSchema::new("test_1.0", "root")
            .with_element(ElementSpec::new("root", ChildPolicy::Sequence).with_children(&["a", "b"]));
        assert_eq!(schema.root_name(), "root");
        assert_eq!(schema.element("root").unwrap().children(), ["a", "b"]);
        assert!(schema.element("a").is_none());
    }

    #[test]
    fn later_declaration_wins() {
        let mut schema = DeclaredSchema::new("test_1.0", "root");
        schema.add_element(ElementSpec::new("root", ChildPolicy::Empty));
        schema.add_element(ElementSpec::new("root", ChildPolicy::All).with_children(&["x"]));
        assert_eq!(schema.element("root").unwrap().child_policy(), ChildPolicy::All);
    }

    #[test]
    fn data_type_display_is_upper_case() {
        assert_eq!(DataType::Integer.to_string(), "INTEGER");
        assert_eq!(DataType::Boolean.to_string(), "BOOLEAN");
    }
}
