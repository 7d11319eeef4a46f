//! Text rendering of metadata schemas.
//!
//! Rendering walks the schema from a root element and yields one line per
//! tag. Schemas may be cyclic (TIFF's IFD/field grammar points back at
//! itself), so the walk tracks the element names on the current ancestor
//! chain and prints a `(see above)` marker instead of descending into an
//! element that is already open. The chain is released as elements close, so
//! an element reused in a sibling branch still renders in full.

use std::collections::HashSet;

use super::schema::{AttributeSpec, MetadataSchema, ValueConstraint};

const INDENT: &str = "    ";

/// Render `schema` from its root element, indented from `base_depth`.
pub fn render(schema: &dyn MetadataSchema, base_depth: usize) -> SchemaLines<'_> {
    render_element(schema, schema.root_name(), base_depth)
}

/// Render the subtree of `schema` rooted at `element`, indented from `base_depth`.
pub fn render_element<'a>(
    schema: &'a dyn MetadataSchema,
    element: &'a str,
    base_depth: usize,
) -> SchemaLines<'a> {
    SchemaLines {
        schema,
        stack: vec![Step::Open {
            name: element,
            depth: base_depth,
        }],
        on_path: HashSet::new(),
    }
}

enum Step<'a> {
    Open { name: &'a str, depth: usize },
    Close { name: &'a str, depth: usize },
}

/// Lazy line iterator returned by [`render`].
pub struct SchemaLines<'a> {
    schema: &'a dyn MetadataSchema,
    stack: Vec<Step<'a>>,
    on_path: HashSet<&'a str>,
}

impl<'a> Iterator for SchemaLines<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let schema: &'a dyn MetadataSchema = self.schema;

        match self.stack.pop()? {
            Step::Close { name, depth } => {
                self.on_path.remove(name);
                Some(format!("{}</{name}>", INDENT.repeat(depth)))
            }
            Step::Open { name, depth } => {
                let pad = INDENT.repeat(depth);
                if self.on_path.contains(name) {
                    return Some(format!("{pad}<{name}/> (see above)"));
                }

                let Some(spec) = schema.element(name) else {
                    return Some(format!("{pad}<{name}/>"));
                };

                let attributes: String = spec.attributes().iter().map(render_attribute).collect();
                if spec.children().is_empty() {
                    return Some(format!("{pad}<{name}{attributes}/>"));
                }

                self.on_path.insert(name);
                self.stack.push(Step::Close { name, depth });
                for child in spec.children().iter().rev() {
                    self.stack.push(Step::Open {
                        name: child.as_str(),
                        depth: depth + 1,
                    });
                }

                Some(match spec.child_policy().description() {
                    "" => format!("{pad}<{name}{attributes}>"),
                    phrase => format!("{pad}<{name}{attributes}> {phrase}"),
                })
            }
        }
    }
}

/// ` name='(TYPE)constraint=default'*`
fn render_attribute(attribute: &AttributeSpec) -> String {
    let mut token = format!(" {}='({})", attribute.name, attribute.data_type);
    token.push_str(&render_constraint(&attribute.constraint));
    if let Some(ref default) = attribute.default {
        token.push('=');
        token.push_str(default);
    }
    token.push('\'');
    if attribute.required {
        token.push('*');
    }
    token
}

fn render_constraint(constraint: &ValueConstraint) -> String {
    match constraint {
        ValueConstraint::Arbitrary | ValueConstraint::None => String::new(),
        ValueConstraint::Enumeration(values) => format!(":{}", values.join("|")),
        ValueConstraint::List {
            min_length,
            max_length,
        } => format!("[{min_length},{max_length}]"),
        ValueConstraint::Range {
            min,
            max,
            min_inclusive,
            max_inclusive,
        } => {
            let lower = if *min_inclusive { "<=" } else { "<" };
            let upper = if *max_inclusive { "<=" } else { "<" };
            format!(":{min}{lower}x{upper}{max}")
        }
    }
}
