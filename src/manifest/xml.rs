//! Generic XML element tree used for canonical manifest comparison

use crate::{RepoResourceError, Result};
use quick_xml::escape::{escape, partial_escape, resolve_predefined_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One XML element with its attributes, text and child elements
///
/// Attributes are kept sorted by name so two documents that only differ in
/// attribute order or whitespace produce the same tree. Text follows the
/// ElementTree model: `text` comes before the first child, and a child's
/// `tail` comes right after its end tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name (e.g. "project")
    pub name: String,

    /// Attributes, keyed by name
    pub attributes: BTreeMap<String, String>,

    /// Child elements in document order
    pub children: Vec<Element>,

    /// Unescaped text before the first child, outer whitespace trimmed
    pub text: String,

    /// Unescaped text between this element's end tag and the next sibling
    pub tail: String,
}

impl Element {
    /// Create an element with no attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: String::new(),
            tail: String::new(),
        }
    }

    /// Parse a complete XML document into its root element
    ///
    /// Comments, processing instructions, the XML declaration and
    /// whitespace-only text are dropped.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;
        // Text, CDATA and entity pieces since the last tag
        let mut pending = String::new();

        loop {
            let event = reader.read_event().map_err(|e| {
                RepoResourceError::Parse(format!(
                    "Error parsing XML at position {}: {}",
                    reader.error_position(),
                    e
                ))
            })?;

            match event {
                Event::Start(ref e) => {
                    flush_text(&mut pending, &mut stack)?;
                    let element = start_element(e)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(multiple_roots(&element.name));
                    }
                    stack.push(element);
                }
                Event::Empty(ref e) => {
                    flush_text(&mut pending, &mut stack)?;
                    let element = start_element(e)?;
                    close_element(element, &mut stack, &mut root)?;
                }
                Event::End(_) => {
                    flush_text(&mut pending, &mut stack)?;
                    // quick-xml already rejects mismatched end tags
                    let element = stack.pop().ok_or_else(|| {
                        RepoResourceError::Parse("Unexpected closing tag".to_string())
                    })?;
                    close_element(element, &mut stack, &mut root)?;
                }
                Event::Text(ref e) => pending.push_str(&String::from_utf8_lossy(e)),
                Event::CData(ref e) => pending.push_str(&String::from_utf8_lossy(e)),
                Event::GeneralRef(ref e) => {
                    pending.push_str(&resolve_reference(&String::from_utf8_lossy(e))?)
                }
                Event::Eof => {
                    flush_text(&mut pending, &mut stack)?;
                    break;
                }
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(RepoResourceError::Parse(format!(
                "Unclosed element <{}>",
                open.name
            )));
        }

        root.ok_or_else(|| RepoResourceError::Parse("Document has no root element".to_string()))
    }

    /// Get an attribute value by name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Iterate over direct children with the given tag name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Serialize to the canonical single-line form
    ///
    /// `<name a="1" b="2">text<child></child>tail</name>`: sorted attributes,
    /// explicit end tags, no declaration and no inter-element whitespace.
    pub fn to_canonical_string(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            // Writing to a String cannot fail
            let _ = write!(out, " {}=\"{}\"", key, escape(value.as_str()));
        }
        out.push('>');
        out.push_str(&partial_escape(self.text.as_str()));
        for child in &self.children {
            child.write_canonical(out);
            out.push_str(&partial_escape(child.tail.as_str()));
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn start_element(e: &BytesStart) -> Result<Element> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut element = Element::new(name);

    for attr in e.attributes() {
        let attr =
            attr.map_err(|e| RepoResourceError::Parse(format!("Invalid attribute: {}", e)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| RepoResourceError::Parse(format!("Invalid attribute value: {}", e)))?;
        element.attributes.insert(key, value.to_string());
    }

    Ok(element)
}

/// Expand `&name;` or `&#NN;` given the name between `&` and `;`
///
/// Manifests carry no DTD, so only the predefined entities exist.
fn resolve_reference(name: &str) -> Result<String> {
    let resolved = match name.strip_prefix('#') {
        Some(number) => {
            let code = match number.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => number.parse().ok(),
            };
            code.and_then(char::from_u32).map(String::from)
        }
        None => resolve_predefined_entity(name).map(str::to_string),
    };

    resolved.ok_or_else(|| RepoResourceError::Parse(format!("Unknown entity: &{};", name)))
}

/// Attach the collected text to the open element, or to its last child as tail
fn flush_text(pending: &mut String, stack: &mut [Element]) -> Result<()> {
    let text = std::mem::take(pending);
    let text = text.trim();
    if text.is_empty() {
        return Ok(());
    }

    let current = stack.last_mut().ok_or_else(|| {
        RepoResourceError::Parse(format!("Text outside of root element: {:?}", text))
    })?;
    match current.children.last_mut() {
        Some(previous) => previous.tail.push_str(text),
        None => current.text.push_str(text),
    }
    Ok(())
}

fn close_element(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(multiple_roots(&element.name)),
        None => *root = Some(element),
    }
    Ok(())
}

fn multiple_roots(name: &str) -> RepoResourceError {
    RepoResourceError::Parse(format!(
        "Document has more than one root element (found <{}>)",
        name
    ))
}
