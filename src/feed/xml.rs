//! Owned, namespace-aware XML element tree.
//!
//! Feed documents are small enough to materialize in full, and every
//! extraction rule in the parsers is phrased in terms of "direct children of
//! this element". This module gives those rules one vocabulary: element
//! name, resolved namespace URI, attributes, direct children, and the text of
//! an element with or without its descendants.
//!
//! The tree is built from `quick-xml`'s [`NsReader`] so prefixes are resolved
//! against the declarations in scope (`<dc:creator>` and
//! `<creator xmlns="http://purl.org/dc/elements/1.1/">` are the same element).

use std::str::FromStr;

use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted from a remote document.
const MAX_DEPTH: usize = 512;

/// Errors raised while building a tree from XML text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XmlError {
    /// The underlying reader rejected the input.
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    /// SEC-003: Nesting exceeds [`MAX_DEPTH`].
    #[error("nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

/// A node inside an element: either a child element or a run of text.
///
/// CDATA sections are folded into `Text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its resolved namespace, attributes and child nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    nodes: Vec<XmlNode>,
}

impl XmlElement {
    /// Local name, without any prefix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace URI the element's prefix (or the default namespace) resolves to.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// True when both local name and namespace URI match.
    pub fn is(&self, name: &str, namespace: &str) -> bool {
        self.name == name && self.namespace() == Some(namespace)
    }

    /// Looks up an attribute by its qualified name as written in the source.
    ///
    /// Namespace declarations are ordinary attributes here, so
    /// `attr("xmlns")` returns the declared default namespace.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// All child nodes, text included, in document order.
    pub fn nodes(&self) -> &[XmlNode] {
        &self.nodes
    }

    /// Direct child elements in document order.
    pub fn children(&self) -> impl Iterator<Item = &XmlElement> {
        self.nodes.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Direct child elements with the given local name, in any namespace.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children().filter(move |child| child.name == name)
    }

    /// First direct child element with the given local name, in any namespace.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children().find(|child| child.name == name)
    }

    /// First direct child element with the given local name in `namespace`.
    pub fn child_ns(&self, name: &str, namespace: &str) -> Option<&XmlElement> {
        self.children().find(|child| child.is(name, namespace))
    }

    /// Whether any element below this one (at any depth) has the local name.
    pub fn has_descendant(&self, name: &str) -> bool {
        self.children()
            .any(|child| child.name == name || child.has_descendant(name))
    }

    /// Concatenated text of this element and all of its descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.nodes {
            match node {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Text held directly by this element, ignoring text inside child elements.
    ///
    /// Returns `None` when the trimmed result is empty.
    pub fn direct_text(&self) -> Option<String> {
        let joined: String = self
            .nodes
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect();
        non_empty(&joined)
    }

    /// Trimmed full text of the element, `None` when empty.
    pub fn trimmed_text(&self) -> Option<String> {
        non_empty(&self.text())
    }

    /// Trimmed full text of the first direct child named `name`.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name).and_then(XmlElement::trimmed_text)
    }
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// A parsed document: its root element plus the source it was built from.
///
/// The source is retained so a fetched document can be persisted verbatim
/// and re-parsed later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlElement,
    source: String,
}

impl XmlDocument {
    /// Parses `source` into an element tree.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError`] if the text is not well-formed, has zero or
    /// several root elements, leaves an element open, or nests deeper than
    /// the safety limit.
    ///
    /// # Security
    ///
    /// SEC-002: `quick-xml` never expands `<!ENTITY>` declarations. The XML
    /// and HTML5 named entities are resolved, as are character references.
    /// Any other reference is kept literally, without failing the document.
    pub fn parse(source: &str) -> Result<Self, XmlError> {
        let mut reader = NsReader::from_str(source);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader.read_event().map_err(|e| XmlError::Syntax {
                position: reader.error_position() as u64,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => {
                    if stack.len() >= MAX_DEPTH {
                        return Err(XmlError::MaxDepthExceeded(MAX_DEPTH));
                    }
                    let element = build_element(&reader, &e);
                    stack.push(element);
                }
                Event::Empty(e) => {
                    let element = build_element(&reader, &e);
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    // quick-xml checks end names, so the stack cannot be empty here
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element)?;
                    }
                }
                Event::Text(e) => {
                    if let Some(parent) = stack.last_mut() {
                        push_text(parent, unescape_lenient(&String::from_utf8_lossy(&e)));
                    }
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        push_text(parent, String::from_utf8_lossy(&e).into_owned());
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and doctypes carry no content
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }

        let root = root.ok_or(XmlError::NoRoot)?;
        Ok(Self {
            root,
            source: source.to_owned(),
        })
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    /// The text this document was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FromStr for XmlDocument {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn build_element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> XmlElement {
    let (resolved, local) = reader.resolve_element(start.name());
    let namespace = match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound | ResolveResult::Unknown(_) => None,
    };
    let name = String::from_utf8_lossy(local.as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr_result in start.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(element = %name, error = %e, "Skipping malformed XML attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = unescape_lenient(&String::from_utf8_lossy(&attr.value));
        attributes.push((key, value));
    }

    XmlElement {
        name,
        namespace,
        attributes,
        nodes: Vec::new(),
    }
}

fn resolve_entity(name: &str) -> Option<&'static str> {
    resolve_predefined_entity(name).or_else(|| resolve_html5_entity(name))
}

/// Unescapes `raw` one reference at a time.
///
/// A reference that cannot be resolved stays in the output as written, so
/// `Tom &amp; Jerry&bogus;` becomes `Tom & Jerry&bogus;`.
fn unescape_lenient(raw: &str) -> String {
    if let Ok(text) = unescape_with(raw, resolve_entity) {
        return text.into_owned();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        // A reference runs to the next ';' and holds no '&' or whitespace
        let end = tail[1..]
            .find(|c: char| c == ';' || c == '&' || c.is_whitespace())
            .map(|i| i + 1)
            .filter(|&i| tail.as_bytes()[i] == b';');

        match end {
            Some(end) => {
                let reference = &tail[..=end];
                match unescape_with(reference, resolve_entity) {
                    Ok(text) => out.push_str(&text),
                    Err(_) => {
                        tracing::debug!(reference = %reference, "Keeping unresolvable reference");
                        out.push_str(reference);
                    }
                }
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn push_text(parent: &mut XmlElement, text: String) {
    // Adjacent runs (text split around a CDATA section or an entity) are merged
    if let Some(XmlNode::Text(last)) = parent.nodes.last_mut() {
        last.push_str(&text);
    } else {
        parent.nodes.push(XmlNode::Text(text));
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.nodes.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(XmlError::MultipleRoots),
    }
}
