use std::fmt;

use super::ns;
use super::xml::XmlDocument;

/// The syndication format a document is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedFormat {
    Rss2,
    Atom,
    /// RSS 1.0. Recognized so it can be rejected with a precise error.
    Rdf,
    Unknown,
}

impl fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FeedFormat::Rss2 => "RSS 2.0",
            FeedFormat::Atom => "Atom",
            FeedFormat::Rdf => "RSS 1.0 (RDF)",
            FeedFormat::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Classifies a parsed document.
///
/// Checks run in a fixed order (RSS 2.0, then Atom, then RDF) so a document
/// that happens to declare the Atom namespace for module elements is still
/// classified by its root shape.
pub fn detect(doc: &XmlDocument) -> FeedFormat {
    let root = doc.root();

    if root.name() == "rss" && root.has_attr("version") && root.has_descendant("channel") {
        FeedFormat::Rss2
    } else if root.is("feed", ns::ATOM) {
        FeedFormat::Atom
    } else if root.attr("xmlns") == Some(ns::RSS1) {
        FeedFormat::Rdf
    } else {
        FeedFormat::Unknown
    }
}
