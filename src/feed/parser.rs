use thiserror::Error;

use super::detect::{detect, FeedFormat};
use super::model::{Feed, Item};
use super::ns;
use super::resolve::{self, ItemBody};
use super::xml::{XmlDocument, XmlElement, XmlError};

/// Errors that abort parsing of a whole document.
///
/// Missing optional elements never produce one of these; they degrade to
/// `None` or an empty list instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The document is RSS 1.0 (RDF), which is recognized but not supported.
    #[error("RSS 1.0 documents are not supported")]
    UnsupportedFormat,

    #[error("Feed type unknown or unsupported")]
    UnknownFormat,

    /// An element the format requires is missing.
    #[error("Invalid feed structure: {0}")]
    Structural(String),

    #[error("Malformed XML: {0}")]
    Malformed(#[from] XmlError),
}

/// Parses feed XML text into a [`Feed`].
///
/// # Arguments
///
/// * `xml` - Complete RSS 2.0 or Atom document
///
/// # Errors
///
/// - [`ParseError::Malformed`] if the text is not well-formed XML
/// - [`ParseError::UnsupportedFormat`] for RSS 1.0 documents
/// - [`ParseError::UnknownFormat`] for anything that is neither RSS 2.0 nor Atom
/// - [`ParseError::Structural`] if an RSS item has no `<link>`
pub fn parse_feed(xml: &str) -> Result<Feed, ParseError> {
    let doc = XmlDocument::parse(xml)?;
    parse_document(&doc)
}

/// Builds a [`Feed`] from an already parsed document.
pub fn parse_document(doc: &XmlDocument) -> Result<Feed, ParseError> {
    match detect(doc) {
        FeedFormat::Rss2 => parse_rss(doc),
        FeedFormat::Atom => Ok(parse_atom(doc.root())),
        FeedFormat::Rdf => Err(ParseError::UnsupportedFormat),
        FeedFormat::Unknown => Err(ParseError::UnknownFormat),
    }
}

/// Best-effort title of a feed document, `""` when none can be found.
///
/// Used by discovery, which must not fail on documents it cannot fully parse.
pub fn document_title(doc: &XmlDocument) -> String {
    let title = match detect(doc) {
        FeedFormat::Rss2 => channel(doc).and_then(|channel| channel.child_text("title")),
        FeedFormat::Atom => doc.root().child_text("title"),
        FeedFormat::Rdf | FeedFormat::Unknown => None,
    };
    title.unwrap_or_default()
}

/// First `<channel>` directly under the `<rss>` root.
fn channel(doc: &XmlDocument) -> Option<&XmlElement> {
    doc.root().child("channel")
}

fn parse_rss(doc: &XmlDocument) -> Result<Feed, ParseError> {
    // Detection only guarantees a channel somewhere below the root
    let channel = channel(doc)
        .ok_or_else(|| ParseError::Structural("<rss> has no direct <channel> child".into()))?;

    let items = channel
        .children_named("item")
        .enumerate()
        .map(|(index, item)| parse_rss_item(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Feed {
        title: channel.child_text("title").unwrap_or_default(),
        link: channel.child_text("link").unwrap_or_default(),
        image: channel
            .child("image")
            .and_then(|image| image.child_text("url")),
        description: channel.child_text("description"),
        items,
    })
}

fn parse_rss_item(index: usize, item: &XmlElement) -> Result<Item, ParseError> {
    let link = item
        .child("link")
        .ok_or_else(|| ParseError::Structural(format!("RSS item {} has no <link>", index + 1)))?;

    let ItemBody { summary, content } = resolve::rss_body(item);

    Ok(Item {
        title: item.child_text("title").unwrap_or_default(),
        link: link.text().trim().to_owned(),
        image: resolve::image(item),
        published: item.child_text("pubDate"),
        authors: resolve::authors(item),
        categories: item
            .children_named("category")
            .filter_map(XmlElement::trimmed_text)
            .collect(),
        summary,
        content,
    })
}

fn parse_atom(feed: &XmlElement) -> Feed {
    let link = feed
        .children_named("link")
        .find(|link| {
            link.namespace() == Some(ns::ATOM)
                && matches!(link.attr("rel"), None | Some("alternate"))
        })
        .and_then(|link| link.attr("href"))
        .map(|href| href.trim().to_owned())
        .unwrap_or_default();

    Feed {
        title: feed.child_text("title").unwrap_or_default(),
        link,
        // A missing icon yields an empty image rather than none, unlike RSS
        image: Some(feed.child_text("icon").unwrap_or_default()),
        description: feed.child_text("summary"),
        items: feed.children_named("entry").map(parse_atom_entry).collect(),
    }
}

fn parse_atom_entry(entry: &XmlElement) -> Item {
    Item {
        title: entry.child_text("title").unwrap_or_default(),
        link: entry
            .child("link")
            .and_then(|link| link.attr("href"))
            .map(|href| href.trim().to_owned())
            .unwrap_or_default(),
        image: resolve::image(entry),
        published: entry.child_text("published"),
        authors: resolve::authors(entry),
        categories: entry
            .children_named("category")
            .filter_map(|category| category.attr("name"))
            .map(str::to_owned)
            .collect(),
        summary: entry.child_text("summary"),
        content: entry.child_text("content"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rss_channel_defaults() {
        let feed = parse_feed(r#"<rss version="2.0"><channel></channel></rss>"#).unwrap();
        assert_eq!(feed, Feed::default());
    }

    #[test]
    fn test_rss_channel_image_url() {
        let feed = parse_feed(
            r#"<rss version="2.0"><channel>
                 <image><url> https://ex.com/logo.png </url><title>Logo</title></image>
               </channel></rss>"#,
        )
        .unwrap();
        assert_eq!(feed.image.as_deref(), Some("https://ex.com/logo.png"));
    }

    #[test]
    fn test_rss_item_missing_link_is_structural() {
        let err = parse_feed(
            r#"<rss version="2.0"><channel>
                 <item><title>ok</title><link>https://ex.com/1</link></item>
                 <item><title>broken</title></item>
               </channel></rss>"#,
        )
        .unwrap_err();
        assert_eq!(err, ParseError::Structural("RSS item 2 has no <link>".into()));
    }

    #[test]
    fn test_rss_item_empty_link_is_allowed() {
        let feed =
            parse_feed(r#"<rss version="2.0"><channel><item><link/></item></channel></rss>"#)
                .unwrap();
        assert_eq!(feed.items[0].link, "");
    }

    #[test]
    fn test_rss_channel_nested_deeper_is_structural() {
        let err = parse_feed(r#"<rss version="2.0"><wrap><channel/></wrap></rss>"#).unwrap_err();
        assert!(matches!(err, ParseError::Structural(_)));
    }

    #[test]
    fn test_rdf_is_unsupported() {
        let err = parse_feed(
            r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#" xmlns="http://purl.org/rss/1.0/"><channel/></rdf:RDF>"#,
        )
        .unwrap_err();
        assert_eq!(err, ParseError::UnsupportedFormat);
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(
            parse_feed("<html><body/></html>").unwrap_err(),
            ParseError::UnknownFormat
        );
        assert!(matches!(
            parse_feed("<rss version=\"2.0\"><channel>").unwrap_err(),
            ParseError::Malformed(_)
        ));
    }

    #[test]
    fn test_atom_defaults() {
        let feed = parse_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"/>"#).unwrap();
        assert_eq!(feed.title, "");
        assert_eq!(feed.link, "");
        assert_eq!(feed.image.as_deref(), Some(""));
        assert_eq!(feed.description, None);
        assert!(feed.items.is_empty());
    }

    #[test]
    fn test_atom_link_prefers_alternate() {
        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                 <link rel="self" href="https://ex.com/feed.atom"/>
                 <link rel="alternate" href="https://ex.com/"/>
               </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.link, "https://ex.com/");
    }

    #[test]
    fn test_atom_link_without_rel_counts_as_alternate() {
        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                 <link rel="hub" href="https://hub.ex.com/"/>
                 <link href="https://ex.com/"/>
               </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.link, "https://ex.com/");
    }

    #[test]
    fn test_atom_link_outside_atom_namespace_is_skipped() {
        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:x="https://ex.com/ns">
                 <x:link href="https://wrong.ex.com/"/>
                 <link rel="alternate" href="https://ex.com/"/>
               </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.link, "https://ex.com/");

        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><link xmlns="" href="https://wrong.ex.com/"/></feed>"#,
        )
        .unwrap();
        assert_eq!(feed.link, "");
    }

    #[test]
    fn test_atom_entry_link_is_first_link() {
        let feed = parse_feed(
            r#"<feed xmlns="http://www.w3.org/2005/Atom">
                 <entry><link rel="edit" href="https://ex.com/edit/1"/><link href="https://ex.com/1"/></entry>
                 <entry><title>no link</title></entry>
               </feed>"#,
        )
        .unwrap();
        assert_eq!(feed.items[0].link, "https://ex.com/edit/1");
        assert_eq!(feed.items[1].link, "");
    }

    #[test]
    fn test_document_title() {
        let rss = XmlDocument::parse(
            r#"<rss version="2.0"><channel><title> Blog </title></channel></rss>"#,
        )
        .unwrap();
        let atom = XmlDocument::parse(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Atom Blog</title></feed>"#,
        )
        .unwrap();
        let other = XmlDocument::parse("<opml><head><title>Subs</title></head></opml>").unwrap();

        assert_eq!(document_title(&rss), "Blog");
        assert_eq!(document_title(&atom), "Atom Blog");
        assert_eq!(document_title(&other), "");
    }
}
