//! Field resolvers shared by the RSS and Atom parsers.
//!
//! Each resolver looks only at the direct children of one item/entry
//! element and never fails: a missing source simply yields nothing.

use super::ns;
use super::xml::XmlElement;

/// MIME types treated as images when they appear on an enclosure or
/// Media RSS content element. Compared case-insensitively.
const IMAGE_MIMES: &[&str] = &[
    "image/apng",
    "image/avif",
    "image/bmp",
    "image/gif",
    "image/vnd.microsoft.icon",
    "image/jpeg",
    "image/png",
    "image/svg+xml",
    "image/tiff",
    "image/webp",
];

fn is_image_mime(mime: &str) -> bool {
    let mime = mime.to_ascii_lowercase();
    IMAGE_MIMES.contains(&mime.as_str())
}

/// Summary and content of an RSS item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemBody {
    pub summary: Option<String>,
    pub content: Option<String>,
}

/// Splits an RSS item's text into summary and content.
///
/// `content:encoded` carries the full article when present, and the
/// `description` becomes its synopsis. Without it, the `description` is
/// the only text available and is treated as the content.
pub fn rss_body(item: &XmlElement) -> ItemBody {
    let description = item.child_text("description");

    match item.child_ns("encoded", ns::CONTENT) {
        Some(encoded) => ItemBody {
            summary: description,
            content: encoded.trimmed_text(),
        },
        None => ItemBody {
            summary: None,
            content: description,
        },
    }
}

type AuthorSource = fn(&XmlElement) -> Vec<String>;

/// Sources consulted for authors, in output order.
const AUTHOR_SOURCES: &[AuthorSource] = &[dc_creators, author_direct_text, atom_author_names];

/// Collects authors from every representation a feed may use.
///
/// Results of all sources are concatenated without deduplication. An Atom
/// `<author>` with both loose text and a `<name>` therefore appears twice.
pub fn authors(item: &XmlElement) -> Vec<String> {
    AUTHOR_SOURCES
        .iter()
        .flat_map(|source| source(item))
        .collect()
}

/// `<dc:creator>` text.
fn dc_creators(item: &XmlElement) -> Vec<String> {
    item.children_named("creator")
        .filter(|creator| creator.namespace() == Some(ns::DC))
        .filter_map(XmlElement::trimmed_text)
        .collect()
}

/// Loose text of every `<author>`, whatever its namespace (RSS style).
fn author_direct_text(item: &XmlElement) -> Vec<String> {
    item.children_named("author")
        .filter_map(XmlElement::direct_text)
        .collect()
}

/// `<name>` of every Atom `<author>` person construct.
fn atom_author_names(item: &XmlElement) -> Vec<String> {
    item.children_named("author")
        .filter(|author| author.namespace() == Some(ns::ATOM))
        .filter_map(|author| author.child_text("name"))
        .collect()
}

/// Finds an image for an item from its enclosure or Media RSS content.
pub fn image(item: &XmlElement) -> Option<String> {
    if let Some(enclosure) = item.child("enclosure") {
        // An image enclosure decides the result even when it has no url
        if enclosure.attr("type").is_some_and(is_image_mime) {
            return enclosure
                .attr("url")
                .filter(|url| !url.is_empty())
                .map(str::to_owned);
        }
    }

    let media = item.child_ns("content", ns::MEDIA_RSS)?;
    let is_image = media
        .attr("medium")
        .is_some_and(|medium| medium.eq_ignore_ascii_case("image"))
        || media.attr("type").is_some_and(is_image_mime);

    if is_image {
        media
            .attr("url")
            .filter(|url| !url.is_empty())
            .map(str::to_owned)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::xml::XmlDocument;
    use pretty_assertions::assert_eq;

    fn item(body: &str) -> XmlDocument {
        XmlDocument::parse(&format!(
            r#"<item xmlns:content="http://purl.org/rss/1.0/modules/content/"
                     xmlns:dc="http://purl.org/dc/elements/1.1/"
                     xmlns:media="http://search.yahoo.com/mrss/"
                     xmlns:atom="http://www.w3.org/2005/Atom">{body}</item>"#
        ))
        .unwrap()
    }

    #[test]
    fn test_body_encoded_and_description() {
        let doc = item(
            "<description> Short </description><content:encoded><![CDATA[<p>Full</p>]]></content:encoded>",
        );
        assert_eq!(
            rss_body(doc.root()),
            ItemBody {
                summary: Some("Short".into()),
                content: Some("<p>Full</p>".into()),
            }
        );
    }

    #[test]
    fn test_body_description_only() {
        let doc = item("<description>Only</description>");
        assert_eq!(
            rss_body(doc.root()),
            ItemBody {
                summary: None,
                content: Some("Only".into()),
            }
        );
    }

    #[test]
    fn test_body_encoded_outside_content_namespace_is_ignored() {
        let doc = item("<description>D</description><encoded>E</encoded>");
        assert_eq!(rss_body(doc.root()).content.as_deref(), Some("D"));
    }

    #[test]
    fn test_body_blank_text_is_absent() {
        let doc = item("<description>   </description><content:encoded/>");
        assert_eq!(rss_body(doc.root()), ItemBody::default());
    }

    #[test]
    fn test_authors_creators_first_then_direct_text() {
        let doc = item(
            "<author>a1@ex.com (A One)</author><dc:creator>C1</dc:creator>\
             <author>a2@ex.com</author><dc:creator>C2</dc:creator>",
        );
        assert_eq!(
            authors(doc.root()),
            vec!["C1", "C2", "a1@ex.com (A One)", "a2@ex.com"]
        );
    }

    #[test]
    fn test_authors_atom_person_contributes_twice() {
        let doc = item("<atom:author>Loose<atom:name>Jane Doe</atom:name></atom:author>");
        assert_eq!(authors(doc.root()), vec!["Loose", "Jane Doe"]);
    }

    #[test]
    fn test_authors_atom_person_without_loose_text() {
        let doc = item(
            "<atom:author>\n <atom:name>Jane</atom:name>\n <atom:email>j@ex.com</atom:email>\n</atom:author>",
        );
        assert_eq!(authors(doc.root()), vec!["Jane"]);
    }

    #[test]
    fn test_creator_in_other_namespace_is_ignored() {
        let doc = item("<creator>Nobody</creator>");
        assert!(authors(doc.root()).is_empty());
    }

    #[test]
    fn test_image_from_enclosure() {
        let doc = item(r#"<enclosure url="https://ex.com/a.jpg" type="IMAGE/JPEG" length="1"/>"#);
        assert_eq!(image(doc.root()).as_deref(), Some("https://ex.com/a.jpg"));
    }

    #[test]
    fn test_image_enclosure_without_url_is_absent() {
        let doc = item(
            r#"<enclosure type="image/png" length="1"/>
               <media:content url="https://ex.com/b.png" medium="image"/>"#,
        );
        assert_eq!(image(doc.root()), None);

        let doc = item(r#"<enclosure url="" type="image/png"/>"#);
        assert_eq!(image(doc.root()), None);
    }

    #[test]
    fn test_image_audio_enclosure_falls_back_to_media() {
        let doc = item(
            r#"<enclosure url="https://ex.com/a.mp3" type="audio/mpeg"/>
               <media:content url="https://ex.com/b.png" medium="Image"/>"#,
        );
        assert_eq!(image(doc.root()).as_deref(), Some("https://ex.com/b.png"));
    }

    #[test]
    fn test_image_enclosure_without_type_falls_back() {
        let doc = item(
            r#"<enclosure url="https://ex.com/a"/>
               <media:content url="https://ex.com/b.webp" type="image/webp"/>"#,
        );
        assert_eq!(image(doc.root()).as_deref(), Some("https://ex.com/b.webp"));
    }

    #[test]
    fn test_image_media_video_is_absent() {
        let doc = item(r#"<media:content url="https://ex.com/v.mp4" medium="video"/>"#);
        assert_eq!(image(doc.root()), None);
    }

    #[test]
    fn test_image_media_without_url_is_absent() {
        let doc = item(r#"<media:content medium="image"/>"#);
        assert_eq!(image(doc.root()), None);
    }

    #[test]
    fn test_image_atom_content_is_not_media() {
        let doc = item(r#"<atom:content type="image/png">x</atom:content>"#);
        assert_eq!(image(doc.root()), None);
    }
}
