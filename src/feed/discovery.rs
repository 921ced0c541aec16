use reqwest::Client;
use scraper::{Html, Selector};
use thiserror::Error;
use url::Url;

use super::http::{read_response, FetchError, FetchedResponse, Headers, USER_AGENT};
use super::parser::document_title;
use super::xml::XmlDocument;

/// Media types advertised by `<link rel="alternate">` tags that point to feeds.
pub const FEED_MIMES: [&str; 2] = ["application/rss+xml", "application/atom+xml"];

/// A feed found during discovery.
///
/// Created per [`find_feeds`] call and consumed when the user picks which
/// entries to subscribe to; never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLookupEntry {
    /// Title from the feed XML or from the HTML link's `title` attribute
    pub title: String,
    /// Absolute URL of the feed
    pub url: String,
    /// Whether the user chose to subscribe to this entry
    pub subscribe: bool,
    /// The parsed feed, when the discovered URL served the feed directly
    pub document: Option<XmlDocument>,
    /// Response headers of the feed request, alongside `document`
    pub headers: Option<Headers>,
}

impl FeedLookupEntry {
    /// An entry known only by title and URL (found in an HTML page).
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            subscribe: false,
            document: None,
            headers: None,
        }
    }
}

/// Errors that can occur during feed discovery.
///
/// Well-known HTTP statuses map to their own variants so the message can be
/// shown to the user as-is.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Feed requires authentication.")]
    AuthenticationRequired,
    #[error("Feed request was forbidden.")]
    Forbidden,
    #[error("No feed was found at the provided address.")]
    NotFound,
    #[error("Feed throttled or under rate limit. Wait and try again.")]
    RateLimited,
    /// Any other non-2xx status
    #[error("Could not fetch feed because URL returned code {0}")]
    HttpStatus(u16),
    /// HTTP request failed
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body exceeded the size limit
    #[error("response too large")]
    TooLarge,
}

impl DiscoveryError {
    fn from_status(code: u16) -> Self {
        match code {
            401 => DiscoveryError::AuthenticationRequired,
            403 => DiscoveryError::Forbidden,
            404 => DiscoveryError::NotFound,
            429 => DiscoveryError::RateLimited,
            other => DiscoveryError::HttpStatus(other),
        }
    }

    /// The HTTP status that caused this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DiscoveryError::AuthenticationRequired => Some(401),
            DiscoveryError::Forbidden => Some(403),
            DiscoveryError::NotFound => Some(404),
            DiscoveryError::RateLimited => Some(429),
            DiscoveryError::HttpStatus(code) => Some(*code),
            DiscoveryError::Network(e) => e.status().map(|s| s.as_u16()),
            DiscoveryError::TooLarge => None,
        }
    }
}

impl From<FetchError> for DiscoveryError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(e) => DiscoveryError::Network(e),
            FetchError::HttpStatus(code) => DiscoveryError::from_status(code),
            FetchError::ResponseTooLarge => DiscoveryError::TooLarge,
        }
    }
}

/// Performs feed auto-discovery on `url`.
///
/// - If `url` serves a feed (any content type other than `text/html`),
///   returns a single entry carrying the parsed document and headers. The
///   title is best-effort and empty when the document has none; a body that
///   is not well-formed XML gives an entry with no document.
/// - If `url` serves an HTML page, returns one entry per
///   `<link rel="alternate">` in its `<head>` advertising an RSS or Atom
///   feed. These entries carry no document; the feed is fetched only when
///   the user actually subscribes.
///
/// An HTML page without feed links yields an empty list.
///
/// # Arguments
///
/// * `client` - HTTP client used for the single GET
/// * `url` - Page or feed URL entered by the user
///
/// # Errors
///
/// Returns [`DiscoveryError`] for non-2xx responses (401, 403, 404 and 429
/// get dedicated variants), network failures and oversized bodies.
pub async fn find_feeds(client: &Client, url: &str) -> Result<Vec<FeedLookupEntry>, DiscoveryError> {
    tracing::debug!(url = %url, "Discovering feeds");

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        tracing::info!(url = %url, status = status.as_u16(), "Feed discovery failed");
        return Err(DiscoveryError::from_status(status.as_u16()));
    }

    let response = read_response(response).await?;

    // Sites are trusted not to serve feeds as text/html
    let is_html = response
        .content_type()
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("text/html"));

    if is_html {
        let entries = feed_links_in_html(&response.body, &response.url);
        tracing::debug!(url = %response.url, found = entries.len(), "Scanned HTML for feed links");
        Ok(entries)
    } else {
        Ok(vec![direct_feed_entry(response)])
    }
}

/// Entry for a response served as a feed.
///
/// A body that is not well-formed XML still yields an entry, untitled and
/// without a document; subscribing to it refetches and reports the error.
fn direct_feed_entry(response: FetchedResponse) -> FeedLookupEntry {
    let document = match XmlDocument::parse(&response.body) {
        Ok(document) => Some(document),
        Err(e) => {
            tracing::info!(url = %response.url, error = %e, "Feed response is not well-formed XML");
            None
        }
    };
    let title = document.as_ref().map(document_title).unwrap_or_default();

    FeedLookupEntry {
        title,
        url: response.url,
        subscribe: false,
        document,
        headers: Some(response.headers),
    }
}

/// Collects feed links from the `<head>` of an HTML page.
///
/// Relative hrefs resolve against the page's `<base href>` when it has one,
/// otherwise against `page_url` (the final URL after redirects).
fn feed_links_in_html(html: &str, page_url: &str) -> Vec<FeedLookupEntry> {
    let Ok(page) = Url::parse(page_url) else {
        tracing::warn!(url = %page_url, "Cannot resolve feed links against unparseable page URL");
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let base = document_base(&document, &page);

    let Ok(selector) = Selector::parse(r#"head > link[rel="alternate"]"#) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|link| {
            let element = link.value();
            let media_type = element.attr("type").unwrap_or("").to_ascii_lowercase();
            if !FEED_MIMES.iter().any(|mime| media_type.starts_with(mime)) {
                return None;
            }

            let href = element.attr("href")?;
            match base.join(href.trim()) {
                Ok(resolved) => Some(FeedLookupEntry::new(
                    element.attr("title").unwrap_or(""),
                    resolved.to_string(),
                )),
                Err(e) => {
                    tracing::debug!(href = %href, error = %e, "Skipping unresolvable feed link");
                    None
                }
            }
        })
        .collect()
}

/// The URL relative links resolve against: the first `<base href>` if the
/// page declares one, else the page URL itself.
fn document_base(document: &Html, page: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|base| base.value().attr("href"))
        .and_then(|href| page.join(href.trim()).ok())
        .unwrap_or_else(|| page.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relative_link_resolves_against_page() {
        let html = r#"<html><head>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml" title="Example">
        </head><body></body></html>"#;

        let entries = feed_links_in_html(html, "https://ex.com/page");
        assert_eq!(
            entries,
            vec![FeedLookupEntry::new("Example", "https://ex.com/feed.xml")]
        );
    }

    #[test]
    fn test_only_feed_types_are_collected() {
        let html = r#"<html><head>
            <link rel="alternate" type="application/atom+xml" href="atom.xml">
            <link rel="alternate" type="application/json" href="feed.json" title="JSON">
            <link rel="alternate" hreflang="de" href="/de/">
            <link rel="stylesheet" type="application/rss+xml" href="/not-a-feed">
            <link rel="alternate" type="application/rss+xml; charset=utf-8" href="https://cdn.ex.com/rss">
        </head></html>"#;

        let entries = feed_links_in_html(html, "https://ex.com/blog/post");
        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["https://ex.com/blog/atom.xml", "https://cdn.ex.com/rss"]);
        assert!(entries.iter().all(|e| e.title.is_empty() && !e.subscribe));
        assert!(entries.iter().all(|e| e.document.is_none() && e.headers.is_none()));
    }

    #[test]
    fn test_links_in_body_are_ignored() {
        let html = r#"<html><head><title>t</title></head><body>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
        </body></html>"#;
        assert!(feed_links_in_html(html, "https://ex.com/").is_empty());
    }

    #[test]
    fn test_existing_base_takes_precedence() {
        let html = r#"<html><head>
            <base href="https://static.ex.com/site/">
            <link rel="alternate" type="application/rss+xml" href="feed.xml">
        </head></html>"#;

        let entries = feed_links_in_html(html, "https://ex.com/page");
        assert_eq!(entries[0].url, "https://static.ex.com/site/feed.xml");
    }

    #[test]
    fn test_link_without_href_is_skipped() {
        let html = r#"<html><head><link rel="alternate" type="application/rss+xml"></head></html>"#;
        assert!(feed_links_in_html(html, "https://ex.com/").is_empty());
    }

    fn served(body: &str) -> FetchedResponse {
        FetchedResponse {
            status: 200,
            headers: Headers::from([("content-type".to_owned(), "application/xml".to_owned())]),
            body: body.to_owned(),
            url: "https://ex.com/feed".into(),
        }
    }

    #[test]
    fn test_direct_entry_carries_document_and_title() {
        let entry = direct_feed_entry(served(
            r#"<feed xmlns="http://www.w3.org/2005/Atom"><title> Atom! </title></feed>"#,
        ));
        assert_eq!(entry.title, "Atom!");
        assert_eq!(entry.url, "https://ex.com/feed");
        assert!(entry.document.is_some());
        assert!(entry.headers.is_some());
    }

    #[test]
    fn test_direct_entry_for_malformed_body_has_no_document() {
        let entry = direct_feed_entry(served("<rss version=\"2.0\"><channel>"));
        assert_eq!(entry.title, "");
        assert!(!entry.subscribe);
        assert!(entry.document.is_none());
        assert_eq!(entry.headers.unwrap()["content-type"], "application/xml");
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            DiscoveryError::from_status(401),
            DiscoveryError::AuthenticationRequired
        ));
        assert!(matches!(DiscoveryError::from_status(403), DiscoveryError::Forbidden));
        assert!(matches!(DiscoveryError::from_status(404), DiscoveryError::NotFound));
        assert!(matches!(DiscoveryError::from_status(429), DiscoveryError::RateLimited));

        let other = DiscoveryError::from_status(502);
        assert_eq!(other.status(), Some(502));
        assert_eq!(
            other.to_string(),
            "Could not fetch feed because URL returned code 502"
        );
    }
}
