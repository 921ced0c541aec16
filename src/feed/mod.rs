//! Feed ingestion: parsing, auto-discovery and polling.
//!
//! This module turns syndication documents into one canonical model and
//! implements the network side around it:
//!
//! - **Parsing**: RSS 2.0 and Atom XML into [`Feed`] / [`Item`]
//! - **Detection**: classify a document once, dispatch once ([`detect`])
//! - **Discovery**: find feeds behind a page URL ([`find_feeds`])
//! - **Polling**: conditional GET against stored validators ([`poll_feed`])
//!
//! # Architecture
//!
//! - [`xml`] - owned namespace-aware element tree built with `quick-xml`
//! - `detect` - format classification
//! - `resolve` - content, author and image resolvers shared by the parsers
//! - `parser` - RSS 2.0 and Atom parsers behind [`parse_feed`]
//! - `http` - plain GET with the identification header
//! - `discovery` - feed-or-HTML classification and `<link rel="alternate">` scanning
//! - `poller` - `If-Modified-Since` / `If-None-Match` polling
//!
//! Nothing here holds shared state: every call produces fresh values, so
//! any number of fetches and parses may run concurrently.
//!
//! # Example
//!
//! ```ignore
//! use mite::feed::{find_feeds, parse_document};
//!
//! let client = mite::feed::build_client(&config)?;
//! for entry in find_feeds(&client, "https://example.com").await? {
//!     if let Some(doc) = &entry.document {
//!         let feed = parse_document(doc)?;
//!     }
//! }
//! ```

mod detect;
mod discovery;
mod http;
mod model;
mod parser;
mod poller;
mod resolve;
pub mod xml;

pub use detect::{detect, FeedFormat};
pub use discovery::{find_feeds, DiscoveryError, FeedLookupEntry, FEED_MIMES};
pub use http::{build_client, fetch_url, FetchError, FetchedResponse, Headers, USER_AGENT};
pub use model::{Feed, Item};
pub use parser::{document_title, parse_document, parse_feed, ParseError};
pub use poller::{poll_feed, PollOutcome};
pub use xml::{XmlDocument, XmlElement, XmlError};

/// Namespace URIs the parsers match against.
pub(crate) mod ns {
    pub const ATOM: &str = "http://www.w3.org/2005/Atom";
    pub const RSS1: &str = "http://purl.org/rss/1.0/";
    pub const CONTENT: &str = "http://purl.org/rss/1.0/modules/content/";
    pub const DC: &str = "http://purl.org/dc/elements/1.1/";
    pub const MEDIA_RSS: &str = "http://search.yahoo.com/mrss/";
}
