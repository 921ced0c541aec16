use serde::{Deserialize, Serialize};

/// Canonical feed, independent of the RSS or Atom document it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    /// Feed title, `""` when the document has none
    pub title: String,
    /// Link to the website the feed belongs to; may be empty
    pub link: String,
    pub image: Option<String>,
    pub description: Option<String>,
    /// Entries in document order
    pub items: Vec<Item>,
}

/// A single RSS item or Atom entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub link: String,
    pub image: Option<String>,
    /// Publication date exactly as written in the document
    pub published: Option<String>,
    /// Authors from every representation the document uses, duplicates kept
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
}
