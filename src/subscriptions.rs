//! Subscription lifecycle on top of the feed core and a [`Repository`].
//!
//! These functions are the glue a front end calls: turn a discovery result
//! into a stored subscription, load what was stored, refresh it with a
//! conditional poll, and remove it again.

use reqwest::Client;
use thiserror::Error;
use uuid::Uuid;

use crate::feed::{
    fetch_url, parse_document, parse_feed, poll_feed, Feed, FeedLookupEntry, FetchError,
    ParseError, PollOutcome, XmlDocument,
};
use crate::storage::{LastFetch, Repository, StorageError, Subscription};
use crate::util::content_file_name;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Outcome of [`refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The server reported the stored copy as current.
    Unchanged,
    /// New content was stored; validators on `subscription` are updated.
    Updated {
        subscription: Subscription,
        feed: Feed,
    },
}

/// Creates a subscription from a discovery entry.
///
/// Entries found in an HTML page carry no document yet; the feed is fetched
/// here, and the final URL after redirects becomes the subscription URL.
/// The document must parse as a supported feed before anything is stored.
/// When the entry has no title, the feed's own title is used.
pub async fn subscribe(
    client: &Client,
    repo: &dyn Repository,
    entry: FeedLookupEntry,
) -> Result<Subscription, SubscriptionError> {
    let FeedLookupEntry {
        title,
        mut url,
        document,
        headers,
        ..
    } = entry;

    let (document, headers) = match document {
        Some(document) => (document, headers.unwrap_or_default()),
        None => {
            let response = fetch_url(client, &url).await?;
            let document = XmlDocument::parse(&response.body).map_err(ParseError::from)?;
            url = response.url;
            (document, response.headers)
        }
    };

    let feed = parse_document(&document)?;
    let title = if title.trim().is_empty() {
        feed.title
    } else {
        title
    };

    let id = Uuid::new_v4().to_string();
    let subscription = Subscription {
        read_from: content_file_name(&title, &id),
        id,
        title,
        url,
        last_fetch: LastFetch::from_headers(&headers),
    };

    // Content first, so a stored record always has something to read
    repo.write_content(&subscription, document.source()).await?;
    repo.put(subscription.clone()).await?;

    tracing::info!(
        id = %subscription.id,
        url = %subscription.url,
        items = feed.items.len(),
        "Subscribed to feed"
    );
    Ok(subscription)
}

/// Subscribes to every entry the user marked with `subscribe`.
///
/// Each entry succeeds or fails on its own; results keep entry order.
pub async fn subscribe_selected(
    client: &Client,
    repo: &dyn Repository,
    entries: Vec<FeedLookupEntry>,
) -> Vec<Result<Subscription, SubscriptionError>> {
    let mut results = Vec::new();
    for entry in entries.into_iter().filter(|entry| entry.subscribe) {
        results.push(subscribe(client, repo, entry).await);
    }
    results
}

/// Parses the locally stored copy of a subscription's feed.
pub async fn load_feed(repo: &dyn Repository, subscription: &Subscription) -> Result<Feed, SubscriptionError> {
    let xml = repo.read_content(subscription).await?;
    Ok(parse_feed(&xml)?)
}

/// Polls a subscription and stores new content when the server has any.
///
/// A response that fails to parse leaves the stored copy and validators
/// untouched, so the next poll asks for the content again.
pub async fn refresh(
    client: &Client,
    repo: &dyn Repository,
    subscription: &Subscription,
) -> Result<RefreshOutcome, SubscriptionError> {
    let response = match poll_feed(client, subscription).await? {
        PollOutcome::NotModified => return Ok(RefreshOutcome::Unchanged),
        PollOutcome::Modified(response) => response,
    };

    let feed = parse_feed(&response.body)?;

    let mut updated = subscription.clone();
    updated.last_fetch = LastFetch::from_headers(&response.headers);

    repo.write_content(&updated, &response.body).await?;
    repo.put(updated.clone()).await?;

    tracing::debug!(id = %updated.id, items = feed.items.len(), "Stored refreshed feed");
    Ok(RefreshOutcome::Updated {
        subscription: updated,
        feed,
    })
}

/// Deletes a subscription and its stored content.
pub async fn unsubscribe(repo: &dyn Repository, id: &str) -> Result<Subscription, SubscriptionError> {
    let subscription = repo.remove(id).await?;
    repo.remove_content(&subscription).await?;
    tracing::info!(id = %subscription.id, "Unsubscribed from feed");
    Ok(subscription)
}
