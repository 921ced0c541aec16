use reqwest::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH, USER_AGENT as USER_AGENT_HEADER};
use reqwest::{Client, StatusCode};

use super::http::{read_response, FetchError, FetchedResponse, USER_AGENT};
use crate::storage::Subscription;

/// Result of polling a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The server answered 304: the stored copy is current.
    NotModified,
    /// New content, to be re-parsed and stored along with its validators.
    Modified(FetchedResponse),
}

/// Polls a subscribed feed with a conditional GET.
///
/// Sends `If-Modified-Since` and `If-None-Match` from the validators stored
/// on the subscription (empty when never set). A 304 answer is reported as
/// [`PollOutcome::NotModified`], not as an error.
///
/// # Arguments
///
/// * `client` - HTTP client (see [`super::build_client`])
/// * `subscription` - Feed to poll; its `url` and `last_fetch` validators are used
///
/// # Errors
///
/// - [`FetchError::HttpStatus`] for any other non-2xx status
/// - [`FetchError::Network`] / [`FetchError::ResponseTooLarge`] as for [`super::fetch_url`]
pub async fn poll_feed(client: &Client, subscription: &Subscription) -> Result<PollOutcome, FetchError> {
    let validators = &subscription.last_fetch;

    let response = client
        .get(&subscription.url)
        .header(USER_AGENT_HEADER, USER_AGENT)
        .header(IF_MODIFIED_SINCE, validators.last_modified.as_str())
        .header(IF_NONE_MATCH, validators.etag.as_str())
        .send()
        .await?;

    let status = response.status();
    if status == StatusCode::NOT_MODIFIED {
        tracing::debug!(id = %subscription.id, url = %subscription.url, "Feed not modified");
        return Ok(PollOutcome::NotModified);
    }

    if !status.is_success() {
        tracing::warn!(
            id = %subscription.id,
            url = %subscription.url,
            status = status.as_u16(),
            "Polling feed failed"
        );
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let response = read_response(response).await?;
    tracing::debug!(id = %subscription.id, bytes = response.body.len(), "Feed modified");
    Ok(PollOutcome::Modified(response))
}
