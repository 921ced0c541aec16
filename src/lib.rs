//! Feed reader core: RSS 2.0 and Atom parsing into one canonical model,
//! feed auto-discovery, and conditional-GET polling of subscriptions.

pub mod config;
pub mod feed;
pub mod storage;
pub mod subscriptions;
pub mod util;

pub use config::{Config, ConfigError};
pub use feed::{find_feeds, parse_feed, poll_feed, Feed, FeedLookupEntry, Item, PollOutcome};
pub use storage::{Repository, Subscription};
