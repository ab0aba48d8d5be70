pub mod aggregator;
mod cache;

pub use aggregator::{providers_from_config, ContestFeed, FeedSettings, FeedSubscription};
