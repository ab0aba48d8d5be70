pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod workers;

pub use config::Config;
pub use error::FetchError;
pub use feed::{ContestFeed, FeedSettings, FeedSubscription};
pub use models::{Contest, ContestStatus, Countdown, FeedSnapshot, Site, SiteFilter};
