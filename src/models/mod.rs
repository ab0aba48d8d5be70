pub mod contest;
pub mod countdown;
pub mod snapshot;

pub use contest::{Contest, ContestStatus, InvalidContest, Site, SiteFilter};
pub use countdown::Countdown;
pub use snapshot::FeedSnapshot;
