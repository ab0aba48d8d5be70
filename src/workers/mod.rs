pub mod countdown_ticker;
pub mod refresher;

pub use countdown_ticker::CountdownTicker;
pub use refresher::RefreshWorker;
