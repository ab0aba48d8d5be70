use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;

use crate::models::Countdown;

const TICK: Duration = Duration::from_secs(1);

/// Recomputes a contest countdown once per second while held.
///
/// Dropping the ticker cancels the recomputation.
pub struct CountdownTicker {
    receiver: watch::Receiver<Countdown>,
    handle: JoinHandle<()>,
}

impl CountdownTicker {
    /// Start ticking for the given contest window
    pub fn spawn(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let (sender, receiver) = watch::channel(Countdown::compute(start, end, Utc::now()));

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(TICK);
            interval.tick().await;

            loop {
                interval.tick().await;
                if sender
                    .send(Countdown::compute(start, end, Utc::now()))
                    .is_err()
                {
                    break;
                }
            }
        });

        Self { receiver, handle }
    }

    /// Countdown as of the last tick
    pub fn current(&self) -> Countdown {
        *self.receiver.borrow()
    }

    /// Wait for the next tick
    pub async fn changed(&mut self) -> Option<Countdown> {
        self.receiver.changed().await.ok()?;
        let countdown = *self.receiver.borrow_and_update();
        Some(countdown)
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_second() {
        let start = Utc::now() + chrono::Duration::days(2) + chrono::Duration::minutes(30);
        let mut ticker = CountdownTicker::spawn(start, start + chrono::Duration::hours(2));

        assert_eq!(ticker.current().days, 2);
        assert!(!ticker.current().is_starting_soon);

        let next = ticker.changed().await.unwrap();
        assert!(!next.is_live);
        assert_eq!(next.days, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_window() {
        let start = Utc::now() - chrono::Duration::minutes(5);
        let mut ticker = CountdownTicker::spawn(start, start + chrono::Duration::hours(2));

        assert!(ticker.current().is_live);
        assert!(ticker.changed().await.unwrap().is_live);
    }
}
