use std::env;

use anyhow::{anyhow, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contest_feed::workers::CountdownTicker;
use contest_feed::{Config, Contest, ContestFeed, Countdown, FeedSnapshot, SiteFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contest_feed=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting contest-feed");

    let args: Vec<String> = env::args().collect();
    let filter = parse_site_filter(&args)?;

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded (source: {:?})", config.feed_source);

    let feed = ContestFeed::from_config(&config);
    let mut subscription = feed.subscribe();

    // Countdown of the next contest in the listing
    let mut next_up: Option<(Contest, CountdownTicker, Countdown)> = None;
    let mut last_fetch = None;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            changed = subscription.changed() => {
                let Some(snapshot) = changed else {
                    warn!("Contest feed closed");
                    break;
                };

                // Only report completed cycles.
                if snapshot.fetched_at.is_none() || snapshot.fetched_at == last_fetch {
                    continue;
                }
                last_fetch = snapshot.fetched_at;

                log_snapshot(&snapshot, filter);

                next_up = snapshot.filtered(filter).first().map(|contest| {
                    let ticker = CountdownTicker::spawn(contest.start_time, contest.end_time);
                    let countdown = ticker.current();
                    ((*contest).clone(), ticker, countdown)
                });
            }
            Some(countdown) = next_tick(&mut next_up) => {
                if let Some((contest, _, previous)) = next_up.as_mut() {
                    log_transition(contest, previous, &countdown);
                    *previous = countdown;
                }
            }
        }
    }

    drop(subscription);
    info!("Shutting down contest-feed");
    Ok(())
}

/// Parse --site argument
fn parse_site_filter(args: &[String]) -> Result<SiteFilter> {
    for (i, arg) in args.iter().enumerate() {
        if arg == "--site" || arg == "-s" {
            let value = args
                .get(i + 1)
                .ok_or_else(|| anyhow!("--site needs a value"))?;
            return value.parse().map_err(|e: String| anyhow!(e));
        }
    }
    Ok(SiteFilter::All)
}

async fn next_tick(next_up: &mut Option<(Contest, CountdownTicker, Countdown)>) -> Option<Countdown> {
    match next_up {
        Some((_, ticker, _)) => ticker.changed().await,
        None => std::future::pending().await,
    }
}

fn log_snapshot(snapshot: &FeedSnapshot, filter: SiteFilter) {
    if let Some(error) = &snapshot.error {
        warn!("Failed to load contests: {}", error);
        return;
    }

    let contests = snapshot.filtered(filter);
    if contests.is_empty() {
        info!("No contests found");
        return;
    }

    info!("{} upcoming contests", contests.len());

    let now = Utc::now();
    for contest in contests {
        let countdown = Countdown::compute(contest.start_time, contest.end_time, now);
        info!(
            "{:<10} | {} | {} | {} | {}",
            contest.site.as_str(),
            contest.start_time.format("%a %b %e %H:%M UTC"),
            contest.duration_label(),
            badge(&countdown),
            contest.name,
        );
    }
}

fn badge(countdown: &Countdown) -> String {
    if countdown.is_live {
        format!(
            "LIVE {:02}:{:02}:{:02} left",
            countdown.hours, countdown.minutes, countdown.seconds
        )
    } else if countdown.is_ended() {
        "ended".to_string()
    } else {
        let soon = if countdown.is_starting_soon { " SOON" } else { "" };
        format!(
            "in {}d {:02}:{:02}:{:02}{}",
            countdown.days, countdown.hours, countdown.minutes, countdown.seconds, soon
        )
    }
}

fn log_transition(contest: &Contest, previous: &Countdown, current: &Countdown) {
    if current.is_live && !previous.is_live {
        info!("{} ({}) is live: {}", contest.name, contest.site, contest.url);
    } else if current.is_starting_soon && !previous.is_starting_soon {
        info!("{} ({}) starts within 24 hours", contest.name, contest.site);
    } else if current.is_ended() && !previous.is_ended() {
        info!("{} ({}) has ended", contest.name, contest.site);
    }
}
