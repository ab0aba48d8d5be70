use std::env;
use std::io;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contest_feed::{Config, ContestFeed, SiteFilter};

/// Run one aggregation cycle and print the feed as JSON
#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fetch_contests=info,contest_feed=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    let filter = parse_site_filter(&args)?;

    let config = Config::from_env()?;
    let feed = ContestFeed::from_config(&config);

    info!("Fetching contests ({:?})", config.feed_source);
    let snapshot = feed.refetch().await;

    if let Some(error) = &snapshot.error {
        bail!("Failed to load contests: {}", error);
    }

    let contests = snapshot.filtered(filter);
    info!("Fetched {} contests", contests.len());

    let json = serde_json::to_string_pretty(&contests).context("Failed to serialize contests")?;
    println!("{}", json);

    Ok(())
}

/// Parse --site argument
fn parse_site_filter(args: &[String]) -> Result<SiteFilter> {
    for (i, arg) in args.iter().enumerate() {
        if arg == "--site" || arg == "-s" {
            if let Some(value) = args.get(i + 1) {
                return value.parse().map_err(|e: String| anyhow!(e));
            }
        }
    }
    Ok(SiteFilter::All)
}
