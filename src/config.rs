use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which upstream design feeds the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    /// Codeforces, LeetCode and CodeChef queried side by side
    Providers,
    /// The clist.by aggregation API as the only source
    Clist,
}

/// clist.by API credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClistCredentials {
    pub username: String,
    pub api_key: String,
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream design to aggregate from
    pub feed_source: FeedSource,

    /// Per-request timeout in seconds
    pub request_timeout: u64,

    /// Seconds before cached data counts as stale
    pub stale_after: u64,

    /// Interval in seconds between background refreshes
    pub refresh_interval: u64,

    /// Codeforces API base URL
    pub codeforces_api_url: String,

    /// LeetCode GraphQL endpoint
    pub leetcode_graphql_url: String,

    /// Optional relay wrapping LeetCode responses as `{contents}`
    pub leetcode_relay_url: Option<String>,

    /// CodeChef API base URL
    pub codechef_api_url: String,

    /// Optional relay passing CodeChef responses through unchanged
    pub codechef_relay_url: Option<String>,

    /// clist.by API base URL
    pub clist_api_url: String,

    pub clist_credentials: Option<ClistCredentials>,

    /// clist.by resource ids to request
    pub clist_resource_ids: Vec<u32>,

    /// Maximum number of contests requested from clist.by
    pub clist_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let feed_source = match var_or("FEED_SOURCE", "providers").to_lowercase().as_str() {
            "providers" => FeedSource::Providers,
            "clist" => FeedSource::Clist,
            other => bail!("FEED_SOURCE must be 'providers' or 'clist', got '{}'", other),
        };

        let clist_credentials = match (optional("CLIST_USERNAME"), optional("CLIST_API_KEY")) {
            (Some(username), Some(api_key)) => Some(ClistCredentials { username, api_key }),
            _ => None,
        };

        let clist_resource_ids = var_or("CLIST_RESOURCE_IDS", "1,2,102")
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| id.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("CLIST_RESOURCE_IDS must be a comma separated list of numbers")?;

        let request_timeout: u64 = var_or("REQUEST_TIMEOUT_SECS", "10")
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a valid number")?;
        if request_timeout == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let refresh_interval: u64 = var_or("REFRESH_INTERVAL_SECS", "1800")
            .parse()
            .context("REFRESH_INTERVAL_SECS must be a valid number")?;
        if refresh_interval == 0 {
            bail!("REFRESH_INTERVAL_SECS must be greater than zero");
        }

        Ok(Config {
            feed_source,

            request_timeout,

            stale_after: var_or("STALE_AFTER_SECS", "600")
                .parse()
                .context("STALE_AFTER_SECS must be a valid number")?,

            refresh_interval,

            codeforces_api_url: var_or("CODEFORCES_API_URL", "https://codeforces.com/api"),

            leetcode_graphql_url: var_or("LEETCODE_GRAPHQL_URL", "https://leetcode.com/graphql"),

            leetcode_relay_url: optional("LEETCODE_RELAY_URL"),

            codechef_api_url: var_or("CODECHEF_API_URL", "https://www.codechef.com/api"),

            codechef_relay_url: optional("CODECHEF_RELAY_URL"),

            clist_api_url: var_or("CLIST_API_URL", "https://clist.by/api/v4"),

            clist_credentials,

            clist_resource_ids,

            clist_limit: var_or("CLIST_LIMIT", "100")
                .parse()
                .context("CLIST_LIMIT must be a valid number")?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.feed_source, FeedSource::Providers);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.stale_after(), Duration::from_secs(600));
        assert_eq!(config.refresh_interval(), Duration::from_secs(1800));
        assert_eq!(config.clist_resource_ids, vec![1, 2, 102]);
        assert!(config.clist_credentials.is_none());
        assert!(config.leetcode_relay_url.is_none());
    }

    #[test]
    fn test_clist_source_with_credentials() {
        let config = config_from(&[
            ("FEED_SOURCE", "clist"),
            ("CLIST_USERNAME", "alice"),
            ("CLIST_API_KEY", "secret"),
            ("CLIST_RESOURCE_IDS", "1, 93"),
        ])
        .unwrap();

        assert_eq!(config.feed_source, FeedSource::Clist);
        assert_eq!(
            config.clist_credentials,
            Some(ClistCredentials {
                username: "alice".to_string(),
                api_key: "secret".to_string(),
            })
        );
        assert_eq!(config.clist_resource_ids, vec![1, 93]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(config_from(&[("REQUEST_TIMEOUT_SECS", "ten")]).is_err());
        assert!(config_from(&[("FEED_SOURCE", "kontests")]).is_err());
        assert!(config_from(&[("CLIST_RESOURCE_IDS", "1,x")]).is_err());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let err = config_from(&[("REFRESH_INTERVAL_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("REFRESH_INTERVAL_SECS"));

        let err = config_from(&[("REQUEST_TIMEOUT_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS"));

        // Zero staleness only means every read revalidates
        assert!(config_from(&[("STALE_AFTER_SECS", "0")]).is_ok());
    }
}
