use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{ensure_success, relay_url, retain_valid, ContestProvider};
use crate::error::{FetchError, Result};
use crate::models::{Contest, ContestStatus, Site};

const PROVIDER: &str = "codechef";
const MS_PER_DAY: i64 = 86_400_000;

/// Client for the CodeChef contest list API
pub struct CodeChefClient {
    client: Client,
    base_url: String,
    /// Relay returning the upstream body unchanged
    relay: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContestListResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    future_contests: Vec<ContestData>,
}

#[derive(Debug, Deserialize)]
struct ContestData {
    contest_code: String,
    contest_name: String,
    contest_start_date_iso: String,
    contest_end_date_iso: String,
    /// Minutes, sent either as a string or a number
    contest_duration: Minutes,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Minutes {
    Number(u64),
    Text(String),
    /// Negative, fractional or otherwise unusable; the entry is skipped
    Other(serde_json::Value),
}

impl Minutes {
    fn as_seconds(&self) -> Option<u64> {
        let minutes: u64 = match self {
            Minutes::Number(n) => *n,
            Minutes::Text(s) => s.trim().parse().ok()?,
            Minutes::Other(_) => return None,
        };
        minutes.checked_mul(60)
    }
}

impl CodeChefClient {
    /// Create a new CodeChef client
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            relay: None,
        }
    }

    /// Route requests through a pass-through relay instead
    pub fn with_relay(mut self, relay: Option<String>) -> Self {
        self.relay = relay;
        self
    }

    fn list_url(&self) -> String {
        let target = format!(
            "{}/list/contests/all?sort_by=START&sorting_order=asc&offset=0&mode=all",
            self.base_url
        );
        match &self.relay {
            Some(relay) => relay_url(relay, &target),
            None => target,
        }
    }

    /// Fetch future contests
    pub async fn fetch_upcoming(&self) -> Result<Vec<Contest>> {
        let url = self.list_url();
        debug!("Fetching CodeChef contests from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        let body: ContestListResponse = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        map_contests(body, Utc::now())
    }
}

#[async_trait]
impl ContestProvider for CodeChefClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_contests(&self) -> Result<Vec<Contest>> {
        self.fetch_upcoming().await
    }
}

/// Map the contest list, using only the `future_contests` bucket
pub(crate) fn map_contests(body: ContestListResponse, now: DateTime<Utc>) -> Result<Vec<Contest>> {
    if let Some(status) = body.status.as_deref() {
        if status != "success" {
            return Err(FetchError::upstream(
                PROVIDER,
                body.message.unwrap_or_else(|| status.to_string()),
            ));
        }
    }

    let contests: Vec<Contest> = body
        .future_contests
        .into_iter()
        .filter_map(|c| convert_contest(c, now))
        .collect();

    debug!("CodeChef returned {} future contests", contests.len());

    Ok(retain_valid(PROVIDER, contests))
}

/// Convert raw API data to our model
fn convert_contest(data: ContestData, now: DateTime<Utc>) -> Option<Contest> {
    let start_time = parse_iso(&data.contest_start_date_iso)?;
    let end_time = parse_iso(&data.contest_end_date_iso)?;

    let Some(duration) = data.contest_duration.as_seconds() else {
        warn!(
            "CodeChef contest {} has an unreadable duration, skipping",
            data.contest_code
        );
        return None;
    };

    let window = (end_time - start_time).num_seconds();
    if i64::try_from(duration).ok() != Some(window) {
        warn!(
            "CodeChef contest {} lists {}s but runs {}s from start to end, keeping the listed duration",
            data.contest_code, duration, window
        );
    }

    let until_start_ms = start_time.timestamp_millis() - now.timestamp_millis();

    Some(Contest {
        name: data.contest_name,
        url: format!("https://www.codechef.com/{}", data.contest_code),
        start_time,
        end_time,
        duration,
        site: Site::CodeChef,
        in_24_hours: until_start_ms < MS_PER_DAY,
        status: ContestStatus::Before,
    })
}

fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!("CodeChef: unreadable timestamp '{}': {}", value, e);
            None
        }
    }
}
