use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{ensure_success, retain_valid, ContestProvider};
use crate::error::{FetchError, Result};
use crate::models::{Contest, ContestStatus, Site};

const PROVIDER: &str = "codeforces";
const SECONDS_PER_DAY: i64 = 86_400;

/// Client for the Codeforces contest list API
pub struct CodeforcesClient {
    client: Client,
    base_url: String,
}

/// Envelope of every Codeforces API response
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    status: String,
    comment: Option<String>,
    #[serde(default)]
    result: Vec<ContestData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContestData {
    id: i64,
    name: String,
    phase: String,
    duration_seconds: i64,
    start_time_seconds: Option<i64>,
    /// Seconds since start as seen by the server; negative before start
    relative_time_seconds: Option<i64>,
}

impl CodeforcesClient {
    /// Create a new Codeforces client
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch contests that have not started yet
    pub async fn fetch_upcoming(&self) -> Result<Vec<Contest>> {
        let url = format!("{}/contest.list?gym=false", self.base_url);
        debug!("Fetching Codeforces contests from: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        let body: ApiResponse = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        map_contests(body, Utc::now())
    }
}

#[async_trait]
impl ContestProvider for CodeforcesClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_contests(&self) -> Result<Vec<Contest>> {
        self.fetch_upcoming().await
    }
}

/// Map a contest list response, keeping only contests in the BEFORE phase
pub(crate) fn map_contests(body: ApiResponse, now: DateTime<Utc>) -> Result<Vec<Contest>> {
    if body.status != "OK" {
        return Err(FetchError::upstream(
            PROVIDER,
            body.comment.unwrap_or(body.status),
        ));
    }

    let contests: Vec<Contest> = body
        .result
        .into_iter()
        .filter(|c| c.phase == "BEFORE")
        .filter_map(|c| convert_contest(c, now))
        .collect();

    debug!("Codeforces returned {} upcoming contests", contests.len());

    Ok(retain_valid(PROVIDER, contests))
}

/// Convert raw API data to our model
fn convert_contest(data: ContestData, now: DateTime<Utc>) -> Option<Contest> {
    let Some(start_seconds) = data.start_time_seconds else {
        warn!("Codeforces contest {} has no start time, skipping", data.id);
        return None;
    };

    let Some(end_seconds) = start_seconds.checked_add(data.duration_seconds) else {
        warn!(
            "Codeforces contest {} has an out of range duration, skipping",
            data.id
        );
        return None;
    };

    let start_time = DateTime::from_timestamp(start_seconds, 0)?;
    let end_time = DateTime::from_timestamp(end_seconds, 0)?;

    let relative = data
        .relative_time_seconds
        .unwrap_or_else(|| now.timestamp() - start_seconds);

    Some(Contest {
        name: data.name,
        url: format!("https://codeforces.com/contests/{}", data.id),
        start_time,
        end_time,
        duration: u64::try_from(data.duration_seconds).ok()?,
        site: Site::Codeforces,
        in_24_hours: relative > -SECONDS_PER_DAY,
        status: ContestStatus::Before,
    })
}
