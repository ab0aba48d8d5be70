use async_trait::async_trait;
use chrono::{DateTime, Utc};
use graphql_client::{QueryBody, Response as GraphQLResponse};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{ensure_success, relay_url, retain_valid, ContestProvider};
use crate::error::{FetchError, Result};
use crate::models::{Contest, ContestStatus, Site};

const PROVIDER: &str = "leetcode";
const MS_PER_DAY: i64 = 86_400_000;

const UPCOMING_CONTESTS_QUERY: &str =
    "query upcomingContests { upcomingContests { title titleSlug startTime duration } }";

/// Client for the LeetCode GraphQL API
pub struct LeetCodeClient {
    client: Client,
    endpoint: String,
    /// Relay answering with `{"contents": "<upstream body>"}`
    relay: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpcomingContestsData {
    upcoming_contests: Option<Vec<ContestData>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContestData {
    title: String,
    title_slug: String,
    /// Epoch seconds
    start_time: i64,
    /// Seconds
    duration: i64,
}

/// Body returned by a wrapping relay
#[derive(Debug, Deserialize)]
struct RelayEnvelope {
    contents: String,
}

impl LeetCodeClient {
    /// Create a client that talks to the GraphQL endpoint directly
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            relay: None,
        }
    }

    /// Route requests through a wrapping relay instead
    pub fn with_relay(mut self, relay: Option<String>) -> Self {
        self.relay = relay;
        self
    }

    /// Fetch upcoming contests
    pub async fn fetch_upcoming(&self) -> Result<Vec<Contest>> {
        let response = match &self.relay {
            Some(relay) => self.query_via_relay(relay).await?,
            None => self.query_direct().await?,
        };

        map_contests(response, Utc::now())
    }

    async fn query_direct(&self) -> Result<GraphQLResponse<UpcomingContestsData>> {
        debug!("Querying LeetCode GraphQL at: {}", self.endpoint);

        let body = QueryBody {
            variables: serde_json::json!({}),
            query: UPCOMING_CONTESTS_QUERY,
            operation_name: "upcomingContests",
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))
    }

    async fn query_via_relay(&self, relay: &str) -> Result<GraphQLResponse<UpcomingContestsData>> {
        let target = format!(
            "{}?query={}",
            self.endpoint,
            urlencoding::encode(UPCOMING_CONTESTS_QUERY)
        );
        let url = relay_url(relay, &target);
        debug!("Querying LeetCode through relay: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        let envelope: RelayEnvelope = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        parse_relay_contents(&envelope.contents)
    }
}

#[async_trait]
impl ContestProvider for LeetCodeClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_contests(&self) -> Result<Vec<Contest>> {
        self.fetch_upcoming().await
    }
}

/// The relay hands back the upstream body as a string
fn parse_relay_contents(contents: &str) -> Result<GraphQLResponse<UpcomingContestsData>> {
    Ok(serde_json::from_str(contents)?)
}

/// Map a GraphQL response. The query only returns upcoming contests.
pub(crate) fn map_contests(
    response: GraphQLResponse<UpcomingContestsData>,
    now: DateTime<Utc>,
) -> Result<Vec<Contest>> {
    let errors: Vec<String> = response
        .errors
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.message)
        .collect();

    let upcoming = match response.data.and_then(|d| d.upcoming_contests) {
        Some(upcoming) => {
            if !errors.is_empty() {
                warn!("LeetCode GraphQL errors: {:?}", errors);
            }
            upcoming
        }
        None if !errors.is_empty() => {
            return Err(FetchError::upstream(PROVIDER, errors.join("; ")));
        }
        None => {
            return Err(FetchError::upstream(PROVIDER, "response carried no data"));
        }
    };

    let contests: Vec<Contest> = upcoming
        .into_iter()
        .filter_map(|c| convert_contest(c, now))
        .collect();

    debug!("LeetCode returned {} upcoming contests", contests.len());

    Ok(retain_valid(PROVIDER, contests))
}

/// Convert raw API data to our model
fn convert_contest(data: ContestData, now: DateTime<Utc>) -> Option<Contest> {
    let Some(end_seconds) = data.start_time.checked_add(data.duration) else {
        warn!(
            "LeetCode contest {} has an out of range duration, skipping",
            data.title_slug
        );
        return None;
    };

    let start_time = DateTime::from_timestamp(data.start_time, 0)?;
    let end_time = DateTime::from_timestamp(end_seconds, 0)?;

    let until_start_ms = start_time.timestamp_millis() - now.timestamp_millis();

    Some(Contest {
        name: data.title,
        url: format!("https://leetcode.com/contest/{}", data.title_slug),
        start_time,
        end_time,
        duration: u64::try_from(data.duration).ok()?,
        site: Site::LeetCode,
        in_24_hours: until_start_ms < MS_PER_DAY,
        status: ContestStatus::Before,
    })
}
