use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{ensure_success, retain_valid, ContestProvider, FailurePolicy};
use crate::config::ClistCredentials;
use crate::error::{FetchError, Result};
use crate::models::{Contest, ContestStatus, Site};

const PROVIDER: &str = "clist";

/// clist.by resource ids of the platforms we know how to label
const RESOURCE_SITES: [(u32, Site); 4] = [
    (1, Site::Codeforces),
    (2, Site::CodeChef),
    (93, Site::AtCoder),
    (102, Site::LeetCode),
];

/// Client for the clist.by contest aggregation API.
///
/// Used as the only source of the feed, so its failures are shown to readers.
pub struct ClistClient {
    client: Client,
    base_url: String,
    credentials: Option<ClistCredentials>,
    resource_ids: Vec<u32>,
    limit: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContestListResponse {
    #[serde(default)]
    objects: Vec<ContestData>,
}

#[derive(Debug, Deserialize)]
struct ContestData {
    id: i64,
    event: String,
    href: String,
    /// Naive UTC, e.g. "2025-03-01T14:35:00"
    start: String,
    end: String,
    /// Seconds
    duration: Option<u64>,
    resource_id: u32,
}

/// Platform for a clist.by resource id
pub fn site_for_resource(resource_id: u32) -> Option<Site> {
    RESOURCE_SITES
        .iter()
        .find(|(id, _)| *id == resource_id)
        .map(|(_, site)| *site)
}

impl ClistClient {
    /// Create a new clist.by client
    pub fn new(
        client: Client,
        base_url: &str,
        credentials: Option<ClistCredentials>,
        resource_ids: Vec<u32>,
        limit: u32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            resource_ids,
            limit,
        }
    }

    /// Server-side filters: resources, start lower bound, ordering and limit
    fn query_params(&self, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let resource_ids = self
            .resource_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        vec![
            ("resource_id__in", resource_ids),
            ("start__gt", now.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("order_by", "start".to_string()),
            ("limit", self.limit.to_string()),
        ]
    }

    /// Fetch contests starting after now
    pub async fn fetch_upcoming(&self) -> Result<Vec<Contest>> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(FetchError::MissingCredentials(PROVIDER))?;

        let now = Utc::now();
        let url = format!("{}/contest/", self.base_url);
        debug!("Fetching clist.by contests from: {}", url);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("ApiKey {}:{}", credentials.username, credentials.api_key),
            )
            .header("Accept", "application/json")
            .query(&self.query_params(now))
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        let body: ContestListResponse = ensure_success(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(PROVIDER, e))?;

        Ok(map_contests(body, now))
    }
}

#[async_trait]
impl ContestProvider for ClistClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch_contests(&self) -> Result<Vec<Contest>> {
        self.fetch_upcoming().await
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Propagate
    }
}

/// Map the contest objects, keeping known platforms that have not started
pub(crate) fn map_contests(body: ContestListResponse, now: DateTime<Utc>) -> Vec<Contest> {
    let contests: Vec<Contest> = body
        .objects
        .into_iter()
        .filter_map(|c| convert_contest(c, now))
        .filter(|c| c.start_time > now)
        .collect();

    debug!("clist.by returned {} upcoming contests", contests.len());

    retain_valid(PROVIDER, contests)
}

/// Convert raw API data to our model
fn convert_contest(data: ContestData, now: DateTime<Utc>) -> Option<Contest> {
    let Some(site) = site_for_resource(data.resource_id) else {
        debug!(
            "Skipping clist.by contest {} from unmapped resource {}",
            data.id, data.resource_id
        );
        return None;
    };

    let start_time = parse_naive_utc(&data.start)?;
    let end_time = parse_naive_utc(&data.end)?;

    let duration = data.duration.unwrap_or_else(|| {
        u64::try_from((end_time - start_time).num_seconds()).unwrap_or_default()
    });

    Some(Contest {
        name: data.event,
        url: data.href,
        start_time,
        end_time,
        duration,
        site,
        in_24_hours: start_time - now < Duration::hours(24),
        status: ContestStatus::Before,
    })
}

fn parse_naive_utc(value: &str) -> Option<DateTime<Utc>> {
    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            warn!("clist.by: unreadable timestamp '{}': {}", value, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_map_known_resources() {
        let body: ContestListResponse = serde_json::from_value(json!({
            "meta": { "limit": 100, "offset": 0 },
            "objects": [
                {
                    "id": 57_001,
                    "event": "Codeforces Round 1005 (Div. 2)",
                    "href": "https://codeforces.com/contests/2064",
                    "resource": "codeforces.com",
                    "resource_id": 1,
                    "start": "2025-03-01T14:35:00",
                    "end": "2025-03-01T16:35:00",
                    "duration": 7200
                },
                {
                    "id": 57_002,
                    "event": "AtCoder Beginner Contest 395",
                    "href": "https://atcoder.jp/contests/abc395",
                    "resource": "atcoder.jp",
                    "resource_id": 93,
                    "start": "2025-03-02T12:00:00",
                    "end": "2025-03-02T13:40:00"
                },
                {
                    "id": 57_003,
                    "event": "Some Other Judge Cup",
                    "href": "https://example.org/cup",
                    "resource": "example.org",
                    "resource_id": 9999,
                    "start": "2025-03-02T12:00:00",
                    "end": "2025-03-02T13:00:00",
                    "duration": 3600
                }
            ]
        }))
        .unwrap();

        let contests = map_contests(body, now());

        assert_eq!(contests.len(), 2);
        assert_eq!(contests[0].site, Site::Codeforces);
        assert_eq!(contests[0].duration, 7200);
        assert_eq!(
            contests[0].start_time,
            Utc.with_ymd_and_hms(2025, 3, 1, 14, 35, 0).unwrap()
        );
        assert!(contests[0].in_24_hours);

        assert_eq!(contests[1].site, Site::AtCoder);
        assert_eq!(contests[1].duration, 6000);
        assert!(!contests[1].in_24_hours);
    }

    #[test]
    fn test_started_contests_are_dropped() {
        let body: ContestListResponse = serde_json::from_value(json!({
            "objects": [
                {
                    "id": 1,
                    "event": "Already running",
                    "href": "https://leetcode.com/contest/weekly-contest-439",
                    "resource_id": 102,
                    "start": "2025-02-28T23:00:00",
                    "end": "2025-03-01T00:30:00",
                    "duration": 5400
                }
            ]
        }))
        .unwrap();

        assert!(map_contests(body, now()).is_empty());
    }

    #[test]
    fn test_query_params() {
        let client = ClistClient::new(
            Client::new(),
            "https://clist.by/api/v4/",
            None,
            vec![1, 2, 102],
            50,
        );

        let params = client.query_params(now());
        assert_eq!(
            params,
            vec![
                ("resource_id__in", "1,2,102".to_string()),
                ("start__gt", "2025-03-01T00:00:00".to_string()),
                ("order_by", "start".to_string()),
                ("limit", "50".to_string()),
            ]
        );
        assert_eq!(client.base_url, "https://clist.by/api/v4");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_any_request() {
        let client = ClistClient::new(Client::new(), "http://127.0.0.1:9", None, vec![1], 10);

        let err = client.fetch_contests().await.unwrap_err();
        assert!(matches!(err, FetchError::MissingCredentials("clist")));
        assert_eq!(client.failure_policy(), FailurePolicy::Propagate);
    }

    #[test]
    fn test_site_for_resource() {
        assert_eq!(site_for_resource(102), Some(Site::LeetCode));
        assert_eq!(site_for_resource(2), Some(Site::CodeChef));
        assert_eq!(site_for_resource(3), None);
    }
}
