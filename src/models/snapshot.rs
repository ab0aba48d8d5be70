use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::models::{Contest, SiteFilter};

/// Immutable view of the aggregated feed at one point in time
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    /// Upcoming contests sorted by start time
    pub contests: Arc<Vec<Contest>>,

    /// No data yet and the first requests are still outstanding
    pub is_loading: bool,

    /// A manual refresh is in progress
    pub is_refetching: bool,

    /// Failure of a source whose errors are shown to the user
    pub error: Option<Arc<FetchError>>,

    /// Completion time of the last full fetch cycle
    pub fetched_at: Option<DateTime<Utc>>,
}

impl FeedSnapshot {
    /// Contests matching the filter, in feed order
    pub fn filtered(&self, filter: SiteFilter) -> Vec<&Contest> {
        self.contests.iter().filter(|c| filter.matches(c)).collect()
    }

    /// Loaded successfully but nothing is scheduled
    pub fn is_empty(&self) -> bool {
        !self.is_loading && self.error.is_none() && self.contests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContestStatus, Site};
    use chrono::{Duration, TimeZone};

    fn contest(name: &str, site: Site, offset_hours: i64) -> Contest {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
            + Duration::hours(offset_hours);
        Contest {
            name: name.to_string(),
            url: format!("https://example.com/{}", name),
            start_time: start,
            end_time: start + Duration::hours(2),
            duration: 7200,
            site,
            in_24_hours: false,
            status: ContestStatus::Before,
        }
    }

    #[test]
    fn test_filtered_keeps_feed_order() {
        let snapshot = FeedSnapshot {
            contests: Arc::new(vec![
                contest("a", Site::Codeforces, 1),
                contest("b", Site::LeetCode, 2),
                contest("c", Site::Codeforces, 3),
            ]),
            ..Default::default()
        };

        let names: Vec<_> = snapshot
            .filtered(SiteFilter::Only(Site::Codeforces))
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(snapshot.filtered(SiteFilter::All).len(), 3);
    }

    #[test]
    fn test_empty_is_distinct_from_failed() {
        let empty = FeedSnapshot::default();
        assert!(empty.is_empty());

        let failed = FeedSnapshot {
            error: Some(Arc::new(FetchError::MissingCredentials("clist"))),
            ..Default::default()
        };
        assert!(!failed.is_empty());
    }
}
