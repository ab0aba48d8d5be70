use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upcoming contest, normalized across all platforms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    /// Contest title as shown by the platform
    pub name: String,

    /// Link to the contest page
    pub url: String,

    /// Start instant
    pub start_time: DateTime<Utc>,

    /// End instant (always after start_time)
    pub end_time: DateTime<Utc>,

    /// Length in seconds
    pub duration: u64,

    /// Platform the contest is hosted on
    pub site: Site,

    /// Whether the contest starts within a day of fetch time
    pub in_24_hours: bool,

    /// Phase at fetch time
    pub status: ContestStatus,
}

/// Contest platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Site {
    LeetCode,
    Codeforces,
    CodeChef,
    AtCoder,
}

/// Contest phase. Only not-yet-started contests make it into the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContestStatus {
    #[default]
    #[serde(rename = "BEFORE")]
    Before,
}

/// Reason a mapped contest was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidContest {
    EmptyName,
    EmptyUrl,
    EndNotAfterStart,
}

impl fmt::Display for InvalidContest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidContest::EmptyName => write!(f, "empty name"),
            InvalidContest::EmptyUrl => write!(f, "empty url"),
            InvalidContest::EndNotAfterStart => write!(f, "end time is not after start time"),
        }
    }
}

impl Contest {
    /// Check the record invariants
    pub fn check(&self) -> Result<(), InvalidContest> {
        if self.name.trim().is_empty() {
            return Err(InvalidContest::EmptyName);
        }
        if self.url.trim().is_empty() {
            return Err(InvalidContest::EmptyUrl);
        }
        if self.end_time <= self.start_time {
            return Err(InvalidContest::EndNotAfterStart);
        }
        Ok(())
    }

    /// Key used to identify the contest in a rendered list.
    ///
    /// Built from site, name and position, so a rename or reorder upstream
    /// yields a different key for the same contest.
    pub fn list_key(&self, index: usize) -> String {
        format!("{}-{}-{}", self.site, self.name, index)
    }

    /// Human readable duration, e.g. "2h 30m", "3h" or "45m"
    pub fn duration_label(&self) -> String {
        let hours = self.duration / 3600;
        let minutes = (self.duration % 3600) / 60;

        if hours > 0 && minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else if hours > 0 {
            format!("{}h", hours)
        } else {
            format!("{}m", minutes)
        }
    }
}

impl Site {
    pub const ALL: [Site; 4] = [Site::LeetCode, Site::Codeforces, Site::CodeChef, Site::AtCoder];

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::LeetCode => "LeetCode",
            Site::Codeforces => "Codeforces",
            Site::CodeChef => "CodeChef",
            Site::AtCoder => "AtCoder",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Site::ALL
            .into_iter()
            .find(|site| site.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown site: {}", s))
    }
}

/// Platform selection applied to a feed snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SiteFilter {
    #[default]
    All,
    Only(Site),
}

impl SiteFilter {
    pub fn matches(&self, contest: &Contest) -> bool {
        match self {
            SiteFilter::All => true,
            SiteFilter::Only(site) => contest.site == *site,
        }
    }
}

impl FromStr for SiteFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(SiteFilter::All);
        }
        s.parse().map(SiteFilter::Only)
    }
}
