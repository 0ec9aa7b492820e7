//! Listing filters parsed from query parameters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nimbus_core::error::AppError;
use nimbus_entity::node::TypeCategory;

/// Relative window on `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifiedFilter {
    Today,
    Last7Days,
    Last30Days,
    ThisYear,
    LastYear,
}

fn year_start(year: i32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

impl ModifiedFilter {
    /// `[from, before)` bounds of the window relative to `now` (UTC).
    pub fn bounds(&self, now: DateTime<Utc>) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match self {
            Self::Today => {
                let start = now.date_naive().and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
                (start, start.map(|s| s + Duration::days(1)))
            }
            Self::Last7Days => (Some(now - Duration::days(7)), None),
            Self::Last30Days => (Some(now - Duration::days(30)), None),
            Self::ThisYear => (year_start(now.year()), None),
            Self::LastYear => (year_start(now.year() - 1), year_start(now.year())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Last7Days => "last7days",
            Self::Last30Days => "last30days",
            Self::ThisYear => "thisyear",
            Self::LastYear => "lastyear",
        }
    }
}

impl fmt::Display for ModifiedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModifiedFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "last7days" => Ok(Self::Last7Days),
            "last30days" => Ok(Self::Last30Days),
            "thisyear" => Ok(Self::ThisYear),
            "lastyear" => Ok(Self::LastYear),
            _ => Err(AppError::validation(format!("Invalid modified filter: '{s}'"))),
        }
    }
}

/// What a folder listing should return.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    /// Folder to list (None = root).
    pub parent_id: Option<Uuid>,
    pub category: Option<TypeCategory>,
    pub modified: Option<ModifiedFilter>,
    /// Include the whole live subtree.
    pub recursive: bool,
}

impl ListQuery {
    /// Build from raw query values; empty strings and `all` mean no filter.
    pub fn parse(
        parent_id: Option<Uuid>,
        category: Option<&str>,
        modified: Option<&str>,
        recursive: bool,
    ) -> Result<Self, AppError> {
        fn meaningful(value: Option<&str>) -> Option<&str> {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        }

        Ok(Self {
            parent_id,
            category: meaningful(category).map(str::parse).transpose()?,
            modified: meaningful(modified).map(str::parse).transpose()?,
            recursive,
        })
    }
}
