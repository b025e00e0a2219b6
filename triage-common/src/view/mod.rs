//! Review table view pipeline
//!
//! Turns the full review collection plus view parameters into one page of
//! records and the dashboard metrics. Stages always run in this order:
//!
//! 1. time window filter
//! 2. rating set filter
//! 3. critical-only filter
//! 4. sort
//! 5. paginate
//!
//! Metrics are computed over the output of stage 2, so the critical-only
//! toggle narrows the listing without changing the headline numbers.

pub mod metrics;
pub mod pagination;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::review::{Rating, Review};
use crate::Error;

pub use metrics::{compute_metrics, rating_trend, ReviewMetrics};
pub use pagination::{calculate_pagination, Pagination, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Time window selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeWindow {
    #[default]
    #[serde(rename = "all")]
    AllTime,
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::AllTime,
        TimeWindow::Today,
        TimeWindow::Last7Days,
        TimeWindow::Last30Days,
    ];

    /// Inclusive lower bound of the window, `None` for all-time
    ///
    /// "Today" starts at local midnight; the rolling windows start exactly
    /// 7 or 30 days before `now`.
    pub fn start(self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeWindow::AllTime => None,
            TimeWindow::Today => now.date().and_hms_opt(0, 0, 0),
            TimeWindow::Last7Days => Some(now - Duration::days(7)),
            TimeWindow::Last30Days => Some(now - Duration::days(30)),
        }
    }

    pub fn contains(self, timestamp: NaiveDateTime, now: NaiveDateTime) -> bool {
        match self.start(now) {
            Some(start) => timestamp >= start,
            None => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::AllTime => "all",
            TimeWindow::Today => "today",
            TimeWindow::Last7Days => "7d",
            TimeWindow::Last30Days => "30d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeWindow::AllTime => "All Time",
            TimeWindow::Today => "Today",
            TimeWindow::Last7Days => "Last 7 Days",
            TimeWindow::Last30Days => "Last 30 Days",
        }
    }
}

impl FromStr for TimeWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeWindow::ALL
            .into_iter()
            .find(|w| w.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown time window: {}", s)))
    }
}

/// Subset of star ratings to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingSet(u8);

impl RatingSet {
    pub fn all() -> Self {
        RatingSet(0b1_1111)
    }

    pub fn none() -> Self {
        RatingSet(0)
    }

    pub fn insert(&mut self, rating: Rating) {
        self.0 |= 1 << (rating.value() - 1);
    }

    pub fn contains(&self, rating: Rating) -> bool {
        self.0 & (1 << (rating.value() - 1)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_all(&self) -> bool {
        *self == RatingSet::all()
    }

    pub fn iter(&self) -> impl Iterator<Item = Rating> + '_ {
        Rating::ALL.into_iter().filter(|r| self.contains(*r))
    }
}

impl Default for RatingSet {
    fn default() -> Self {
        RatingSet::all()
    }
}

impl FromIterator<Rating> for RatingSet {
    fn from_iter<I: IntoIterator<Item = Rating>>(iter: I) -> Self {
        let mut set = RatingSet::none();
        for rating in iter {
            set.insert(rating);
        }
        set
    }
}

/// Parses a comma list such as `1,2,5`; the empty string is the empty set
impl FromStr for RatingSet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<i64>()
                    .ok()
                    .and_then(|v| Rating::new(v).ok())
                    .ok_or_else(|| Error::InvalidInput(format!("Invalid rating in filter: {}", part)))
            })
            .collect()
    }
}

impl fmt::Display for RatingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Listing order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    RatingDesc,
    RatingAsc,
    PendingFirst,
}

impl SortKey {
    pub const ALL: [SortKey; 5] = [
        SortKey::Newest,
        SortKey::Oldest,
        SortKey::RatingDesc,
        SortKey::RatingAsc,
        SortKey::PendingFirst,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::RatingDesc => "rating_desc",
            SortKey::RatingAsc => "rating_asc",
            SortKey::PendingFirst => "pending_first",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::Newest => "Most Recent",
            SortKey::Oldest => "Oldest First",
            SortKey::RatingDesc => "Highest Rating",
            SortKey::RatingAsc => "Lowest Rating",
            SortKey::PendingFirst => "Pending First",
        }
    }

    /// Total order for this key
    ///
    /// Ties on the primary key fall back to newest-first, then to row
    /// identity so that equal timestamps still order deterministically.
    fn compare(self, a: &Review, b: &Review) -> Ordering {
        let newest_first = || b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id));
        match self {
            SortKey::Newest => newest_first(),
            SortKey::Oldest => a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)),
            SortKey::RatingDesc => b.rating.cmp(&a.rating).then_with(newest_first),
            SortKey::RatingAsc => a.rating.cmp(&b.rating).then_with(newest_first),
            SortKey::PendingFirst => b.is_pending().cmp(&a.is_pending()).then_with(newest_first),
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| Error::InvalidInput(format!("Unknown sort key: {}", s)))
    }
}

/// Everything that selects what the review listing shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewParams {
    pub window: TimeWindow,
    pub ratings: RatingSet,
    pub critical_only: bool,
    pub sort: SortKey,
    pub page_size: usize,
    pub page: usize,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            window: TimeWindow::AllTime,
            ratings: RatingSet::all(),
            critical_only: false,
            sort: SortKey::Newest,
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
        }
    }
}

/// One rendered page of the listing plus metrics
#[derive(Debug, Clone, Serialize)]
pub struct ReviewView {
    pub records: Vec<Review>,
    pub page: usize,
    pub page_size: usize,
    pub total_matching: usize,
    pub total_pages: usize,
    pub metrics: ReviewMetrics,
}

impl ReviewView {
    pub fn pagination(&self) -> Pagination {
        calculate_pagination(self.total_matching, self.page_size, self.page)
    }
}

/// Stages 1 and 2: time window and rating set
fn window_and_ratings(reviews: Vec<Review>, params: &ViewParams, now: NaiveDateTime) -> Vec<Review> {
    reviews
        .into_iter()
        .filter(|r| params.window.contains(r.timestamp, now))
        .filter(|r| params.ratings.contains(r.rating))
        .collect()
}

/// Stages 3 and 4: critical-only filter, then sort
fn critical_and_sort(mut reviews: Vec<Review>, params: &ViewParams) -> Vec<Review> {
    if params.critical_only {
        reviews.retain(|r| r.rating.is_critical());
    }
    reviews.sort_by(|a, b| params.sort.compare(a, b));
    reviews
}

/// All matching reviews in display order (every page), as used for export
pub fn select_reviews(reviews: Vec<Review>, params: &ViewParams, now: NaiveDateTime) -> Vec<Review> {
    critical_and_sort(window_and_ratings(reviews, params, now), params)
}

/// Run the full pipeline
pub fn build_view(reviews: Vec<Review>, params: &ViewParams, now: NaiveDateTime) -> ReviewView {
    let in_scope = window_and_ratings(reviews, params, now);
    let metrics = compute_metrics(&in_scope);

    let mut matching = critical_and_sort(in_scope, params);
    let total_matching = matching.len();
    let p = calculate_pagination(total_matching, params.page_size, params.page);
    let range = p.range(total_matching);

    matching.truncate(range.end);
    let records = matching.split_off(range.start);

    ReviewView {
        records,
        page: p.page,
        page_size: p.page_size,
        total_matching,
        total_pages: p.total_pages,
        metrics,
    }
}
