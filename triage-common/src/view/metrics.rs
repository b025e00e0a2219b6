//! Summary metrics over a set of reviews

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::review::{Rating, Review};

/// Count of reviews for one star value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RatingCount {
    pub rating: u8,
    pub count: usize,
}

/// Count of reviews submitted on one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: usize,
}

/// Dashboard metrics
///
/// `average_rating` and `trend` are `None` where undefined (empty set, or
/// fewer than two reviews for the trend).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewMetrics {
    pub total: usize,
    pub average_rating: Option<f64>,
    pub critical: usize,
    pub neutral: usize,
    pub positive: usize,
    pub critical_pct: f64,
    pub neutral_pct: f64,
    pub positive_pct: f64,
    pub trend: Option<f64>,
    pub pending: usize,
    pub distribution: Vec<RatingCount>,
    pub daily: Vec<DailyCount>,
}

impl ReviewMetrics {
    /// Trend formatted with an explicit sign, or "N/A"
    pub fn trend_label(&self) -> String {
        match self.trend {
            Some(t) => format!("{:+.2}", t),
            None => "N/A".to_string(),
        }
    }

    pub fn average_label(&self) -> String {
        match self.average_rating {
            Some(avg) => format!("{:.2}", avg),
            None => "N/A".to_string(),
        }
    }
}

/// Compute metrics over `reviews` (order irrelevant)
pub fn compute_metrics(reviews: &[Review]) -> ReviewMetrics {
    let total = reviews.len();
    let critical = reviews.iter().filter(|r| r.rating.value() <= 2).count();
    let neutral = reviews.iter().filter(|r| r.rating.value() == 3).count();
    let positive = reviews.iter().filter(|r| r.rating.value() >= 4).count();
    let pending = reviews.iter().filter(|r| r.is_pending()).count();

    let distribution = Rating::ALL
        .iter()
        .map(|star| RatingCount {
            rating: star.value(),
            count: reviews.iter().filter(|r| r.rating == *star).count(),
        })
        .collect();

    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for review in reviews {
        *per_day.entry(review.timestamp.date()).or_default() += 1;
    }
    let daily = per_day
        .into_iter()
        .map(|(date, count)| DailyCount { date, count })
        .collect();

    ReviewMetrics {
        total,
        average_rating: mean_rating(reviews.iter()),
        critical,
        neutral,
        positive,
        critical_pct: percentage(critical, total),
        neutral_pct: percentage(neutral, total),
        positive_pct: percentage(positive, total),
        trend: rating_trend(reviews),
        pending,
        distribution,
        daily,
    }
}

/// Mean rating of the later half minus the earlier half
///
/// Reviews are ordered by time (ascending) and split at floor(n/2), so the
/// later half holds ceil(n/2) reviews. Undefined for n ≤ 1.
pub fn rating_trend(reviews: &[Review]) -> Option<f64> {
    if reviews.len() <= 1 {
        return None;
    }

    let mut chronological: Vec<&Review> = reviews.iter().collect();
    chronological.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));

    let split = chronological.len() / 2;
    let (earlier, later) = chronological.split_at(split);

    let recent = mean_rating(later.iter().copied())?;
    let older = mean_rating(earlier.iter().copied())?;
    Some(recent - older)
}

fn mean_rating<'a>(reviews: impl Iterator<Item = &'a Review>) -> Option<f64> {
    let (sum, count) = reviews.fold((0u64, 0usize), |(sum, count), r| {
        (sum + u64::from(r.rating.value()), count + 1)
    });
    if count == 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::RowId;
    use crate::time::parse_timestamp;

    fn review(id: u64, ts: &str, rating: i64) -> Review {
        Review {
            id: RowId(id),
            timestamp: parse_timestamp(ts).unwrap(),
            rating: Rating::new(rating).unwrap(),
            review: format!("review number {}", id),
            ai_response: String::new(),
            ai_summary: String::new(),
            recommended_actions: String::new(),
        }
    }

    #[test]
    fn test_empty_metrics() {
        let m = compute_metrics(&[]);
        assert_eq!(m.total, 0);
        assert_eq!(m.average_rating, None);
        assert_eq!(m.trend, None);
        assert_eq!((m.critical, m.neutral, m.positive, m.pending), (0, 0, 0, 0));
        assert_eq!(m.critical_pct, 0.0);
        assert!(m.daily.is_empty());
        assert_eq!(m.trend_label(), "N/A");
        assert_eq!(m.average_label(), "N/A");
    }

    #[test]
    fn test_counts_and_percentages() {
        let reviews = vec![
            review(0, "2024-01-01 10:00:00", 1),
            review(1, "2024-01-01 11:00:00", 3),
            review(2, "2024-01-02 10:00:00", 4),
            review(3, "2024-01-03 10:00:00", 5),
        ];
        let m = compute_metrics(&reviews);
        assert_eq!(m.total, 4);
        assert_eq!(m.average_rating, Some(3.25));
        assert_eq!((m.critical, m.neutral, m.positive), (1, 1, 2));
        assert_eq!(m.critical_pct, 25.0);
        assert_eq!(m.positive_pct, 50.0);
        assert_eq!(m.pending, 4);
        assert_eq!(m.distribution[0], RatingCount { rating: 1, count: 1 });
        assert_eq!(m.distribution[1], RatingCount { rating: 2, count: 0 });
        assert_eq!(m.daily.len(), 3);
        assert_eq!(m.daily[0].count, 2);
    }

    #[test]
    fn test_trend_single_review_undefined() {
        assert_eq!(rating_trend(&[review(0, "2024-01-01 10:00:00", 5)]), None);
    }

    #[test]
    fn test_trend_uses_time_order_not_input_order() {
        // Earlier reviews were poor, later reviews good: positive trend
        let reviews = vec![
            review(3, "2024-01-04 10:00:00", 5),
            review(0, "2024-01-01 10:00:00", 1),
            review(2, "2024-01-03 10:00:00", 5),
            review(1, "2024-01-02 10:00:00", 2),
        ];
        assert_eq!(rating_trend(&reviews), Some(5.0 - 1.5));
    }

    #[test]
    fn test_trend_odd_count_later_half_is_larger() {
        // n = 3: earlier = [1], later = [3, 5]
        let reviews = vec![
            review(0, "2024-01-01 10:00:00", 1),
            review(1, "2024-01-02 10:00:00", 3),
            review(2, "2024-01-03 10:00:00", 5),
        ];
        assert_eq!(rating_trend(&reviews), Some(4.0 - 1.0));
    }

    #[test]
    fn test_trend_flat_is_zero() {
        let reviews: Vec<_> = (0..7)
            .map(|i| review(i, &format!("2024-01-0{} 10:00:00", i + 1), 4))
            .collect();
        assert_eq!(rating_trend(&reviews), Some(0.0));
        assert_eq!(compute_metrics(&reviews).trend_label(), "+0.00");
    }
}
