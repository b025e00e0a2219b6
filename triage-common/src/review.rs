//! Review records and submission validation

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::time;

/// Minimum number of non-whitespace characters in a review body
pub const MIN_REVIEW_CHARS: usize = 10;

/// Maximum review body length in characters
pub const MAX_REVIEW_CHARS: usize = 5000;

/// Rating assigned to persisted rows whose rating cannot be read
pub const DEFAULT_RATING: u8 = 3;

/// Submission validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Rating must be between 1 and 5 (got {0})")]
    InvalidRating(i64),

    #[error("Please write a review with at least {MIN_REVIEW_CHARS} characters")]
    ReviewTooShort,

    #[error("Review is too long (maximum {MAX_REVIEW_CHARS} characters)")]
    ReviewTooLong,
}

/// Star rating, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const ALL: [Rating; 5] = [Rating(1), Rating(2), Rating(3), Rating(4), Rating(5)];

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (1..=5).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(ValidationError::InvalidRating(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Rating ≤ 2
    pub fn is_critical(self) -> bool {
        self.0 <= 2
    }

    pub fn sentiment(self) -> Sentiment {
        match self.0 {
            1 | 2 => Sentiment::Negative,
            3 => Sentiment::Neutral,
            _ => Sentiment::Positive,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self.0 {
            1 => "😞",
            2 => "😕",
            3 => "😐",
            4 => "😊",
            _ => "🤩",
        }
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Poor",
            2 => "Fair",
            3 => "Average",
            4 => "Good",
            _ => "Excellent",
        }
    }

    /// Coerce a persisted rating cell, falling back to [`DEFAULT_RATING`]
    ///
    /// Accepts integer text and integer-valued decimals ("4.0").
    pub fn coerce(raw: &str) -> Rating {
        let raw = raw.trim();
        let parsed = raw.parse::<i64>().ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.fract() == 0.0 && v.is_finite())
                .map(|v| v as i64)
        });

        parsed
            .and_then(|v| Rating::new(v).ok())
            .unwrap_or(Rating(DEFAULT_RATING))
    }
}

impl TryFrom<i64> for Rating {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> u8 {
        rating.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rating tier used for fallback text and presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    pub fn color(self) -> &'static str {
        match self {
            Sentiment::Negative => "#ff4444",
            Sentiment::Neutral => "#ffaa00",
            Sentiment::Positive => "#44ff44",
        }
    }
}

/// Stable identity of a row in the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store columns, in persisted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Timestamp,
    Rating,
    Review,
    AiResponse,
    AiSummary,
    RecommendedActions,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Timestamp,
        Column::Rating,
        Column::Review,
        Column::AiResponse,
        Column::AiSummary,
        Column::RecommendedActions,
    ];

    pub const ENRICHMENT: [Column; 3] =
        [Column::AiResponse, Column::AiSummary, Column::RecommendedActions];

    pub fn name(self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::Rating => "rating",
            Column::Review => "review",
            Column::AiResponse => "ai_response",
            Column::AiSummary => "ai_summary",
            Column::RecommendedActions => "recommended_actions",
        }
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Column::ALL.into_iter().find(|c| c.name() == name.trim())
    }
}

/// The three enrichment fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub ai_response: String,
    pub ai_summary: String,
    pub recommended_actions: String,
}

impl Enrichment {
    /// No field populated
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, v)| v.trim().is_empty())
    }

    /// Every field populated
    pub fn is_complete(&self) -> bool {
        self.fields().iter().all(|(_, v)| !v.trim().is_empty())
    }

    pub fn fields(&self) -> [(Column, &str); 3] {
        [
            (Column::AiResponse, self.ai_response.as_str()),
            (Column::AiSummary, self.ai_summary.as_str()),
            (Column::RecommendedActions, self.recommended_actions.as_str()),
        ]
    }
}

/// A stored review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: RowId,
    pub timestamp: NaiveDateTime,
    pub rating: Rating,
    pub review: String,
    pub ai_response: String,
    pub ai_summary: String,
    pub recommended_actions: String,
}

impl Review {
    /// Build a review from a persisted row, coercing malformed cells
    pub fn from_raw(id: RowId, raw: &RawRow) -> Review {
        Review {
            id,
            timestamp: time::parse_timestamp(&raw.timestamp).unwrap_or_else(time::fallback_timestamp),
            rating: Rating::coerce(&raw.rating),
            review: raw.review.clone(),
            ai_response: raw.ai_response.clone(),
            ai_summary: raw.ai_summary.clone(),
            recommended_actions: raw.recommended_actions.clone(),
        }
    }

    /// All three enrichment fields empty
    pub fn is_pending(&self) -> bool {
        self.enrichment().is_empty()
    }

    pub fn enrichment(&self) -> Enrichment {
        Enrichment {
            ai_response: self.ai_response.clone(),
            ai_summary: self.ai_summary.clone(),
            recommended_actions: self.recommended_actions.clone(),
        }
    }
}

/// A validated submission, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub timestamp: NaiveDateTime,
    pub rating: Rating,
    pub review: String,
}

impl NewReview {
    /// Validate a customer submission
    ///
    /// Fails fast: rating first, then body length.
    pub fn validate(rating: i64, review: &str, timestamp: NaiveDateTime) -> Result<NewReview, ValidationError> {
        let rating = Rating::new(rating)?;
        let body = review.trim();

        if body.chars().filter(|c| !c.is_whitespace()).count() < MIN_REVIEW_CHARS {
            return Err(ValidationError::ReviewTooShort);
        }
        if body.chars().count() > MAX_REVIEW_CHARS {
            return Err(ValidationError::ReviewTooLong);
        }

        Ok(NewReview {
            timestamp,
            rating,
            review: body.to_string(),
        })
    }

    pub fn to_raw(&self) -> RawRow {
        RawRow {
            timestamp: time::format_timestamp(&self.timestamp),
            rating: self.rating.to_string(),
            review: self.review.clone(),
            ..RawRow::default()
        }
    }
}

/// A row as persisted: every cell is text, any may be missing or malformed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub review: String,
    #[serde(default)]
    pub ai_response: String,
    #[serde(default)]
    pub ai_summary: String,
    #[serde(default)]
    pub recommended_actions: String,
}

impl RawRow {
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::Timestamp => &self.timestamp,
            Column::Rating => &self.rating,
            Column::Review => &self.review,
            Column::AiResponse => &self.ai_response,
            Column::AiSummary => &self.ai_summary,
            Column::RecommendedActions => &self.recommended_actions,
        }
    }

    pub fn set(&mut self, column: Column, value: String) {
        match column {
            Column::Timestamp => self.timestamp = value,
            Column::Rating => self.rating = value,
            Column::Review => self.review = value,
            Column::AiResponse => self.ai_response = value,
            Column::AiSummary => self.ai_summary = value,
            Column::RecommendedActions => self.recommended_actions = value,
        }
    }

    pub fn is_pending(&self) -> bool {
        Column::ENRICHMENT.iter().all(|c| self.get(*c).trim().is_empty())
    }
}

impl From<&Review> for RawRow {
    fn from(review: &Review) -> RawRow {
        RawRow {
            timestamp: time::format_timestamp(&review.timestamp),
            rating: review.rating.to_string(),
            review: review.review.clone(),
            ai_response: review.ai_response.clone(),
            ai_summary: review.ai_summary.clone(),
            recommended_actions: review.recommended_actions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> NaiveDateTime {
        time::parse_timestamp("2024-05-01 10:00:00").unwrap()
    }

    #[test]
    fn test_rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(5).unwrap().value(), 5);
        assert_eq!(Rating::new(-1), Err(ValidationError::InvalidRating(-1)));
    }

    #[test]
    fn test_rating_coercion() {
        assert_eq!(Rating::coerce("4").value(), 4);
        assert_eq!(Rating::coerce(" 2 ").value(), 2);
        assert_eq!(Rating::coerce("4.0").value(), 4);
        assert_eq!(Rating::coerce("4.5").value(), DEFAULT_RATING);
        assert_eq!(Rating::coerce("").value(), DEFAULT_RATING);
        assert_eq!(Rating::coerce("five").value(), DEFAULT_RATING);
        assert_eq!(Rating::coerce("9").value(), DEFAULT_RATING);
    }

    #[test]
    fn test_sentiment_tiers() {
        assert_eq!(Rating::new(1).unwrap().sentiment(), Sentiment::Negative);
        assert_eq!(Rating::new(2).unwrap().sentiment(), Sentiment::Negative);
        assert_eq!(Rating::new(3).unwrap().sentiment(), Sentiment::Neutral);
        assert_eq!(Rating::new(4).unwrap().sentiment(), Sentiment::Positive);
        assert_eq!(Rating::new(5).unwrap().sentiment(), Sentiment::Positive);
    }

    #[test]
    fn test_rating_serde() {
        let r: Rating = serde_json::from_str("4").unwrap();
        assert_eq!(r.value(), 4);
        assert!(serde_json::from_str::<Rating>("7").is_err());
        assert_eq!(serde_json::to_string(&r).unwrap(), "4");
    }

    #[test]
    fn test_validate_counts_non_whitespace() {
        // 9 visible characters padded with spaces
        let err = NewReview::validate(4, "  a b c d e f g h i  ", ts()).unwrap_err();
        assert_eq!(err, ValidationError::ReviewTooShort);

        let ok = NewReview::validate(4, "  Great service!  ", ts()).unwrap();
        assert_eq!(ok.review, "Great service!");
    }

    #[test]
    fn test_validate_rating_checked_first() {
        let err = NewReview::validate(9, "", ts()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidRating(9));
    }

    #[test]
    fn test_validate_too_long() {
        let long = "x".repeat(MAX_REVIEW_CHARS + 1);
        assert_eq!(
            NewReview::validate(3, &long, ts()).unwrap_err(),
            ValidationError::ReviewTooLong
        );
    }

    #[test]
    fn test_from_raw_coerces_defaults() {
        let raw = RawRow {
            timestamp: "not a time".into(),
            rating: "abc".into(),
            review: "Fine".into(),
            ..RawRow::default()
        };
        let review = Review::from_raw(RowId(7), &raw);
        assert_eq!(review.id, RowId(7));
        assert_eq!(review.rating.value(), DEFAULT_RATING);
        assert_eq!(review.timestamp, time::fallback_timestamp());
        assert!(review.is_pending());
    }

    #[test]
    fn test_pending_is_all_or_nothing() {
        let mut raw = NewReview::validate(2, "Late delivery again.", ts()).unwrap().to_raw();
        assert!(raw.is_pending());
        raw.set(Column::AiSummary, "Late delivery".into());
        assert!(!raw.is_pending());
        let review = Review::from_raw(RowId(0), &raw);
        assert!(!review.is_pending());
        assert!(!review.enrichment().is_complete());
    }

    #[test]
    fn test_whitespace_enrichment_counts_as_empty() {
        let raw = RawRow {
            ai_response: "   ".into(),
            ..RawRow::default()
        };
        assert!(raw.is_pending());
    }

    #[test]
    fn test_column_names() {
        assert_eq!(Column::from_name("ai_summary"), Some(Column::AiSummary));
        assert_eq!(Column::from_name("unknown"), None);
        let names: Vec<_> = Column::ALL.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            ["timestamp", "rating", "review", "ai_response", "ai_summary", "recommended_actions"]
        );
    }
}
