//! Review enrichment
//!
//! Every pending review receives three fields: a customer-facing reply, a
//! one-sentence summary and recommended actions. Each field is requested from
//! the configured [`TextGenerator`]; when generation fails the field is filled
//! with canned text chosen by rating tier, so a processed review is never left
//! half-enriched. [`EnrichmentOutcome`] records which fields were generated.

pub mod batch;
pub mod gemini;

pub use batch::{BatchOptions, BatchProcessor, BatchSummary};
pub use gemini::{GeminiClient, GeminiSettings, GenerationError, TextGenerator};

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use triage_common::review::{Enrichment, Rating, Review, RowId, Sentiment};
use triage_common::store::FieldUpdate;
use triage_common::{Error, Result, ReviewStore};

/// Characters of the review quoted in the fallback summary
const SUMMARY_EXCERPT_CHARS: usize = 50;

/// Which enrichment field to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentTask {
    CustomerReply,
    Summary,
    RecommendedActions,
}

impl EnrichmentTask {
    pub const ALL: [EnrichmentTask; 3] = [
        EnrichmentTask::CustomerReply,
        EnrichmentTask::Summary,
        EnrichmentTask::RecommendedActions,
    ];

    pub fn prompt(self, rating: Rating, review: &str) -> String {
        match self {
            EnrichmentTask::CustomerReply => format!(
                "You are a customer service assistant. A customer has left the following review:\n\n\
                 Rating: {rating} stars\n\
                 Review: {review}\n\n\
                 Generate a warm, empathetic, and professional response that:\n\
                 1. Thanks them for their feedback\n\
                 2. Addresses their specific concerns or praise\n\
                 3. Is brief (2-3 sentences maximum)\n\
                 4. Matches the tone to their rating (apologetic for low ratings, grateful for high ratings)\n\n\
                 Response:"
            ),
            EnrichmentTask::Summary => format!(
                "Summarize this customer review in ONE brief sentence (max 15 words):\n\n\
                 Rating: {rating} stars\n\
                 Review: {review}\n\n\
                 Summary:"
            ),
            EnrichmentTask::RecommendedActions => format!(
                "Based on this customer review, suggest 2-3 specific, actionable next steps for the business:\n\n\
                 Rating: {rating} stars\n\
                 Review: {review}\n\n\
                 Provide recommendations as a brief bulleted list. Be specific and practical.\n\n\
                 Recommendations:"
            ),
        }
    }

    /// Canned text used when generation fails; never empty
    pub fn fallback(self, rating: Rating, review: &str) -> String {
        let tier = rating.sentiment();
        match self {
            EnrichmentTask::CustomerReply => match tier {
                Sentiment::Negative => format!(
                    "Thank you for your {}-star review. We're sorry your experience fell short, \
                     and we will look into what went wrong.",
                    rating
                ),
                Sentiment::Neutral => format!(
                    "Thank you for your {}-star review. We appreciate your feedback and will use it \
                     to improve our service.",
                    rating
                ),
                Sentiment::Positive => format!(
                    "Thank you for your {}-star review! We're delighted you enjoyed your experience.",
                    rating
                ),
            },
            EnrichmentTask::Summary => {
                let excerpt: String = review.trim().chars().take(SUMMARY_EXCERPT_CHARS).collect();
                format!("{}-star review: {}...", rating, excerpt)
            }
            EnrichmentTask::RecommendedActions => {
                let actions = match tier {
                    Sentiment::Negative => {
                        "• Contact customer immediately\n• Investigate issue\n• Offer compensation"
                    }
                    Sentiment::Neutral => {
                        "• Follow up with customer\n• Identify improvement areas\n• Monitor similar feedback"
                    }
                    Sentiment::Positive => {
                        "• Thank customer\n• Share positive feedback with team\n• Encourage public review"
                    }
                };
                actions.to_string()
            }
        }
    }
}

/// Where a field's text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Generated,
    Fallback,
}

/// Result of enriching one review
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentOutcome {
    pub enrichment: Enrichment,
    pub response_source: FieldSource,
    pub summary_source: FieldSource,
    pub actions_source: FieldSource,
}

impl EnrichmentOutcome {
    pub fn used_fallback(&self) -> bool {
        self.sources().contains(&FieldSource::Fallback)
    }

    pub fn fully_generated(&self) -> bool {
        !self.used_fallback()
    }

    fn sources(&self) -> [FieldSource; 3] {
        [self.response_source, self.summary_source, self.actions_source]
    }
}

/// A review written back with its enrichment
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedReview {
    pub review: Review,
    pub outcome: EnrichmentOutcome,
}

/// Produces enrichment text from a [`TextGenerator`] with fallback
pub struct Enricher {
    generator: Arc<dyn TextGenerator>,
}

impl Enricher {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// One field; falls back on any generation error
    pub async fn generate(&self, task: EnrichmentTask, rating: Rating, review: &str) -> (String, FieldSource) {
        match self.generator.generate(&task.prompt(rating, review)).await {
            Ok(text) if !text.trim().is_empty() => (text.trim().to_string(), FieldSource::Generated),
            Ok(_) => {
                warn!(?task, "Generator returned empty text; using fallback");
                (task.fallback(rating, review), FieldSource::Fallback)
            }
            Err(e) => {
                warn!(?task, error = %e, "Generation failed; using fallback");
                (task.fallback(rating, review), FieldSource::Fallback)
            }
        }
    }

    /// All three fields for one review
    pub async fn enrich(&self, rating: Rating, review: &str) -> EnrichmentOutcome {
        let (ai_response, response_source) = self.generate(EnrichmentTask::CustomerReply, rating, review).await;
        let (ai_summary, summary_source) = self.generate(EnrichmentTask::Summary, rating, review).await;
        let (recommended_actions, actions_source) =
            self.generate(EnrichmentTask::RecommendedActions, rating, review).await;

        EnrichmentOutcome {
            enrichment: Enrichment {
                ai_response,
                ai_summary,
                recommended_actions,
            },
            response_source,
            summary_source,
            actions_source,
        }
    }

    /// Enrich an already-loaded review and write all three fields in one update
    ///
    /// The write is guarded: if another writer enriched the row in the
    /// meantime the store returns [`Error::Conflict`] and nothing changes.
    pub async fn enrich_review(&self, store: &dyn ReviewStore, review: &Review) -> Result<EnrichedReview> {
        if !review.is_pending() {
            return Err(Error::Conflict(format!("Review {} is already enriched", review.id)));
        }

        let outcome = self.enrich(review.rating, &review.review).await;
        let stored = store
            .update_fields(review.id, &FieldUpdate::enrichment(&outcome.enrichment))
            .await?;

        debug!(
            row = review.id.0,
            fallback = outcome.used_fallback(),
            "Enrichment written"
        );

        Ok(EnrichedReview {
            review: stored,
            outcome,
        })
    }

    /// Load one row by identity and enrich it
    pub async fn enrich_row(&self, store: &dyn ReviewStore, id: RowId) -> Result<EnrichedReview> {
        let review = store.get(id).await?;
        self.enrich_review(store, &review).await
    }
}
