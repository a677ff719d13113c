use crate::error::ApiError;
use crate::metrics::EVALUATIONS_TOTAL;
use crate::models::{EvaluationResult, RubricScores, SubmitEvaluationRequest};
use crate::utils::retry::{retry_async, RetryConfig};
use anyhow::{Context, Result};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, ReplaceOptions, ReturnDocument};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const EVALUATIONS_COLLECTION: &str = "evaluation_results";
pub const COUNTERS_COLLECTION: &str = "counters";
pub const EVALUATION_COUNTER: &str = "evaluation_number";

/// Task 2 carries twice the weight of task 1 in the overall band.
const TASK1_WEIGHT: f64 = 0.33;
const TASK2_WEIGHT: f64 = 0.67;

#[derive(Debug, Serialize, Deserialize)]
struct Counter {
    #[serde(rename = "_id")]
    id: String,
    value: i64,
}

/// Round half-up to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-slot band: arithmetic mean of the four rubric criteria.
pub fn slot_band(scores: &RubricScores) -> f64 {
    let sum: f64 = scores.as_array().iter().sum();
    round2(sum / 4.0)
}

pub fn weighted_band(band_task1: f64, band_task2: f64) -> f64 {
    round2(TASK1_WEIGHT * band_task1 + TASK2_WEIGHT * band_task2)
}

/// Sub-scores move in half-band steps on the 0-9 scale. Off-step input is
/// rejected with the offending criterion named, never clamped.
fn check_half_steps(label: &str, scores: &RubricScores) -> Result<(), ApiError> {
    let criteria = [
        ("task_response", scores.task_response),
        ("coherence_cohesion", scores.coherence_cohesion),
        ("lexical_resource", scores.lexical_resource),
        (
            "grammatical_range_accuracy",
            scores.grammatical_range_accuracy,
        ),
    ];

    for (criterion, value) in criteria {
        if ((value * 2.0) - (value * 2.0).round()).abs() > 1e-9 {
            return Err(ApiError::Validation(format!(
                "{}.{} must be a multiple of 0.5, got {}",
                label, criterion, value
            )));
        }
    }
    Ok(())
}

/// The only constructor for an evaluation outcome: both slot bands and the
/// weighted total are derived together from the current sub-scores.
pub fn recompute(
    answer_id: String,
    user_id: String,
    sequence_number: i64,
    task1_scores: RubricScores,
    task2_scores: RubricScores,
) -> EvaluationResult {
    let band_task1 = slot_band(&task1_scores);
    let band_task2 = slot_band(&task2_scores);

    EvaluationResult {
        answer_id,
        user_id,
        sequence_number,
        task1_scores,
        task2_scores,
        band_task1,
        band_task2,
        weighted_band: weighted_band(band_task1, band_task2),
        created_at: Utc::now(),
    }
}

pub struct ScoringService {
    mongo: Database,
}

impl ScoringService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Atomic read-and-reserve of the next sequence number. The counter
    /// document is the serialization point: concurrent submissions each
    /// observe a distinct, strictly increasing value.
    async fn next_sequence_number(&self, counter: &str) -> Result<i64> {
        let collection = self.mongo.collection::<Counter>(COUNTERS_COLLECTION);

        let updated = collection
            .find_one_and_update(doc! { "_id": counter }, doc! { "$inc": { "value": 1 } })
            .with_options(
                FindOneAndUpdateOptions::builder()
                    .upsert(true)
                    .return_document(ReturnDocument::After)
                    .build(),
            )
            .await
            .context("Failed to reserve sequence number")?
            .ok_or_else(|| anyhow::anyhow!("Counter upsert returned no document"))?;

        Ok(updated.value)
    }

    /// Validates both rubric quadruples, recomputes the bands, and persists
    /// the result. A resubmission for the same answer is the rubric-correction
    /// path: bands are re-derived from the new sub-scores while the originally
    /// assigned sequence number is kept.
    pub async fn submit_evaluation(
        &self,
        user_id: &str,
        req: &SubmitEvaluationRequest,
    ) -> Result<EvaluationResult, ApiError> {
        req.validate()
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        check_half_steps("task1_scores", &req.task1_scores)?;
        check_half_steps("task2_scores", &req.task2_scores)?;

        let collection = self
            .mongo
            .collection::<EvaluationResult>(EVALUATIONS_COLLECTION);

        let existing = collection
            .find_one(doc! { "_id": &req.answer_id })
            .await
            .context("Failed to query evaluation results")?;

        let (sequence_number, kind) = match &existing {
            Some(prev) => (prev.sequence_number, "recomputed"),
            None => (
                self.next_sequence_number(EVALUATION_COUNTER).await?,
                "created",
            ),
        };

        let result = recompute(
            req.answer_id.clone(),
            user_id.to_string(),
            sequence_number,
            req.task1_scores,
            req.task2_scores,
        );

        retry_async(RetryConfig::default(), || async {
            collection
                .replace_one(doc! { "_id": &result.answer_id }, &result)
                .with_options(ReplaceOptions::builder().upsert(true).build())
                .await
        })
        .await
        .context("Failed to persist evaluation result")?;

        EVALUATIONS_TOTAL.with_label_values(&[kind]).inc();

        tracing::info!(
            "Evaluation #{} {} for answer {} (weighted band {})",
            result.sequence_number,
            kind,
            result.answer_id,
            result.weighted_band
        );

        Ok(result)
    }

    pub async fn get_evaluation(&self, answer_id: &str) -> Result<Option<EvaluationResult>> {
        let collection = self
            .mongo
            .collection::<EvaluationResult>(EVALUATIONS_COLLECTION);
        collection
            .find_one(doc! { "_id": answer_id })
            .await
            .with_context(|| format!("Failed to query evaluation for answer {}", answer_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(tr: f64, cc: f64, lr: f64, gra: f64) -> RubricScores {
        RubricScores {
            task_response: tr,
            coherence_cohesion: cc,
            lexical_resource: lr,
            grammatical_range_accuracy: gra,
        }
    }

    #[test]
    fn slot_band_is_the_rounded_mean() {
        assert_eq!(slot_band(&scores(6.0, 6.5, 7.0, 6.5)), 6.5);
        assert_eq!(slot_band(&scores(9.0, 9.0, 9.0, 9.0)), 9.0);
        assert_eq!(slot_band(&scores(0.0, 0.0, 0.0, 0.5)), 0.13);
        // quarter-band mean rounds half-up at the second decimal
        assert_eq!(slot_band(&scores(6.0, 6.5, 6.5, 6.5)), 6.38);
    }

    #[test]
    fn weighted_band_follows_the_task_weights() {
        assert_eq!(weighted_band(6.5, 7.0), 6.84);
        assert_eq!(weighted_band(7.0, 6.5), 6.67);
        assert_eq!(weighted_band(0.0, 0.0), 0.0);
        assert_eq!(weighted_band(9.0, 9.0), 9.0);
    }

    #[test]
    fn round2_rounds_half_up() {
        assert_eq!(round2(6.835), 6.84);
        assert_eq!(round2(6.834), 6.83);
        assert_eq!(round2(0.125), 0.13);
    }

    #[test]
    fn half_step_rule_rejects_off_step_scores() {
        assert!(check_half_steps("task1_scores", &scores(6.0, 6.5, 7.0, 6.5)).is_ok());

        let err = check_half_steps("task1_scores", &scores(6.0, 6.5, 7.0, 6.25)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("grammatical_range_accuracy"));
        assert!(msg.contains("multiple of 0.5"));
    }

    #[test]
    fn recompute_derives_all_three_bands_together() {
        let result = recompute(
            "answer-1".to_string(),
            "u-1".to_string(),
            7,
            scores(6.0, 6.5, 7.0, 6.5),
            scores(7.0, 7.0, 6.5, 7.5),
        );

        assert_eq!(result.band_task1, 6.5);
        assert_eq!(result.band_task2, 7.0);
        assert_eq!(result.weighted_band, weighted_band(6.5, 7.0));
        assert_eq!(result.sequence_number, 7);
    }

    #[test]
    fn out_of_range_scores_fail_validation() {
        assert!(scores(6.0, 6.5, 7.0, 6.5).validate().is_ok());
        assert!(scores(9.5, 6.5, 7.0, 6.5).validate().is_err());
        assert!(scores(6.0, -0.5, 7.0, 6.5).validate().is_err());
    }
}
