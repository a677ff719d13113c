use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// The four rubric criteria a writing answer is marked on. Scores move in
/// half-band steps on the 0-9 scale; the step rule is checked by the scoring
/// service on top of the range bounds here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct RubricScores {
    #[validate(range(
        min = 0.0,
        max = 9.0,
        message = "task_response must be between 0 and 9"
    ))]
    pub task_response: f64,
    #[validate(range(
        min = 0.0,
        max = 9.0,
        message = "coherence_cohesion must be between 0 and 9"
    ))]
    pub coherence_cohesion: f64,
    #[validate(range(
        min = 0.0,
        max = 9.0,
        message = "lexical_resource must be between 0 and 9"
    ))]
    pub lexical_resource: f64,
    #[validate(range(
        min = 0.0,
        max = 9.0,
        message = "grammatical_range_accuracy must be between 0 and 9"
    ))]
    pub grammatical_range_accuracy: f64,
}

impl RubricScores {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.task_response,
            self.coherence_cohesion,
            self.lexical_resource,
            self.grammatical_range_accuracy,
        ]
    }
}

/// Rubric outcome for one submitted answer pair, keyed by the answer it
/// evaluates. Immutable once written; a rubric correction goes through the
/// recompute path, which re-derives both slot bands and the weighted total
/// together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(rename = "_id")]
    pub answer_id: String,
    pub user_id: String,
    pub sequence_number: i64,
    pub task1_scores: RubricScores,
    pub task2_scores: RubricScores,
    pub band_task1: f64,
    pub band_task2: f64,
    pub weighted_band: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitEvaluationRequest {
    #[validate(length(min = 1, message = "answer_id must not be empty"))]
    pub answer_id: String,
    #[validate(nested)]
    pub task1_scores: RubricScores,
    #[validate(nested)]
    pub task2_scores: RubricScores,
}
