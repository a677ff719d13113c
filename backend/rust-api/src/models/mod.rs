use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod evaluation;
pub mod session;
pub mod task;

pub use evaluation::{EvaluationResult, RubricScores, SubmitEvaluationRequest};
pub use session::{PracticeSession, SessionStatus};
pub use task::{ExamType, TaskSlot, WritingTask};

#[derive(Debug, Deserialize)]
pub struct StartPracticeExamRequest {
    pub exam_type: ExamType,
}

#[derive(Debug, Serialize)]
pub struct PracticeExamResponse {
    pub exam: ExamDescriptor,
    pub info: PracticeExamInfo,
    pub questions: PracticeExamQuestions,
}

#[derive(Debug, Serialize)]
pub struct ExamDescriptor {
    pub module: &'static str,
    pub mode: &'static str,
    pub exam_type: ExamType,
}

#[derive(Debug, Serialize)]
pub struct PracticeExamInfo {
    pub generated: DateTime<Utc>,
    pub total_task1: usize,
    pub total_task2: usize,
}

#[derive(Debug, Serialize)]
pub struct PracticeExamQuestions {
    pub task1: WritingTask,
    pub task2: WritingTask,
}

#[derive(Debug, Deserialize)]
pub struct LockSessionRequest {
    pub task1_id: String,
    pub task2_id: String,
    pub exam_type: ExamType,
    pub duration_minutes: Option<i64>,
}

/// Session as presented to callers: the stored status is folded through the
/// lazy expiry check at read time.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub user_id: String,
    pub exam_type: ExamType,
    pub task1_id: String,
    pub task2_id: String,
    pub created_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
}

impl SessionView {
    pub fn of(session: &PracticeSession, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            exam_type: session.exam_type,
            task1_id: session.task1_id.clone(),
            task2_id: session.task2_id.clone(),
            created_at: session.created_at,
            duration_minutes: session.duration_minutes,
            expires_at: session.expires_at,
            status: session.effective_status(now),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseSessionResponse {
    pub session_id: String,
    pub status: SessionStatus,
}
