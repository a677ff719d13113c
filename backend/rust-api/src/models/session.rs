use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::task::ExamType;

/// One user's exclusive claim on a timed exam attempt. The bound task pair is
/// fixed at lock time and never changes afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PracticeSession {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub exam_type: ExamType,
    pub task1_id: String,
    pub task2_id: String,
    // Stored as epoch millis so the document store can sort and compare them.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Locked,
    Expired,
    Released,
}

impl SessionStatus {
    /// Terminal sessions accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Expired | SessionStatus::Released)
    }
}

impl PracticeSession {
    pub fn new(
        id: String,
        user_id: String,
        exam_type: ExamType,
        task1_id: String,
        task2_id: String,
        duration_minutes: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        let expires_at = created_at + Duration::minutes(duration_minutes);
        Self {
            id,
            user_id,
            exam_type,
            task1_id,
            task2_id,
            created_at,
            duration_minutes,
            expires_at,
            status: SessionStatus::Locked,
        }
    }

    /// Expiry is a pure function of the supplied clock value; nothing sweeps
    /// sessions in the background.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Locked && now <= self.expires_at
    }

    /// Status as observed by callers: a stored `locked` row past its deadline
    /// reads as expired.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.status == SessionStatus::Locked && self.is_expired_at(now) {
            SessionStatus::Expired
        } else {
            self.status
        }
    }
}
