use crate::error::ApiError;
use crate::metrics::{
    PRACTICE_EXAMS_STARTED_TOTAL, PRACTICE_EXAM_REJECTIONS_TOTAL, TASK_POOL_EMPTY_TOTAL,
};
use crate::models::{
    ExamDescriptor, ExamType, LockSessionRequest, PracticeExamInfo, PracticeExamQuestions,
    PracticeExamResponse, PracticeSession, TaskSlot, WritingTask,
};
use crate::services::session_lock_service::SessionLockService;
use crate::services::task_pool_service::TaskPoolService;
use crate::utils::selection::pick_one;
use chrono::Utc;

const MAX_SESSION_DURATION_MINUTES: i64 = 24 * 60;

pub struct PracticeService {
    pools: TaskPoolService,
    locks: SessionLockService,
}

impl PracticeService {
    pub fn new(pools: TaskPoolService, locks: SessionLockService) -> Self {
        Self { pools, locks }
    }

    /// Start-practice-exam sequence: lock conflict check, then one pool per
    /// slot under a single exam-type filter, then one uniform pick per slot.
    /// Rate limiting has already been enforced by the route middleware, and
    /// the session itself is only created by the explicit lock call.
    pub async fn start_practice_exam(
        &self,
        user_id: &str,
        exam_type: ExamType,
    ) -> Result<PracticeExamResponse, ApiError> {
        if let Some(session_id) = self.locks.active_lock(user_id).await? {
            PRACTICE_EXAM_REJECTIONS_TOTAL
                .with_label_values(&["session_conflict"])
                .inc();
            tracing::info!(
                "Practice exam rejected for user {}: session {} still active",
                user_id,
                session_id
            );
            let retry_after = self.locks.lock_ttl_seconds(user_id).await.unwrap_or(None);
            return Err(ApiError::conflict(
                "an exam session is already in progress; retry after it expires",
                retry_after,
            ));
        }

        // Both slots resolve against the same exam-type filter.
        let (pool1, pool2) = futures::future::try_join(
            self.pools.get_pool(TaskSlot::Task1, exam_type),
            self.pools.get_pool(TaskSlot::Task2, exam_type),
        )
        .await?;

        let task1_id = Self::pick(TaskSlot::Task1, exam_type, &pool1)?;
        let task2_id = Self::pick(TaskSlot::Task2, exam_type, &pool2)?;

        let task1 = self.must_fetch(task1_id).await?;
        let task2 = self.must_fetch(task2_id).await?;

        PRACTICE_EXAMS_STARTED_TOTAL
            .with_label_values(&[exam_type.as_str()])
            .inc();

        Ok(PracticeExamResponse {
            exam: ExamDescriptor {
                module: "writing",
                mode: "practice",
                exam_type,
            },
            info: PracticeExamInfo {
                generated: Utc::now(),
                total_task1: pool1.len(),
                total_task2: pool2.len(),
            },
            questions: PracticeExamQuestions { task1, task2 },
        })
    }

    /// Explicit lock call: validates the task pair, then claims the per-user
    /// lock and persists the session bound to exactly these tasks.
    pub async fn lock_session(
        &self,
        user_id: &str,
        req: &LockSessionRequest,
        default_duration_minutes: i64,
    ) -> Result<PracticeSession, ApiError> {
        let duration = req.duration_minutes.unwrap_or(default_duration_minutes);
        if duration <= 0 || duration > MAX_SESSION_DURATION_MINUTES {
            return Err(ApiError::Validation(format!(
                "duration_minutes must be between 1 and {}",
                MAX_SESSION_DURATION_MINUTES
            )));
        }

        let task1 = self.must_exist(&req.task1_id).await?;
        let task2 = self.must_exist(&req.task2_id).await?;

        validate_task_binding(&task1, TaskSlot::Task1, req.exam_type)?;
        validate_task_binding(&task2, TaskSlot::Task2, req.exam_type)?;

        self.locks
            .try_acquire(user_id, req.exam_type, task1.id, task2.id, duration)
            .await
    }

    fn pick<'a>(
        slot: TaskSlot,
        exam_type: ExamType,
        pool: &'a [String],
    ) -> Result<&'a String, ApiError> {
        pick_one(pool).map_err(|_| {
            TASK_POOL_EMPTY_TOTAL
                .with_label_values(&[slot.as_str(), exam_type.as_str()])
                .inc();
            PRACTICE_EXAM_REJECTIONS_TOTAL
                .with_label_values(&["no_tasks"])
                .inc();
            ApiError::Unavailable(format!(
                "no {} tasks available for the {} module",
                slot, exam_type
            ))
        })
    }

    async fn must_exist(&self, task_id: &str) -> Result<WritingTask, ApiError> {
        self.pools
            .fetch_task(task_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("task {} does not exist", task_id)))
    }

    /// A pool snapshot can outlive a task deletion in the store; a stale id
    /// is a provisioning gap, not an internal failure.
    async fn must_fetch(&self, task_id: &str) -> Result<WritingTask, ApiError> {
        self.pools
            .fetch_task(task_id)
            .await?
            .ok_or_else(|| ApiError::Unavailable(format!("task {} is no longer available", task_id)))
    }
}

fn validate_task_binding(
    task: &WritingTask,
    expected_slot: TaskSlot,
    exam_type: ExamType,
) -> Result<(), ApiError> {
    if task.slot != expected_slot {
        return Err(ApiError::Validation(format!(
            "task {} is a {} task, expected {}",
            task.id, task.slot, expected_slot
        )));
    }
    if task.exam_type != exam_type {
        return Err(ApiError::Validation(format!(
            "task {} belongs to the {} exam, expected {}",
            task.id, task.exam_type, exam_type
        )));
    }
    task.check_content_policy().map_err(ApiError::Validation)
}
