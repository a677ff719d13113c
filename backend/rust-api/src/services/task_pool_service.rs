use crate::metrics::{
    record_cache_hit, record_cache_miss, track_cache_operation, TASK_POOL_REFRESHES_TOTAL,
};
use crate::models::{ExamType, TaskSlot, WritingTask};
use crate::utils::retry::{retry_async, RetryConfig};
use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::bson::doc;
use mongodb::Database;
use redis::aio::ConnectionManager;

pub const TASKS_COLLECTION: &str = "writing_tasks";

pub struct TaskPoolService {
    mongo: Database,
    redis: ConnectionManager,
    pool_ttl_seconds: u64,
}

impl TaskPoolService {
    pub fn new(mongo: Database, redis: ConnectionManager, pool_ttl_seconds: u64) -> Self {
        Self {
            mongo,
            redis,
            pool_ttl_seconds,
        }
    }

    fn pool_key(slot: TaskSlot, exam_type: ExamType) -> String {
        format!("taskpool:{}:{}", slot, exam_type)
    }

    /// Current pool of eligible task ids for one (slot, exam type) partition.
    /// A cache miss or TTL expiry triggers an inline rebuild from the
    /// authoritative store. An empty store result is a valid pool, not an
    /// error; callers handle emptiness explicitly.
    pub async fn get_pool(&self, slot: TaskSlot, exam_type: ExamType) -> Result<Vec<String>> {
        let key = Self::pool_key(slot, exam_type);
        let mut conn = self.redis.clone();

        let cached: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .context("Failed to read task pool from Redis")?;

        if let Some(json) = cached {
            match serde_json::from_str::<Vec<String>>(&json) {
                Ok(ids) => {
                    record_cache_hit();
                    return Ok(ids);
                }
                Err(e) => {
                    tracing::warn!("Discarding corrupt task pool snapshot {}: {}", key, e);
                }
            }
        }
        record_cache_miss();

        self.rebuild_pool(slot, exam_type).await
    }

    /// Inline rebuild. Concurrent rebuilders for the same key may race; last
    /// writer wins, the snapshot is eventually consistent either way.
    async fn rebuild_pool(&self, slot: TaskSlot, exam_type: ExamType) -> Result<Vec<String>> {
        let ids = retry_async(RetryConfig::default(), || async {
            self.list_task_ids(slot, exam_type).await
        })
        .await?;

        TASK_POOL_REFRESHES_TOTAL
            .with_label_values(&[slot.as_str(), exam_type.as_str()])
            .inc();

        let key = Self::pool_key(slot, exam_type);
        let json = serde_json::to_string(&ids).context("Failed to serialize task pool")?;
        let mut conn = self.redis.clone();
        let ttl = self.pool_ttl_seconds;

        track_cache_operation("setex", async {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(ttl)
                .arg(&json)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to store task pool snapshot")
        })
        .await?;

        tracing::info!("Rebuilt task pool {}: {} tasks", key, ids.len());

        Ok(ids)
    }

    async fn list_task_ids(&self, slot: TaskSlot, exam_type: ExamType) -> Result<Vec<String>> {
        let collection = self.mongo.collection::<WritingTask>(TASKS_COLLECTION);

        let cursor = collection
            .find(doc! { "slot": slot.as_str(), "exam_type": exam_type.as_str() })
            .await
            .context("Failed to query writing tasks")?;

        let tasks: Vec<WritingTask> = cursor
            .try_collect()
            .await
            .context("Failed to collect writing tasks")?;

        Ok(tasks.into_iter().map(|t| t.id).collect())
    }

    pub async fn fetch_task(&self, task_id: &str) -> Result<Option<WritingTask>> {
        let collection = self.mongo.collection::<WritingTask>(TASKS_COLLECTION);
        collection
            .find_one(doc! { "_id": task_id })
            .await
            .with_context(|| format!("Failed to query task {}", task_id))
    }
}
