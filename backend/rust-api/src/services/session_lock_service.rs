use crate::error::ApiError;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_LOCKED_TOTAL};
use crate::models::{ExamType, PracticeSession, SessionStatus};
use crate::utils::retry::{retry_async, RetryConfig};
use anyhow::{Context, Result};
use chrono::Utc;
use mongodb::bson::doc;
use mongodb::options::FindOneOptions;
use mongodb::Database;
use redis::aio::ConnectionManager;
use uuid::Uuid;

pub const SESSIONS_COLLECTION: &str = "practice_sessions";

/// Deletes the per-user lock only while it still points at the given session.
const RELEASE_LOCK_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

pub struct SessionLockService {
    mongo: Database,
    redis: ConnectionManager,
}

impl SessionLockService {
    pub fn new(mongo: Database, redis: ConnectionManager) -> Self {
        Self { mongo, redis }
    }

    fn lock_key(user_id: &str) -> String {
        format!("examlock:user:{}", user_id)
    }

    /// Session id currently holding the user's lock, if any. Expiry rides on
    /// the key TTL, so a present key is an active claim.
    pub async fn active_lock(&self, user_id: &str) -> Result<Option<String>> {
        let mut conn = self.redis.clone();
        redis::cmd("GET")
            .arg(Self::lock_key(user_id))
            .query_async(&mut conn)
            .await
            .context("Failed to read session lock")
    }

    /// Seconds until the user's current lock expires; None when no lock held.
    pub async fn lock_ttl_seconds(&self, user_id: &str) -> Result<Option<i64>> {
        let mut conn = self.redis.clone();
        let ttl: i64 = redis::cmd("TTL")
            .arg(Self::lock_key(user_id))
            .query_async(&mut conn)
            .await
            .context("Failed to read session lock TTL")?;
        Ok((ttl > 0).then_some(ttl))
    }

    /// Check-then-create collapsed into a single SET NX EX on the per-user
    /// key: of two concurrent acquire attempts exactly one wins, the loser
    /// sees a clean conflict carrying a retry-after hint.
    pub async fn try_acquire(
        &self,
        user_id: &str,
        exam_type: ExamType,
        task1_id: String,
        task2_id: String,
        duration_minutes: i64,
    ) -> Result<PracticeSession, ApiError> {
        let session_id = Uuid::new_v4().to_string();
        let lock_key = Self::lock_key(user_id);
        let duration_seconds = duration_minutes * 60;

        let mut conn = self.redis.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&lock_key)
            .arg(&session_id)
            .arg("NX")
            .arg("EX")
            .arg(duration_seconds)
            .query_async(&mut conn)
            .await
            .context("Failed to acquire session lock")?;

        if reply.is_none() {
            SESSIONS_LOCKED_TOTAL.with_label_values(&["conflict"]).inc();
            let retry_after = self.lock_ttl_seconds(user_id).await.unwrap_or(None);
            return Err(ApiError::conflict(
                "an exam session is already in progress for this user; retry after it expires",
                retry_after,
            ));
        }

        let session = PracticeSession::new(
            session_id,
            user_id.to_string(),
            exam_type,
            task1_id,
            task2_id,
            duration_minutes,
            Utc::now(),
        );

        let collection = self
            .mongo
            .collection::<PracticeSession>(SESSIONS_COLLECTION);
        let inserted = retry_async(RetryConfig::default(), || async {
            collection.insert_one(&session).await
        })
        .await;

        if let Err(e) = inserted {
            // Roll the lock back so the user is not locked out of a session
            // that was never recorded.
            self.force_unlock(user_id, &session.id).await;
            return Err(ApiError::Internal(
                anyhow::Error::new(e).context("Failed to persist session"),
            ));
        }

        SESSIONS_LOCKED_TOTAL.with_label_values(&["acquired"]).inc();
        SESSIONS_ACTIVE.inc();

        tracing::info!(
            "Session {} locked for user {} ({} min)",
            session.id,
            user_id,
            duration_minutes
        );

        Ok(session)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<PracticeSession>> {
        let collection = self
            .mongo
            .collection::<PracticeSession>(SESSIONS_COLLECTION);
        collection
            .find_one(doc! { "_id": session_id })
            .await
            .with_context(|| format!("Failed to query session {}", session_id))
    }

    /// Most recent session for a user, regardless of state.
    pub async fn last_session(&self, user_id: &str) -> Result<Option<PracticeSession>> {
        let collection = self
            .mongo
            .collection::<PracticeSession>(SESSIONS_COLLECTION);
        collection
            .find_one(doc! { "user_id": user_id })
            .with_options(
                FindOneOptions::builder()
                    .sort(doc! { "created_at": -1 })
                    .build(),
            )
            .await
            .context("Failed to query last session")
    }

    /// Idempotent release. The Redis key is removed only while it still
    /// points at this session; the stored row moves to `released` only from
    /// a live `locked` state, so terminal sessions stay untouched.
    pub async fn release(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<SessionStatus, ApiError> {
        let session = self
            .get_session(session_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| ApiError::NotFound(format!("session {} does not exist", session_id)))?;

        let effective = session.effective_status(Utc::now());
        if effective.is_terminal() {
            // Nothing to transition; still drop a stale lock that may be
            // pointing at this session.
            self.force_unlock(user_id, session_id).await;
            return Ok(effective);
        }

        self.force_unlock(user_id, session_id).await;

        let collection = self
            .mongo
            .collection::<PracticeSession>(SESSIONS_COLLECTION);
        let updated = collection
            .update_one(
                doc! { "_id": session_id, "status": "locked" },
                doc! { "$set": { "status": "released" } },
            )
            .await
            .context("Failed to release session")?;

        if updated.modified_count > 0 {
            SESSIONS_ACTIVE.dec();
            tracing::info!("Session {} released by user {}", session_id, user_id);
        } else {
            // Lost the race to a concurrent release; the outcome is the same.
            tracing::debug!("Session {} was already terminal", session_id);
        }

        Ok(SessionStatus::Released)
    }

    async fn force_unlock(&self, user_id: &str, session_id: &str) {
        let mut conn = self.redis.clone();
        let res: redis::RedisResult<i64> = redis::Script::new(RELEASE_LOCK_SCRIPT)
            .key(Self::lock_key(user_id))
            .arg(session_id)
            .invoke_async(&mut conn)
            .await;

        if let Err(e) = res {
            tracing::error!("Failed to drop session lock for user {}: {}", user_id, e);
        }
    }
}
