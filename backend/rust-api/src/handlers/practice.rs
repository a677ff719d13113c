use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{LockSessionRequest, ReleaseSessionResponse, SessionView, StartPracticeExamRequest},
    services::{
        practice_service::PracticeService, session_lock_service::SessionLockService,
        task_pool_service::TaskPoolService, AppState,
    },
};

fn practice_service(state: &AppState) -> PracticeService {
    PracticeService::new(
        TaskPoolService::new(
            state.mongo.clone(),
            state.redis.clone(),
            state.config.task_pool_ttl_seconds,
        ),
        SessionLockService::new(state.mongo.clone(), state.redis.clone()),
    )
}

pub async fn start_practice_exam(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<StartPracticeExamRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Practice exam requested: user={}, exam_type={}",
        claims.sub,
        req.exam_type
    );

    let response = practice_service(&state)
        .start_practice_exam(&claims.sub, req.exam_type)
        .await?;

    Ok((StatusCode::OK, Json(response)))
}

pub async fn lock_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<LockSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Lock session requested: user={}, task1={}, task2={}",
        claims.sub,
        req.task1_id,
        req.task2_id
    );

    let session = practice_service(&state)
        .lock_session(&claims.sub, &req, state.config.session_duration_minutes)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionView::of(&session, Utc::now())),
    ))
}

/// Most recent session for the authenticated user, regardless of state.
pub async fn latest_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionLockService::new(state.mongo.clone(), state.redis.clone());

    let session = service
        .last_session(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("no sessions recorded for this user".to_string()))?;

    Ok((StatusCode::OK, Json(SessionView::of(&session, Utc::now()))))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionLockService::new(state.mongo.clone(), state.redis.clone());

    let session = service
        .get_session(&session_id)
        .await?
        // Sessions are private to their owner.
        .filter(|s| s.user_id == claims.sub)
        .ok_or_else(|| ApiError::NotFound(format!("session {} does not exist", session_id)))?;

    Ok((StatusCode::OK, Json(SessionView::of(&session, Utc::now()))))
}

pub async fn release_session(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionLockService::new(state.mongo.clone(), state.redis.clone());

    let status = service.release(&session_id, &claims.sub).await?;

    Ok((
        StatusCode::OK,
        Json(ReleaseSessionResponse { session_id, status }),
    ))
}
