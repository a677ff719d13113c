use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::SubmitEvaluationRequest,
    services::{scoring_service::ScoringService, AppState},
};

pub async fn submit_evaluation(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<SubmitEvaluationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Evaluation submitted: user={}, answer={}",
        claims.sub,
        req.answer_id
    );

    let service = ScoringService::new(state.mongo.clone());
    let result = service.submit_evaluation(&claims.sub, &req).await?;

    Ok((StatusCode::CREATED, Json(result)))
}

pub async fn get_evaluation(
    State(state): State<Arc<AppState>>,
    Path(answer_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = ScoringService::new(state.mongo.clone());

    let result = service
        .get_evaluation(&answer_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no evaluation recorded for answer {}", answer_id))
        })?;

    Ok((StatusCode::OK, Json(result)))
}
