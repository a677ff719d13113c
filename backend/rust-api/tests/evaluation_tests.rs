use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

mod common;

fn scores(tr: f64, cc: f64, lr: f64, gra: f64) -> serde_json::Value {
    json!({
        "task_response": tr,
        "coherence_cohesion": cc,
        "lexical_resource": lr,
        "grammatical_range_accuracy": gra,
    })
}

async fn submit(
    app: &axum::Router,
    token: &str,
    answer_id: &str,
    task1: serde_json::Value,
    task2: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let body = json!({
        "answer_id": answer_id,
        "task1_scores": task1,
        "task2_scores": task2,
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/evaluations/")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn fetch(
    app: &axum::Router,
    token: &str,
    answer_id: &str,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/api/v1/evaluations/{}", answer_id))
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_submit_evaluation_computes_both_bands_and_the_weighted_total() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));
    let answer_id = format!("answer-{}", Uuid::new_v4());

    let (status, body) = submit(
        &app,
        &token,
        &answer_id,
        scores(6.0, 6.5, 7.0, 6.5),
        scores(7.0, 7.0, 6.5, 7.5),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
    assert_eq!(body["band_task1"].as_f64().unwrap(), 6.5);
    assert_eq!(body["band_task2"].as_f64().unwrap(), 7.0);
    // round(0.33 * 6.5 + 0.67 * 7.0, 2)
    assert_eq!(body["weighted_band"].as_f64().unwrap(), 6.84);
    assert!(body["sequence_number"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn test_sequence_numbers_strictly_increase() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));

    let (status, first) = submit(
        &app,
        &token,
        &format!("answer-{}", Uuid::new_v4()),
        scores(5.0, 5.5, 6.0, 5.5),
        scores(6.0, 6.0, 6.0, 6.0),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = submit(
        &app,
        &token,
        &format!("answer-{}", Uuid::new_v4()),
        scores(5.0, 5.5, 6.0, 5.5),
        scores(6.0, 6.0, 6.0, 6.0),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    assert!(
        second["sequence_number"].as_i64().unwrap() > first["sequence_number"].as_i64().unwrap()
    );
}

#[tokio::test]
async fn test_concurrent_submissions_get_distinct_numbers() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));

    let answers: Vec<String> = (0..8).map(|_| format!("answer-{}", Uuid::new_v4())).collect();
    let futures: Vec<_> = answers
        .iter()
        .map(|answer_id| {
            submit(
                &app,
                &token,
                answer_id,
                scores(6.0, 6.0, 6.0, 6.0),
                scores(7.0, 7.0, 7.0, 7.0),
            )
        })
        .collect();

    let results = futures::future::join_all(futures).await;

    let mut numbers = Vec::new();
    for (status, body) in results {
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {}", body);
        numbers.push(body["sequence_number"].as_i64().unwrap());
    }

    let unique: std::collections::HashSet<_> = numbers.iter().collect();
    assert_eq!(unique.len(), numbers.len(), "duplicate numbers: {:?}", numbers);
}

#[tokio::test]
async fn test_out_of_range_scores_are_a_validation_error() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));

    let (status, body) = submit(
        &app,
        &token,
        &format!("answer-{}", Uuid::new_v4()),
        scores(9.5, 6.5, 7.0, 6.5),
        scores(7.0, 7.0, 6.5, 7.5),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {}", body);
    assert_eq!(body["error"], "validation");
}

#[tokio::test]
async fn test_off_step_scores_are_a_validation_error() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));

    let (status, body) = submit(
        &app,
        &token,
        &format!("answer-{}", Uuid::new_v4()),
        scores(6.25, 6.5, 7.0, 6.5),
        scores(7.0, 7.0, 6.5, 7.5),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "unexpected body: {}", body);
    assert_eq!(body["error"], "validation");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("multiple of 0.5"));
}

#[tokio::test]
async fn test_resubmission_recomputes_bands_but_keeps_the_number() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));
    let answer_id = format!("answer-{}", Uuid::new_v4());

    let (status, first) = submit(
        &app,
        &token,
        &answer_id,
        scores(6.0, 6.0, 6.0, 6.0),
        scores(6.0, 6.0, 6.0, 6.0),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["weighted_band"].as_f64().unwrap(), 6.0);

    // Rubric correction: every band is re-derived, the number is not.
    let (status, second) = submit(
        &app,
        &token,
        &answer_id,
        scores(7.0, 7.0, 7.0, 7.0),
        scores(7.0, 7.0, 7.0, 7.0),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["weighted_band"].as_f64().unwrap(), 7.0);
    assert_eq!(
        second["sequence_number"].as_i64().unwrap(),
        first["sequence_number"].as_i64().unwrap()
    );
}

#[tokio::test]
async fn test_stored_evaluation_round_trips() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));
    let answer_id = format!("answer-{}", Uuid::new_v4());

    let (status, submitted) = submit(
        &app,
        &token,
        &answer_id,
        scores(6.0, 6.5, 7.0, 6.5),
        scores(7.0, 7.0, 6.5, 7.5),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stored) = fetch(&app, &token, &answer_id).await;
    assert_eq!(status, StatusCode::OK, "unexpected body: {}", stored);

    assert_eq!(stored["task1_scores"], submitted["task1_scores"]);
    assert_eq!(stored["task2_scores"], submitted["task2_scores"]);
    assert_eq!(stored["band_task1"], submitted["band_task1"]);
    assert_eq!(stored["band_task2"], submitted["band_task2"]);
    assert_eq!(stored["weighted_band"], submitted["weighted_band"]);
    assert_eq!(stored["sequence_number"], submitted["sequence_number"]);
}

#[tokio::test]
async fn test_missing_evaluation_is_not_found() {
    let Some((app, config)) = common::try_create_test_app().await else {
        return;
    };

    let token = common::auth_token(&config, &format!("examiner-{}", Uuid::new_v4()));

    let (status, body) = fetch(&app, &token, &format!("answer-{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "unexpected body: {}", body);
    assert_eq!(body["error"], "not_found");
}
