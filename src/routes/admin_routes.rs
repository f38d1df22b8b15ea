use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::attempt_dto::{LiveAttemptView, LiveAttemptsResponse},
    dto::catalog_dto::{CreateTestPayload, TestListResponse, TestResponse},
    error::{Error, Result},
    AppState,
};

#[utoipa::path(
    post,
    path = "/api/admin/tests",
    request_body = CreateTestPayload,
    responses(
        (status = 201, description = "Test created successfully", body = Json<TestResponse>),
        (status = 400, description = "Invalid payload")
    )
)]
#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    Json(payload): Json<CreateTestPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    payload.validate_questions()?;
    let created = state.catalog.insert_test(payload.into_definition(Utc::now())).await?;
    tracing::info!("Test {} created: {}", created.id, created.title);
    Ok((StatusCode::CREATED, Json(TestResponse::from(created))))
}

#[utoipa::path(
    get,
    path = "/api/admin/tests/{id}",
    params(
        ("id" = Uuid, Path, description = "Test ID")
    ),
    responses(
        (status = 200, description = "Test found", body = Json<TestResponse>),
        (status = 404, description = "Test not found")
    )
)]
#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let test = state
        .catalog
        .test_snapshot(id)
        .await?
        .ok_or_else(|| Error::TestNotFound(id.to_string()))?;
    Ok(Json(TestResponse::from(test)))
}

#[utoipa::path(
    get,
    path = "/api/admin/tests",
    responses(
        (status = 200, description = "All tests", body = Json<TestListResponse>)
    )
)]
#[axum::debug_handler]
pub async fn list_tests(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let tests = state.catalog.list_tests().await?;
    let items: Vec<TestResponse> = tests.into_iter().map(Into::into).collect();
    let total = items.len();
    Ok(Json(TestListResponse { items, total }))
}

#[utoipa::path(
    get,
    path = "/api/admin/attempts/live",
    responses(
        (status = 200, description = "Attempts currently in progress", body = Json<LiveAttemptsResponse>)
    )
)]
#[axum::debug_handler]
pub async fn live_attempts(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let attempts = state.lifecycle.list_live().await?;
    let items: Vec<LiveAttemptView> = attempts.into_iter().map(Into::into).collect();
    let total = items.len();
    Ok(Json(LiveAttemptsResponse { items, total }))
}
