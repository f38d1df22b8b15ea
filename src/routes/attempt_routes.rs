use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::attempt_dto::{
    AnswerView, AttemptDetailResponse, AttemptView, CompleteAttemptResponse,
    RemainingTimeResponse, SubmitAnswerRequest, SubmitAnswerResponse,
};
use crate::middleware::auth::AuthUser;
use crate::models::attempt::CompletionSummary;
use crate::AppState;

#[axum::debug_handler]
pub async fn start_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(test_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    tracing::info!("User {} starting test {}", user.user_id, test_id);
    let attempt = state.lifecycle.start(user.user_id, test_id).await?;
    Ok((StatusCode::CREATED, Json(AttemptView::from(attempt))).into_response())
}

#[axum::debug_handler]
pub async fn get_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let (attempt, answers) = state
        .lifecycle
        .attempt_detail(attempt_id, user.user_id, user.is_admin())
        .await?;

    let reveal = attempt.status.is_terminal();
    let summary = reveal.then(|| CompletionSummary::compute(&attempt.questions, &answers));
    let response = AttemptDetailResponse {
        attempt: attempt.into(),
        answers: answers
            .into_iter()
            .map(|answer| AnswerView::of(answer, reveal))
            .collect(),
        summary,
    };
    Ok(Json(response).into_response())
}

#[axum::debug_handler]
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
    Json(req): Json<SubmitAnswerRequest>,
) -> crate::error::Result<Response> {
    req.validate()?;
    let (answer, answered_count) = state
        .lifecycle
        .submit_answer(
            attempt_id,
            user.user_id,
            req.question_id,
            req.option_id,
            req.text_answer,
        )
        .await?;

    Ok(Json(SubmitAnswerResponse {
        saved: true,
        question_id: answer.question_id,
        answered_count,
        submitted_at: answer.submitted_at,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn complete_attempt(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let (attempt, summary, answers) = state.lifecycle.complete(attempt_id, user.user_id).await?;
    tracing::info!(
        "Attempt {} closed as {} ({}/{})",
        attempt.id,
        attempt.status.as_str(),
        attempt.score,
        attempt.max_score
    );

    let answers = answers
        .into_iter()
        .map(|answer| AnswerView::of(answer, true))
        .collect();
    Ok(Json(CompleteAttemptResponse {
        attempt: attempt.into(),
        summary,
        answers,
    })
    .into_response())
}

#[axum::debug_handler]
pub async fn remaining_time(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(attempt_id): Path<Uuid>,
) -> crate::error::Result<Response> {
    let (attempt, remaining) = state
        .lifecycle
        .remaining_time(attempt_id, user.user_id, user.is_admin())
        .await?;

    Ok(Json(RemainingTimeResponse {
        attempt_id: attempt.id,
        status: attempt.status,
        remaining_seconds: remaining,
        expires_at: attempt.expires_at,
    })
    .into_response())
}
