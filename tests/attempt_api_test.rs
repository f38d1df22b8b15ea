use std::env;
use std::sync::{Arc, Once};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::{get, patch, post},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

use assessment_backend::catalog::MemoryTestCatalog;
use assessment_backend::store::MemoryAttemptStore;
use assessment_backend::AppState;

fn init_test_config() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
        env::set_var("JWT_SECRET", "test_secret_key");
        assessment_backend::config::init_config().expect("init config");
    });
}

fn bearer_for(user_id: Uuid, role: Option<&str>) -> String {
    let claims = assessment_backend::middleware::auth::Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        role: role.map(str::to_string),
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret("test_secret_key".as_bytes()),
    )
    .expect("encode token");
    format!("Bearer {}", token)
}

fn fresh_state() -> AppState {
    AppState::new(
        Arc::new(MemoryAttemptStore::new()),
        Arc::new(MemoryTestCatalog::new()),
    )
}

fn app(state: AppState) -> Router {
    let attempt_api = Router::new()
        .route(
            "/api/tests/:test_id/attempts",
            post(assessment_backend::routes::attempt_routes::start_attempt),
        )
        .route(
            "/api/attempts/:id",
            get(assessment_backend::routes::attempt_routes::get_attempt),
        )
        .route(
            "/api/attempts/:id/answer",
            patch(assessment_backend::routes::attempt_routes::submit_answer),
        )
        .route(
            "/api/attempts/:id/complete",
            post(assessment_backend::routes::attempt_routes::complete_attempt),
        )
        .route(
            "/api/attempts/:id/remaining-time",
            get(assessment_backend::routes::attempt_routes::remaining_time),
        )
        .layer(axum::middleware::from_fn(
            assessment_backend::middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            assessment_backend::middleware::rate_limit::RequestThrottle::new(100),
            assessment_backend::middleware::rate_limit::throttle_middleware,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/tests",
            get(assessment_backend::routes::admin_routes::list_tests)
                .post(assessment_backend::routes::admin_routes::create_test),
        )
        .route(
            "/api/admin/tests/:id",
            get(assessment_backend::routes::admin_routes::get_test),
        )
        .route(
            "/api/admin/attempts/live",
            get(assessment_backend::routes::admin_routes::live_attempts),
        )
        .layer(axum::middleware::from_fn(
            assessment_backend::middleware::auth::require_admin,
        ));

    Router::new()
        .merge(attempt_api)
        .merge(admin_api)
        .with_state(state)
}

fn two_question_payload() -> JsonValue {
    json!({
        "title": "Rust Basics",
        "description": "Ownership and borrowing",
        "questions": [
            {
                "text": "What does Box<T> provide?",
                "type": "multiple_choice",
                "points": 2,
                "options": [
                    {"text": "Stack allocation"},
                    {"text": "Heap allocation", "is_correct": true},
                    {"text": "Garbage collection"},
                    {"text": "Reference counting"}
                ]
            },
            {
                "text": "Shared references are immutable",
                "type": "true_false",
                "points": 1,
                "options": [
                    {"text": "True", "is_correct": true},
                    {"text": "False"}
                ]
            }
        ],
        "max_attempts": 2,
        "duration_seconds": 600,
        "is_published": true
    })
}

async fn read_json(resp: axum::response::Response) -> JsonValue {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<JsonValue>,
) -> axum::response::Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", token);
    }
    let req = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(req).await.unwrap()
}

#[tokio::test]
async fn attempt_flow_end_to_end() {
    init_test_config();
    let state = fresh_state();
    let app = app(state);

    let admin = bearer_for(Uuid::new_v4(), Some("admin"));
    let user_id = Uuid::new_v4();
    let user = bearer_for(user_id, None);

    let resp = send(&app, "POST", "/api/admin/tests", Some(&admin), Some(two_question_payload()))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let test = read_json(resp).await;
    assert_eq!(test["max_score"], json!(3));
    let test_id = test["id"].as_str().unwrap().to_string();

    let mc_options = test["questions"][0]["options"].as_array().unwrap();
    let correct_option = mc_options
        .iter()
        .find(|o| o["is_correct"] == json!(true))
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mc_question = test["questions"][0]["id"].as_str().unwrap().to_string();
    let tf_question = test["questions"][1]["id"].as_str().unwrap().to_string();
    let tf_wrong_option = test["questions"][1]["options"]
        .as_array()
        .unwrap()
        .iter()
        .find(|o| o["is_correct"] == json!(false))
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    // Start the attempt. The question snapshot must not leak answer keys.
    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", test_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    assert!(!String::from_utf8_lossy(&bytes).contains("is_correct"));
    let attempt: JsonValue = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(attempt["attempt_number"], json!(1));
    assert_eq!(attempt["status"], json!("in_progress"));
    assert_eq!(attempt["score"], json!(0));
    assert_eq!(attempt["max_score"], json!(3));
    let attempt_id = attempt["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let detail = read_json(resp).await;
    assert_eq!(detail["answers"], json!([]));
    assert!(detail.get("summary").is_none());

    // Correct answer, then a replacement for the same question.
    let resp = send(
        &app,
        "PATCH",
        &format!("/api/attempts/{}/answer", attempt_id),
        Some(&user),
        Some(json!({"question_id": mc_question, "option_id": correct_option})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let saved = read_json(resp).await;
    assert_eq!(saved["saved"], json!(true));
    assert_eq!(saved["answered_count"], json!(1));

    let resp = send(
        &app,
        "PATCH",
        &format!("/api/attempts/{}/answer", attempt_id),
        Some(&user),
        Some(json!({"question_id": mc_question, "option_id": correct_option})),
    )
    .await;
    let saved = read_json(resp).await;
    assert_eq!(saved["answered_count"], json!(1));

    let resp = send(
        &app,
        "PATCH",
        &format!("/api/attempts/{}/answer", attempt_id),
        Some(&user),
        Some(json!({"question_id": tf_question, "option_id": tf_wrong_option})),
    )
    .await;
    let saved = read_json(resp).await;
    assert_eq!(saved["answered_count"], json!(2));

    // Unknown question and unknown option are rejected.
    let resp = send(
        &app,
        "PATCH",
        &format!("/api/attempts/{}/answer", attempt_id),
        Some(&user),
        Some(json!({"question_id": Uuid::new_v4(), "option_id": correct_option})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(resp).await["error"], json!("question_not_found"));

    let resp = send(
        &app,
        "PATCH",
        &format!("/api/attempts/{}/answer", attempt_id),
        Some(&user),
        Some(json!({"question_id": mc_question, "option_id": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(resp).await["error"], json!("invalid_answer"));

    let resp = send(
        &app,
        "GET",
        &format!("/api/attempts/{}/remaining-time", attempt_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let remaining = read_json(resp).await;
    let seconds = remaining["remaining_seconds"].as_i64().unwrap();
    assert!(seconds > 0 && seconds <= 600);

    // Finish: 2 of 3 points.
    let resp = send(
        &app,
        "POST",
        &format!("/api/attempts/{}/complete", attempt_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let completed = read_json(resp).await;
    assert_eq!(completed["attempt"]["status"], json!("completed"));
    assert_eq!(completed["attempt"]["score"], json!(2));
    assert_eq!(completed["attempt"]["max_score"], json!(3));
    assert_eq!(completed["attempt"]["percent_score"], json!("66.67"));
    assert_eq!(
        completed["summary"],
        json!({
            "total_questions": 2,
            "correct_answers": 1,
            "incorrect_answers": 1,
            "unanswered_questions": 0
        })
    );
    let graded_mc = completed["answers"]
        .as_array()
        .unwrap()
        .iter()
        .find(|a| a["question_id"].as_str() == Some(mc_question.as_str()))
        .unwrap();
    assert_eq!(graded_mc["is_correct"], json!(true));
    assert_eq!(graded_mc["points_earned"], json!(2));

    // Completing again is a no-op replay of the same result.
    let resp = send(
        &app,
        "POST",
        &format!("/api/attempts/{}/complete", attempt_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let replay = read_json(resp).await;
    assert_eq!(replay["attempt"]["score"], completed["attempt"]["score"]);
    assert_eq!(
        replay["attempt"]["completed_at"],
        completed["attempt"]["completed_at"]
    );

    // No more answers once terminal.
    let resp = send(
        &app,
        "PATCH",
        &format!("/api/attempts/{}/answer", attempt_id),
        Some(&user),
        Some(json!({"question_id": tf_question, "option_id": tf_wrong_option})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(resp).await["error"], json!("attempt_expired"));

    // Second attempt is numbered 2; a third is over quota.
    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", test_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let second = read_json(resp).await;
    assert_eq!(second["attempt_number"], json!(2));
    let second_id = second["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", test_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(resp).await["error"], json!("already_in_progress"));

    let resp = send(
        &app,
        "POST",
        &format!("/api/attempts/{}/complete", second_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", test_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(resp).await["error"], json!("quota_exceeded"));
}

#[tokio::test]
async fn auth_and_ownership_rules() {
    init_test_config();
    let state = fresh_state();
    let app = app(state);

    let admin = bearer_for(Uuid::new_v4(), Some("admin"));
    let owner_id = Uuid::new_v4();
    let owner = bearer_for(owner_id, None);
    let stranger = bearer_for(Uuid::new_v4(), None);

    let resp = send(&app, "POST", "/api/admin/tests", Some(&admin), Some(two_question_payload()))
        .await;
    let test_id = read_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", test_id),
        None,
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", test_id),
        Some(&owner),
        None,
    )
    .await;
    let attempt_id = read_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(resp).await["error"], json!("access_denied"));

    // An admin may read it, but only the owner can write.
    let resp = send(
        &app,
        "GET",
        &format!("/api/attempts/{}", attempt_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(
        &app,
        "POST",
        &format!("/api/attempts/{}/complete", attempt_id),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = send(&app, "GET", "/api/admin/attempts/live", Some(&owner), None).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(resp).await["error"], json!("forbidden"));

    let resp = send(&app, "GET", "/api/admin/attempts/live", Some(&admin), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let live = read_json(resp).await;
    assert_eq!(live["total"], json!(1));
    assert_eq!(live["items"][0]["user_id"], json!(owner_id.to_string()));
}

#[tokio::test]
async fn catalog_validation_and_availability() {
    init_test_config();
    let state = fresh_state();
    let app = app(state);

    let admin = bearer_for(Uuid::new_v4(), Some("admin"));
    let user = bearer_for(Uuid::new_v4(), None);

    let resp = send(
        &app,
        "POST",
        "/api/admin/tests",
        Some(&admin),
        Some(json!({
            "title": "Empty",
            "questions": [],
            "max_attempts": 1,
            "is_published": true
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(
        &app,
        "POST",
        "/api/admin/tests",
        Some(&admin),
        Some(json!({
            "title": "Two keys",
            "questions": [{
                "text": "Pick one",
                "type": "multiple_choice",
                "options": [
                    {"text": "A", "is_correct": true},
                    {"text": "B", "is_correct": true}
                ]
            }],
            "max_attempts": 1,
            "is_published": true
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json(resp).await["error"], json!("bad_request"));

    // Unpublished tests are invisible to takers.
    let mut unpublished = two_question_payload();
    unpublished["is_published"] = json!(false);
    let resp = send(&app, "POST", "/api/admin/tests", Some(&admin), Some(unpublished)).await;
    let hidden_id = read_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", hidden_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(resp).await["error"], json!("not_available"));

    // Availability window has not opened yet.
    let mut future = two_question_payload();
    future["available_from"] = json!(chrono::Utc::now() + chrono::Duration::hours(2));
    let resp = send(&app, "POST", "/api/admin/tests", Some(&admin), Some(future)).await;
    let future_id = read_json(resp).await["id"].as_str().unwrap().to_string();

    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", future_id),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_json(resp).await["error"], json!("not_available"));

    let resp = send(
        &app,
        "POST",
        &format!("/api/tests/{}/attempts", Uuid::new_v4()),
        Some(&user),
        None,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(resp).await["error"], json!("test_not_found"));
}
