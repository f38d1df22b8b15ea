use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

#[derive(Debug)]
struct Window {
    opened: Instant,
    hits: u32,
}

/// Fixed one-second window shared by every caller of the router it is
/// layered on. Coarse, but enough to keep a runaway client from hammering
/// the attempt endpoints.
#[derive(Clone, Debug)]
pub struct RequestThrottle {
    limit: u32,
    window: Arc<Mutex<Window>>,
}

impl RequestThrottle {
    pub fn new(limit: u32) -> Self {
        Self {
            limit: limit.max(1),
            window: Arc::new(Mutex::new(Window {
                opened: Instant::now(),
                hits: 0,
            })),
        }
    }

    fn try_acquire(&self) -> bool {
        let mut window = self.window.lock().expect("throttle mutex poisoned");
        let now = Instant::now();
        if now.duration_since(window.opened) >= Duration::from_secs(1) {
            window.opened = now;
            window.hits = 0;
        }
        if window.hits < self.limit {
            window.hits += 1;
            true
        } else {
            false
        }
    }
}

pub async fn throttle_middleware(
    State(throttle): State<RequestThrottle>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !throttle.try_acquire() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "message": "Too many requests, slow down"
            })),
        )
            .into_response();
    }
    next.run(req).await
}
