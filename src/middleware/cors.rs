use axum::http::Method;
use tower_http::cors::{Any, CorsLayer};

/// Browser test-takers call the API from another origin, and the event
/// stream's content type must be visible to the page.
pub fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(Any)
        .allow_origin(Any)
        .expose_headers(Any)
}
