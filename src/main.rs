use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assessment_backend::catalog::{MemoryTestCatalog, PgTestCatalog, TestCatalog};
use assessment_backend::services::sweeper_service::ExpirySweeper;
use assessment_backend::store::{AttemptStore, MemoryAttemptStore, PgAttemptStore};
use assessment_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware, routes, AppState,
};
use axum::{
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let (store, catalog): (Arc<dyn AttemptStore>, Arc<dyn TestCatalog>) =
        match &config.database_url {
            Some(_) => {
                let pool = create_pool().await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                info!("Using the Postgres attempt store");
                (
                    Arc::new(PgAttemptStore::new(pool.clone())),
                    Arc::new(PgTestCatalog::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL is not set, falling back to the in-memory store");
                (
                    Arc::new(MemoryAttemptStore::new()),
                    Arc::new(MemoryTestCatalog::new()),
                )
            }
        };

    let app_state = AppState::new(store, catalog);

    {
        let sweeper = ExpirySweeper::new(
            app_state.lifecycle.clone(),
            app_state.broadcaster.clone(),
            Duration::from_secs(config.sweep_interval_seconds),
        );
        tokio::spawn(sweeper.run());
    }

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let attempt_api = Router::new()
        .route(
            "/api/tests/:test_id/attempts",
            post(routes::attempt_routes::start_attempt),
        )
        .route(
            "/api/attempts/:id",
            get(routes::attempt_routes::get_attempt),
        )
        .route(
            "/api/attempts/:id/answer",
            patch(routes::attempt_routes::submit_answer),
        )
        .route(
            "/api/attempts/:id/complete",
            post(routes::attempt_routes::complete_attempt),
        )
        .route(
            "/api/attempts/:id/remaining-time",
            get(routes::attempt_routes::remaining_time),
        )
        .route(
            "/api/attempts/:id/events",
            get(routes::event_routes::attempt_events),
        )
        .layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ))
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::RequestThrottle::new(config.api_rps),
            middleware::rate_limit::throttle_middleware,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/tests",
            get(routes::admin_routes::list_tests).post(routes::admin_routes::create_test),
        )
        .route("/api/admin/tests/:id", get(routes::admin_routes::get_test))
        .route(
            "/api/admin/attempts/live",
            get(routes::admin_routes::live_attempts),
        )
        .route(
            "/api/admin/events",
            get(routes::event_routes::admin_events),
        )
        .layer(axum::middleware::from_fn(middleware::auth::require_admin));

    let app = base_routes
        .merge(attempt_api)
        .merge(admin_api)
        .with_state(app_state)
        .layer(middleware::cors::permissive_cors())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
