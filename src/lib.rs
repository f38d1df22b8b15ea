pub mod catalog;
pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use crate::catalog::TestCatalog;
use crate::services::broadcast_service::Broadcaster;
use crate::services::lifecycle_service::AttemptLifecycle;
use crate::store::AttemptStore;
use crate::utils::time::{Clock, SystemClock};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn TestCatalog>,
    pub lifecycle: AttemptLifecycle,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(store: Arc<dyn AttemptStore>, catalog: Arc<dyn TestCatalog>) -> Self {
        Self::with_clock(store, catalog, Arc::new(SystemClock))
    }

    /// The clock drives every deadline decision, so tests inject their own.
    pub fn with_clock(
        store: Arc<dyn AttemptStore>,
        catalog: Arc<dyn TestCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = crate::config::get_config();
        let broadcaster = Broadcaster::new(config.broadcast_capacity);
        let lifecycle = AttemptLifecycle::new(store, catalog.clone(), broadcaster.clone(), clock);

        Self {
            catalog,
            lifecycle,
            broadcaster,
        }
    }
}
