pub mod admin_routes;
pub mod attempt_routes;
pub mod event_routes;
pub mod health;
