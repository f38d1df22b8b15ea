pub mod broadcast_service;
pub mod grading_service;
pub mod lifecycle_service;
pub mod quota;
pub mod sweeper_service;
