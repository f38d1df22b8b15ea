pub mod attempt_dto;
pub mod catalog_dto;
