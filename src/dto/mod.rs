pub mod listing_dto;
pub mod session_dto;
pub mod talent_dto;
