pub mod ai_service;
pub mod listing_service;
pub mod profile_store;
pub mod queue_service;
pub mod reconciliation_service;
pub mod scoring_service;
pub mod session_service;
pub mod status_machine;
pub mod voice_service;
