pub mod caller;
pub mod profile;
pub mod report;
pub mod scoring_job;
pub mod transcript;
