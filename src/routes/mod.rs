pub mod health;
pub mod interview;
pub mod marketplace;
pub mod talent;
pub mod voice_webhook;
