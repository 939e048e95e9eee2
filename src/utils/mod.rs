pub mod signature;
pub mod time;
