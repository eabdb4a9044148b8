pub mod events;
pub mod requests;
pub mod types;
