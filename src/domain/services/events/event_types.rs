//--------------------------------------------------------------------------------------------------
// STRUCTS & ENUMS
//--------------------------------------------------------------------------------------------------
// | Name        | Description                               |
// |-------------|-------------------------------------------|
// | EventError  | Error types for event publishing          |
//--------------------------------------------------------------------------------------------------

use thiserror::Error;

/// Errors that can occur while publishing events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event could not be encoded
    #[error("Failed to serialize event: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Type alias for Result with EventError
pub type EventResult<T> = Result<T, EventError>;
