//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Producer side of the subscription engine. The ledger layer hands typed events to the
// publisher, which encodes them once and routes the bytes through the subscription manager.
//
// | Component       | Description                                                   |
// |-----------------|---------------------------------------------------------------|
// | EventPublisher  | Encodes events and picks the broadcast for each event kind    |
// | EventError      | Encoding failures                                             |
//--------------------------------------------------------------------------------------------------

mod event_types;
mod publisher;


// Re-exports
pub use event_types::{EventError, EventResult};
pub use publisher::EventPublisher;
