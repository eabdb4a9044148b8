//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module implements the real-time subscription engine: per-connection filter state, the
// registry of live connections with its reverse indexes, and the manager façade that validates
// subscribe/unsubscribe requests and fans events out to matching connections.
//
// | Component            | Description                                                    |
// |----------------------|----------------------------------------------------------------|
// | Connection           | Filters, bounded outbound queue and close signal of one client |
// | Registry             | Live connections plus stream/account/book reverse indexes      |
// | SubscriptionManager  | subscribe, unsubscribe, broadcast_*, add, remove               |
// | ParsedFilter         | Fully validated form of a subscribe/unsubscribe request        |
// | book_matches         | Currency-pair matching for order-book subscriptions            |
//
// Delivery policy: enqueue is `try_send`. A full queue drops the newest event for that
// connection only; a closed queue schedules the connection for removal.
//--------------------------------------------------------------------------------------------------

pub mod connection;
pub mod filter;
pub mod manager;
pub mod matcher;
pub mod registry;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::domain::models::types::{BookSide, ConnectionId};
use crate::domain::services::ledger::LedgerError;
use crate::domain::services::validation::CurrencySpecError;

pub use connection::{
    CloseSignal, Connection, FilterChanges, OutboundQueue, OutboundStream, SendOutcome,
    SubscriptionSet,
};
pub use filter::{FilterMode, ParsedFilter, UrlChange};
pub use manager::{DeliveryReport, SubscribeResult, SubscriptionManager};
pub use matcher::{book_keys, book_matches};
pub use registry::Registry;

/// Errors returned by subscribe/unsubscribe and connection lifecycle calls.
///
/// None of these are produced by the broadcast path: delivery failures are
/// handled internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// A stream name outside the closed set.
    #[error("Unknown stream type: {0}")]
    UnknownStreamType(String),

    /// A malformed address in `accounts` or `accounts_proposed`.
    #[error("Invalid account address: {0}")]
    InvalidAccountAddress(String),

    /// A book spec without `taker_pays`.
    #[error("Book is missing taker_pays")]
    MissingTakerPays,

    /// A book spec without `taker_gets`.
    #[error("Book is missing taker_gets")]
    MissingTakerGets,

    /// One leg of a book spec violates the currency/issuer rules.
    #[error("Invalid {side}: {reason}")]
    InvalidCurrencySpec {
        side: BookSide,
        reason: CurrencySpecError,
    },

    /// A field has the wrong JSON shape.
    #[error("Malformed filter payload: {0}")]
    MalformedFilterPayload(String),

    /// Subscribe/unsubscribe outside a streaming session.
    #[error("Not supported outside a streaming connection")]
    NotSupportedOnThisTransport,

    /// No live connection has this id.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// The connection was torn down while the call was in flight.
    #[error("Connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// A connection with this id is already registered.
    #[error("Duplicate connection id: {0}")]
    DuplicateConnection(ConnectionId),

    /// The ledger collaborator failed to produce the acknowledgment data.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl SubscriptionError {
    /// Error token used on the wire.
    pub fn token(&self) -> &'static str {
        match self {
            Self::UnknownStreamType(_) => "malformedStream",
            Self::InvalidAccountAddress(_) => "actMalformed",
            Self::MissingTakerPays | Self::MissingTakerGets => "invalidParams",
            Self::InvalidCurrencySpec { side, reason } => match (side, reason) {
                (BookSide::TakerPays, CurrencySpecError::IssuerRequired)
                | (BookSide::TakerPays, CurrencySpecError::InvalidIssuer(_))
                | (BookSide::TakerPays, CurrencySpecError::UnexpectedIssuer) => "srcIsrMalformed",
                (BookSide::TakerPays, _) => "srcCurMalformed",
                (BookSide::TakerGets, CurrencySpecError::IssuerRequired)
                | (BookSide::TakerGets, CurrencySpecError::InvalidIssuer(_))
                | (BookSide::TakerGets, CurrencySpecError::UnexpectedIssuer) => "dstIsrMalformed",
                (BookSide::TakerGets, _) => "dstAmtMalformed",
            },
            Self::MalformedFilterPayload(_) => "invalidParams",
            Self::NotSupportedOnThisTransport => "notSupported",
            Self::ConnectionNotFound(_) | Self::ConnectionClosed(_) => "noClient",
            Self::DuplicateConnection(_) | Self::Ledger(_) => "internal",
        }
    }
}

/// Type alias for Result with SubscriptionError
pub type SubscriptionResult<T> = Result<T, SubscriptionError>;
