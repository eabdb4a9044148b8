//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Read-only view of ledger state needed by the subscription engine: the header of the last
// closed ledger (returned with every subscribe acknowledgment) and the current offers of a
// book (returned when a book is subscribed with `snapshot`).
//
// | Component        | Description                                              |
// |------------------|----------------------------------------------------------|
// | LedgerService    | Trait the engine queries; implementations must be Sync   |
// | InMemoryLedger   | Lock-protected state fed by the node or by tests         |
// | LedgerError      | Failures surfaced to subscribe callers                   |
//--------------------------------------------------------------------------------------------------

mod in_memory;

pub use in_memory::InMemoryLedger;

use serde_json::Value;
use thiserror::Error;

use crate::domain::models::types::{BookSpec, LedgerSummary};

/// Ledger state queried while acknowledging a subscribe.
pub trait LedgerService: Send + Sync {
    /// Header of the most recently closed ledger.
    ///
    /// # Returns
    /// * `Ok(LedgerSummary)` - The current summary
    /// * `Err(LedgerError)` - If no ledger is available
    fn current_ledger(&self) -> Result<LedgerSummary, LedgerError>;

    /// Current offers in one direction of a book.
    ///
    /// # Arguments
    /// * `book` - The pair to read; only `taker_gets`/`taker_pays` are used
    ///
    /// # Returns
    /// * `Ok(Vec<Value>)` - Offers, best quality first
    /// * `Err(LedgerError)` - If the book could not be read
    fn book_offers(&self, book: &BookSpec) -> Result<Vec<Value>, LedgerError>;
}

/// Errors from the ledger collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// No closed ledger is available yet.
    #[error("No closed ledger available")]
    NoClosedLedger,

    /// The book could not be read.
    #[error("Book unavailable: {0}")]
    BookUnavailable(String),
}

#[cfg(test)]
use mockall::*;

#[cfg(test)]
mock! {
    pub LedgerService {}

    impl LedgerService for LedgerService {
        fn current_ledger(&self) -> Result<LedgerSummary, LedgerError>;

        fn book_offers(&self, book: &BookSpec) -> Result<Vec<Value>, LedgerError>;
    }
}
