use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::domain::models::types::{BookSpec, CurrencySpec, LedgerSummary};

use super::{LedgerError, LedgerService};

type PairKey = (CurrencySpec, CurrencySpec);

/// Ledger state held in memory.
///
/// The node updates it on every ledger close; readers take a short read lock.
#[derive(Debug)]
pub struct InMemoryLedger {
    summary: RwLock<LedgerSummary>,
    books: RwLock<HashMap<PairKey, Vec<Value>>>,
}

impl InMemoryLedger {
    pub fn new(summary: LedgerSummary) -> Self {
        Self {
            summary: RwLock::new(summary),
            books: RwLock::new(HashMap::new()),
        }
    }

    /// Records a newly closed ledger.
    pub fn close_ledger(&self, summary: LedgerSummary) {
        debug!(ledger_index = summary.ledger_index, "Ledger closed");
        *self.summary.write() = summary;
    }

    /// Replaces the offers for one direction of a book.
    pub fn set_book_offers(&self, taker_gets: CurrencySpec, taker_pays: CurrencySpec, offers: Vec<Value>) {
        self.books.write().insert((taker_gets, taker_pays), offers);
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerSummary::genesis())
    }
}

impl LedgerService for InMemoryLedger {
    fn current_ledger(&self) -> Result<LedgerSummary, LedgerError> {
        Ok(self.summary.read().clone())
    }

    fn book_offers(&self, book: &BookSpec) -> Result<Vec<Value>, LedgerError> {
        let key = (book.taker_gets.clone(), book.taker_pays.clone());
        Ok(self.books.read().get(&key).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ISSUER: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

    #[test]
    fn test_close_ledger_updates_summary() {
        let ledger = InMemoryLedger::default();
        assert_eq!(ledger.current_ledger().unwrap().ledger_index, 1);

        let mut next = LedgerSummary::genesis();
        next.ledger_index = 42;
        ledger.close_ledger(next.clone());
        assert_eq!(ledger.current_ledger().unwrap(), next);
    }

    #[test]
    fn test_book_offers_are_directional() {
        let ledger = InMemoryLedger::default();
        let usd = CurrencySpec::issued("USD", ISSUER);
        ledger.set_book_offers(CurrencySpec::native(), usd.clone(), vec![json!({"Sequence": 1})]);

        let forward = BookSpec::new(CurrencySpec::native(), usd.clone());
        let reverse = BookSpec::new(usd, CurrencySpec::native());

        assert_eq!(ledger.book_offers(&forward).unwrap().len(), 1);
        assert!(ledger.book_offers(&reverse).unwrap().is_empty());
    }
}
