//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module defines the core data types of the subscription engine: stream kinds, currency and
// book specifications, per-connection subscription entries and the ledger summary returned to
// subscribers.
//
// | Section            | Description                                                      |
// |--------------------|------------------------------------------------------------------|
// | ENUMS              | StreamKind, SubscriptionKind, SubscriptionConfig, BookSide.      |
// | STRUCTS            | ConnectionId, CurrencySpec, BookSpec, BookTrade, UrlCallback...  |
// | TESTS              | Contains unit tests for the defined types.                       |
//--------------------------------------------------------------------------------------------------

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Currency code of the network's native asset.
pub const NATIVE_CURRENCY: &str = "XRP";

//--------------------------------------------------------------------------------------------------
//  ENUMS
//--------------------------------------------------------------------------------------------------
// | Name               | Description                                              |
// |--------------------|----------------------------------------------------------|
// | StreamKind         | Closed set of topic streams a connection can follow.     |
// | SubscriptionKind   | Key of one entry in a connection's subscription map.     |
// | SubscriptionConfig | Filter parameters carried by a subscription entry.       |
// | BookSide           | Identifies the leg of a book spec (for error reporting). |
//--------------------------------------------------------------------------------------------------

/// Topic streams. This is a closed enumeration: any other name is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Ledger close notifications.
    Ledger,
    /// Every validated transaction.
    Transactions,
    /// Validation messages received from validators.
    Validations,
    /// Validator manifests.
    Manifests,
    /// Peer status changes.
    PeerStatus,
    /// Consensus phase changes.
    Consensus,
}

impl StreamKind {
    /// Every known stream kind, in wire order.
    pub const ALL: [StreamKind; 6] = [
        Self::Ledger,
        Self::Transactions,
        Self::Validations,
        Self::Manifests,
        Self::PeerStatus,
        Self::Consensus,
    ];

    /// Returns the wire name of the stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ledger => "ledger",
            Self::Transactions => "transactions",
            Self::Validations => "validations",
            Self::Manifests => "manifests",
            Self::PeerStatus => "peer_status",
            Self::Consensus => "consensus",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stream name is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStream(pub String);

impl FromStr for StreamKind {
    type Err = UnknownStream;

    // Matching is exact: no case folding, no aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownStream(s.to_string()))
    }
}

/// Key of a subscription entry. A connection holds at most one entry per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriptionKind {
    Stream(StreamKind),
    Accounts,
    AccountsProposed,
    OrderBooks,
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream(kind) => write!(f, "{}", kind),
            Self::Accounts => f.write_str("accounts"),
            Self::AccountsProposed => f.write_str("accounts_proposed"),
            Self::OrderBooks => f.write_str("order_books"),
        }
    }
}

/// Filter parameters of a subscription entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionConfig {
    /// Presence alone is the filter.
    Stream,
    /// Validated transactions touching any of these accounts.
    Accounts(HashSet<String>),
    /// Proposed transactions touching any of these accounts.
    AccountsProposed(HashSet<String>),
    /// Book specs in subscription order. Duplicates are allowed.
    OrderBooks(Vec<BookSpec>),
}

/// Leg of a book spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSide {
    TakerGets,
    TakerPays,
}

impl BookSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TakerGets => "taker_gets",
            Self::TakerPays => "taker_pays",
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------------------------------------------------------------------
//  STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name          | Description                                                   |
// |---------------|---------------------------------------------------------------|
// | ConnectionId  | Opaque, transport-assigned connection identifier.             |
// | CurrencySpec  | Currency code plus issuer (absent for the native asset).      |
// | BookSpec      | Order-book filter with snapshot/both flags.                   |
// | BookTrade     | The currency pair of an executed trade.                       |
// | UrlCallback   | Webhook target with optional basic-auth credentials.          |
// | LedgerSummary | Header fields of the current ledger.                          |
//--------------------------------------------------------------------------------------------------

/// Opaque identifier of a streaming connection, stable for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A currency, qualified by its issuer unless it is the native asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencySpec {
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl CurrencySpec {
    /// The native asset.
    pub fn native() -> Self {
        Self {
            currency: NATIVE_CURRENCY.to_string(),
            issuer: None,
        }
    }

    /// An issued currency.
    pub fn issued(currency: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            issuer: Some(issuer.into()),
        }
    }

    pub fn is_native(&self) -> bool {
        self.currency == NATIVE_CURRENCY
    }
}

impl fmt::Display for CurrencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.issuer {
            Some(issuer) => write!(f, "{}/{}", self.currency, issuer),
            None => f.write_str(&self.currency),
        }
    }
}

/// Order-book subscription filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSpec {
    pub taker_gets: CurrencySpec,
    pub taker_pays: CurrencySpec,
    /// Return the current book state with the subscribe acknowledgment.
    #[serde(default)]
    pub snapshot: bool,
    /// Match trades in either direction of the pair.
    #[serde(default)]
    pub both: bool,
}

impl BookSpec {
    pub fn new(taker_gets: CurrencySpec, taker_pays: CurrencySpec) -> Self {
        Self {
            taker_gets,
            taker_pays,
            snapshot: false,
            both: false,
        }
    }

    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn with_both(mut self, both: bool) -> Self {
        self.both = both;
        self
    }

    /// True if both specs name the same (taker_gets, taker_pays) pair, flags ignored.
    pub fn same_pair(&self, other: &BookSpec) -> bool {
        self.taker_gets == other.taker_gets && self.taker_pays == other.taker_pays
    }
}

/// The currency pair of an executed trade, as seen from the taker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookTrade {
    pub taker_gets: CurrencySpec,
    pub taker_pays: CurrencySpec,
}

impl BookTrade {
    pub fn new(taker_gets: CurrencySpec, taker_pays: CurrencySpec) -> Self {
        Self {
            taker_gets,
            taker_pays,
        }
    }

    /// The same trade seen from the other side of the book.
    pub fn reversed(&self) -> Self {
        Self {
            taker_gets: self.taker_pays.clone(),
            taker_pays: self.taker_gets.clone(),
        }
    }
}

/// Webhook target for out-of-band delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlCallback {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Header fields of the most recently closed ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub ledger_index: u32,
    pub ledger_hash: String,
    /// Close time, in seconds since the network epoch.
    pub ledger_time: u32,
    pub fee_base: u64,
    pub reserve_base: u64,
    pub reserve_inc: u64,
}

impl LedgerSummary {
    /// Summary used before the first ledger closes.
    pub fn genesis() -> Self {
        Self {
            ledger_index: 1,
            ledger_hash: "0".repeat(64),
            ledger_time: 0,
            fee_base: 10,
            reserve_base: 10_000_000,
            reserve_inc: 2_000_000,
        }
    }
}
