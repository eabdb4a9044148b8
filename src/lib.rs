// Expose the modules
pub mod api;
pub mod config;
pub mod domain;

// Re-export key types for easier usage
pub use api::{Api, AppState};
pub use config::Config;
pub use domain::models::events::{StreamEvent, TransactionEvent};
pub use domain::models::requests::{FilterRequest, SubscribeRequest, UnsubscribeRequest};
pub use domain::models::types::{
    BookSpec, BookTrade, ConnectionId, CurrencySpec, LedgerSummary, StreamKind, UrlCallback,
};
pub use domain::services::events::{EventError, EventPublisher, EventResult};
pub use domain::services::ledger::{InMemoryLedger, LedgerError, LedgerService};
pub use domain::services::subscriptions::{
    book_matches, Connection, DeliveryReport, OutboundStream, SubscribeResult,
    SubscriptionError, SubscriptionManager,
};
pub use domain::services::validation::is_valid_address;
pub use domain::services::webhook::WebhookDispatcher;
