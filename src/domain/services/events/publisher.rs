//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name            | Description                                   | Key Methods                 |
// |-----------------|-----------------------------------------------|-----------------------------|
// | EventPublisher  | Encodes typed events once and routes them     | publish, publish_transaction|
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::domain::models::events::{StreamEvent, TransactionEvent};
use crate::domain::models::types::BookTrade;
use crate::domain::services::subscriptions::{DeliveryReport, SubscriptionManager};
use crate::domain::services::webhook::WebhookDispatcher;

use super::event_types::EventResult;

/// Transaction payload with the same `type` tag as `StreamEvent::Transaction`,
/// encoded from a borrow.
#[derive(Serialize)]
struct TaggedTransaction<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    body: &'a TransactionEvent,
}

/// Producer-side entry point: the ledger layer hands typed events here.
///
/// Each event is serialized exactly once and the same bytes are enqueued on
/// every matching connection.
#[derive(Clone)]
pub struct EventPublisher {
    manager: Arc<SubscriptionManager>,
    webhooks: Option<WebhookDispatcher>,
}

impl EventPublisher {
    pub fn new(manager: Arc<SubscriptionManager>) -> Self {
        Self {
            manager,
            webhooks: None,
        }
    }

    /// Also forward every delivered payload to the URL callbacks of the
    /// matched connections.
    pub fn with_webhooks(mut self, dispatcher: WebhookDispatcher) -> Self {
        self.webhooks = Some(dispatcher);
        self
    }

    /// Publishes an event on its stream.
    ///
    /// Transactions published this way reach only `transactions` stream
    /// subscribers; use [`publish_transaction`](Self::publish_transaction) to
    /// also reach account and book subscribers.
    ///
    /// # Arguments
    /// * `event` - The event to publish
    ///
    /// # Returns
    /// * `Ok(DeliveryReport)` - What happened to the payload
    /// * `Err(EventError)` - If the event could not be encoded
    pub fn publish(&self, event: &StreamEvent) -> EventResult<DeliveryReport> {
        let payload = encode(event)?;
        let report = self.manager.broadcast_to_stream(event.stream(), payload.clone());
        debug!(stream = %event.stream(), matched = report.matched, "Published event");
        self.forward_to_webhooks(payload, &report);
        Ok(report)
    }

    /// Publishes a validated transaction to the `transactions` stream, to
    /// subscribers of any affected account and to subscribers of any book
    /// the transaction traded in. Each connection receives it once.
    ///
    /// # Arguments
    /// * `transaction` - The validated transaction
    /// * `affected_accounts` - Accounts the transaction touched
    /// * `trades` - Currency pairs of the offers it consumed
    pub fn publish_transaction(
        &self,
        transaction: &TransactionEvent,
        affected_accounts: &[String],
        trades: &[BookTrade],
    ) -> EventResult<DeliveryReport> {
        let payload = encode(&TaggedTransaction {
            kind: "transaction",
            body: transaction,
        })?;
        let report = self
            .manager
            .broadcast_transaction(payload.clone(), affected_accounts, trades);
        debug!(
            accounts = affected_accounts.len(),
            trades = trades.len(),
            matched = report.matched,
            "Published transaction"
        );
        self.forward_to_webhooks(payload, &report);
        Ok(report)
    }

    /// Publishes a proposed (not yet validated) transaction to
    /// `accounts_proposed` subscribers only.
    pub fn publish_proposed_transaction(
        &self,
        transaction: &TransactionEvent,
        affected_accounts: &[String],
    ) -> EventResult<DeliveryReport> {
        let payload = encode(&TaggedTransaction {
            kind: "transaction",
            body: transaction,
        })?;
        let report = self
            .manager
            .broadcast_to_proposed_accounts(payload.clone(), affected_accounts);
        self.forward_to_webhooks(payload, &report);
        Ok(report)
    }

    fn forward_to_webhooks(&self, payload: Bytes, report: &DeliveryReport) {
        let Some(dispatcher) = &self.webhooks else {
            return;
        };
        if report.callbacks.is_empty() {
            return;
        }

        match Handle::try_current() {
            Ok(handle) => {
                let dispatcher = dispatcher.clone();
                let callbacks = report.callbacks.clone();
                handle.spawn(async move {
                    dispatcher.dispatch(payload, callbacks).await;
                });
            }
            Err(_) => warn!(
                callbacks = report.callbacks.len(),
                "No async runtime available, skipping webhook delivery"
            ),
        }
    }
}

fn encode<T: Serialize>(event: &T) -> EventResult<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(event)?))
}
