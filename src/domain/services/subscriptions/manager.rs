use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::models::requests::FilterRequest;
use crate::domain::models::types::{
    BookSpec, BookTrade, ConnectionId, LedgerSummary, StreamKind, UrlCallback,
};
use crate::domain::services::ledger::LedgerService;

use super::connection::{Connection, OutboundStream, SendOutcome, SubscriptionSet};
use super::filter::{FilterMode, ParsedFilter};
use super::registry::Registry;
use super::{SubscriptionError, SubscriptionResult};

/// Acknowledgment of a successful subscribe.
///
/// Serializes as the flat ledger header, plus the book state when a
/// subscribed book asked for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeResult {
    #[serde(flatten)]
    pub ledger: LedgerSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offers: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asks: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bids: Option<Vec<Value>>,
}

impl SubscribeResult {
    fn new(ledger: LedgerSummary) -> Self {
        Self {
            ledger,
            offers: None,
            asks: None,
            bids: None,
        }
    }

    fn add_snapshot(&mut self, book: &BookSpec, ledger: &dyn LedgerService) -> SubscriptionResult<()> {
        if book.both {
            let reversed = BookSpec::new(book.taker_pays.clone(), book.taker_gets.clone());
            self.asks.get_or_insert_with(Vec::new).extend(ledger.book_offers(book)?);
            self.bids.get_or_insert_with(Vec::new).extend(ledger.book_offers(&reversed)?);
        } else {
            self.offers.get_or_insert_with(Vec::new).extend(ledger.book_offers(book)?);
        }
        Ok(())
    }
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections whose filters matched.
    pub matched: usize,
    pub enqueued: usize,
    /// Dropped because the connection's queue was full.
    pub dropped: usize,
    /// Found closed; these connections were removed.
    pub closed: usize,
    /// URL callbacks of the matched connections that are still open.
    pub callbacks: Vec<UrlCallback>,
}

/// Entry point for transports and event producers.
///
/// One instance is built at startup and shared as `Arc<SubscriptionManager>`.
pub struct SubscriptionManager {
    registry: Registry,
    ledger: Arc<dyn LedgerService>,
    queue_capacity: usize,
}

impl SubscriptionManager {
    /// Creates a manager.
    ///
    /// # Arguments
    /// * `ledger` - Source of the subscribe acknowledgment and book snapshots
    /// * `queue_capacity` - Bound of each connection's outbound queue
    pub fn new(ledger: Arc<dyn LedgerService>, queue_capacity: usize) -> Self {
        Self {
            registry: Registry::new(),
            ledger,
            queue_capacity: queue_capacity.max(1),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    //----------------------------------------------------------------------------------------------
    //  Lifecycle
    //----------------------------------------------------------------------------------------------

    /// Registers a connection created by a transport.
    pub fn add(&self, connection: Connection) -> SubscriptionResult<Arc<Connection>> {
        let connection = Arc::new(connection);
        self.registry.insert(connection.clone())?;
        info!(connection_id = %connection.id(), "Connection added");
        Ok(connection)
    }

    /// Creates a connection with the configured queue bound and registers it.
    ///
    /// # Returns
    /// The registered connection and the stream its transport drains.
    pub fn open_connection(
        &self,
        id: ConnectionId,
    ) -> SubscriptionResult<(Arc<Connection>, OutboundStream)> {
        let (connection, stream) = Connection::open(id, self.queue_capacity);
        Ok((self.add(connection)?, stream))
    }

    /// Tears a connection down: fires its close signal and purges every
    /// index entry. Returns false if the id was not registered.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        match self.registry.remove(id) {
            Some(connection) => {
                info!(
                    connection_id = %id,
                    delivered = connection.delivered_events(),
                    dropped = connection.dropped_events(),
                    "Connection removed"
                );
                true
            }
            None => false,
        }
    }

    //----------------------------------------------------------------------------------------------
    //  Subscribe / unsubscribe
    //----------------------------------------------------------------------------------------------

    /// Adds filters to a connection.
    ///
    /// The request is validated and the acknowledgment data is read before
    /// the connection is touched; the mutation itself is one critical section.
    ///
    /// # Arguments
    /// * `id` - The connection to mutate
    /// * `request` - Raw subscribe request
    ///
    /// # Returns
    /// * `Ok(SubscribeResult)` - Current ledger header and any book snapshots
    /// * `Err(SubscriptionError)` - Nothing was changed
    pub fn subscribe(
        &self,
        id: &ConnectionId,
        request: &FilterRequest,
    ) -> SubscriptionResult<SubscribeResult> {
        let filter = ParsedFilter::parse(request, FilterMode::Subscribe)?;
        let connection = self
            .registry
            .get(id)
            .ok_or_else(|| SubscriptionError::ConnectionNotFound(id.clone()))?;

        let mut result = SubscribeResult::new(self.ledger.current_ledger()?);
        for book in filter.books.iter().filter(|book| book.snapshot) {
            result.add_snapshot(book, self.ledger.as_ref())?;
        }

        {
            let mut filters = connection.lock_filters();
            if connection.is_closed() {
                return Err(SubscriptionError::ConnectionClosed(id.clone()));
            }
            let changes = filters.apply_subscribe(&filter);
            self.registry.apply_changes(id, &changes);
        }

        debug!(
            connection_id = %id,
            streams = filter.streams.len(),
            accounts = filter.accounts.len(),
            accounts_proposed = filter.accounts_proposed.len(),
            books = filter.books.len(),
            "Subscribed"
        );
        Ok(result)
    }

    /// Removes filters from a connection. Targets that were never subscribed
    /// are ignored; malformed targets are still rejected.
    pub fn unsubscribe(&self, id: &ConnectionId, request: &FilterRequest) -> SubscriptionResult<()> {
        let filter = ParsedFilter::parse(request, FilterMode::Unsubscribe)?;
        let connection = self
            .registry
            .get(id)
            .ok_or_else(|| SubscriptionError::ConnectionNotFound(id.clone()))?;

        let mut filters = connection.lock_filters();
        if connection.is_closed() {
            return Err(SubscriptionError::ConnectionClosed(id.clone()));
        }
        let changes = filters.apply_unsubscribe(&filter);
        self.registry.apply_changes(id, &changes);
        drop(filters);

        debug!(connection_id = %id, "Unsubscribed");
        Ok(())
    }

    //----------------------------------------------------------------------------------------------
    //  Broadcast
    //----------------------------------------------------------------------------------------------

    /// Delivers a payload to every subscriber of a stream.
    pub fn broadcast_to_stream(&self, kind: StreamKind, payload: Bytes) -> DeliveryReport {
        let ids = self.registry.stream_subscribers(kind);
        self.deliver(self.registry.resolve(&ids), payload)
    }

    /// Delivers a validated-transaction payload to connections watching any
    /// of `accounts`. A connection watching several of them receives it once.
    pub fn broadcast_to_accounts(&self, payload: Bytes, accounts: &[String]) -> DeliveryReport {
        let ids = self.registry.account_subscribers(accounts, false);
        self.deliver(self.registry.resolve(&ids), payload)
    }

    /// Same as [`broadcast_to_accounts`](Self::broadcast_to_accounts) for the
    /// `accounts_proposed` filters.
    pub fn broadcast_to_proposed_accounts(&self, payload: Bytes, accounts: &[String]) -> DeliveryReport {
        let ids = self.registry.account_subscribers(accounts, true);
        self.deliver(self.registry.resolve(&ids), payload)
    }

    /// Delivers a payload to connections with a book matching the trade.
    pub fn broadcast_to_order_books(&self, payload: Bytes, trade: &BookTrade) -> DeliveryReport {
        let connections = self.book_matches(std::slice::from_ref(trade));
        self.deliver(connections, payload)
    }

    /// Delivers a validated transaction to the union of `transactions`
    /// stream subscribers, account subscribers and matching book
    /// subscribers. Each connection receives the payload at most once.
    ///
    /// # Arguments
    /// * `payload` - The serialized event
    /// * `accounts` - Accounts the transaction affected
    /// * `trades` - Pairs of the offers it executed
    pub fn broadcast_transaction(
        &self,
        payload: Bytes,
        accounts: &[String],
        trades: &[BookTrade],
    ) -> DeliveryReport {
        let mut ids: HashSet<ConnectionId> = self
            .registry
            .stream_subscribers(StreamKind::Transactions)
            .into_iter()
            .collect();
        ids.extend(self.registry.account_subscribers(accounts, false));

        let mut connections = self.registry.resolve(&ids);
        connections.extend(
            self.book_matches(trades)
                .into_iter()
                .filter(|connection| !ids.contains(connection.id())),
        );
        self.deliver(connections, payload)
    }

    fn book_matches(&self, trades: &[BookTrade]) -> Vec<Arc<Connection>> {
        if trades.is_empty() {
            return Vec::new();
        }
        let ids = self.registry.book_subscribers(trades);
        self.registry.resolve(&ids)
    }

    fn deliver(&self, connections: Vec<Arc<Connection>>, payload: Bytes) -> DeliveryReport {
        let mut report = DeliveryReport {
            matched: connections.len(),
            ..Default::default()
        };
        let mut closed = Vec::new();

        for connection in &connections {
            match connection.enqueue(payload.clone()) {
                SendOutcome::Enqueued => report.enqueued += 1,
                SendOutcome::Dropped => {
                    report.dropped += 1;
                    warn!(
                        connection_id = %connection.id(),
                        capacity = connection.queue_capacity(),
                        dropped_total = connection.dropped_events(),
                        "Outbound queue full, dropping event"
                    );
                }
                SendOutcome::Closed => {
                    report.closed += 1;
                    closed.push(connection.id().clone());
                    continue;
                }
            }
            if let Some(callback) = connection.lock_filters().url_callback() {
                report.callbacks.push(callback.clone());
            }
        }

        for id in closed {
            debug!(connection_id = %id, "Outbound queue closed, removing connection");
            self.remove(&id);
        }
        report
    }

    //----------------------------------------------------------------------------------------------
    //  Queries
    //----------------------------------------------------------------------------------------------

    /// Every connection with a URL callback.
    pub fn url_callbacks(&self) -> Vec<(ConnectionId, UrlCallback)> {
        self.registry
            .snapshot()
            .into_iter()
            .filter_map(|connection| {
                let callback = connection.lock_filters().url_callback().cloned()?;
                Some((connection.id().clone(), callback))
            })
            .collect()
    }

    /// Copy of a connection's filters.
    pub fn subscriptions(&self, id: &ConnectionId) -> Option<SubscriptionSet> {
        self.registry.get(id).map(|connection| connection.subscriptions())
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.registry.get(id)
    }

    pub fn connection_count(&self) -> usize {
        self.registry.connection_count()
    }

    pub fn stream_subscriber_count(&self, kind: StreamKind) -> usize {
        self.registry.stream_subscriber_count(kind)
    }

    pub fn account_subscriber_count(&self, account: &str) -> usize {
        self.registry.account_subscriber_count(account, false)
    }

    pub fn proposed_account_subscriber_count(&self, account: &str) -> usize {
        self.registry.account_subscriber_count(account, true)
    }

    /// Connections a trade on this pair would reach.
    pub fn book_subscriber_count(&self, trade: &BookTrade) -> usize {
        self.registry.book_subscriber_count(trade)
    }
}
