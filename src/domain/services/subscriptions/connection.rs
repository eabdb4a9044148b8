//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name             | Description                                         | Key Methods         |
// |------------------|-----------------------------------------------------|---------------------|
// | Connection       | Per-client session state                            | open, enqueue, close|
// | SubscriptionSet  | Map of subscription kind to filter config           | apply_subscribe     |
// | FilterChanges    | What a mutation added/removed (feeds the indexes)   |                     |
// | OutboundQueue    | Bounded, non-blocking sender half                   | try_enqueue         |
// | OutboundStream   | Receiver half drained by the transport              | recv, try_recv      |
// | CloseSignal      | Single-use teardown notification                    | fire, subscribe     |
//--------------------------------------------------------------------------------------------------

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::models::types::{
    BookSpec, BookTrade, ConnectionId, StreamKind, SubscriptionConfig, SubscriptionKind, UrlCallback,
};

use super::filter::{ParsedFilter, UrlChange};
use super::matcher::{book_keys, book_matches};

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The payload is queued for the transport.
    Enqueued,
    /// The queue was full; the payload was discarded.
    Dropped,
    /// The connection is torn down or its consumer is gone.
    Closed,
}

//--------------------------------------------------------------------------------------------------
//  SubscriptionSet
//--------------------------------------------------------------------------------------------------

/// The filters held by one connection.
///
/// Account and book entries are removed as soon as they become empty, so a
/// present kind always carries a non-empty filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    entries: BTreeMap<SubscriptionKind, SubscriptionConfig>,
    url_callback: Option<UrlCallback>,
}

/// Net effect of one mutation, used to keep the registry indexes in step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChanges {
    pub added_streams: Vec<StreamKind>,
    pub removed_streams: Vec<StreamKind>,
    pub added_accounts: Vec<String>,
    pub removed_accounts: Vec<String>,
    pub added_proposed: Vec<String>,
    pub removed_proposed: Vec<String>,
    /// One entry per book key gained; duplicates are kept so the index can count them.
    pub books_added: Vec<BookTrade>,
    pub books_removed: Vec<BookTrade>,
}

impl FilterChanges {
    pub fn is_empty(&self) -> bool {
        self == &FilterChanges::default()
    }
}

impl SubscriptionSet {
    pub fn get(&self, kind: SubscriptionKind) -> Option<&SubscriptionConfig> {
        self.entries.get(&kind)
    }

    pub fn kinds(&self) -> Vec<SubscriptionKind> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_stream(&self, kind: StreamKind) -> bool {
        self.entries.contains_key(&SubscriptionKind::Stream(kind))
    }

    pub fn accounts(&self) -> Option<&HashSet<String>> {
        match self.entries.get(&SubscriptionKind::Accounts) {
            Some(SubscriptionConfig::Accounts(set)) => Some(set),
            _ => None,
        }
    }

    pub fn accounts_proposed(&self) -> Option<&HashSet<String>> {
        match self.entries.get(&SubscriptionKind::AccountsProposed) {
            Some(SubscriptionConfig::AccountsProposed(set)) => Some(set),
            _ => None,
        }
    }

    pub fn books(&self) -> &[BookSpec] {
        match self.entries.get(&SubscriptionKind::OrderBooks) {
            Some(SubscriptionConfig::OrderBooks(books)) => books,
            _ => &[],
        }
    }

    /// True if any subscribed book matches the trade.
    pub fn matches_trade(&self, trade: &BookTrade) -> bool {
        self.books().iter().any(|spec| book_matches(trade, spec))
    }

    pub fn url_callback(&self) -> Option<&UrlCallback> {
        self.url_callback.as_ref()
    }

    /// Applies a validated subscribe request. Streams and accounts are
    /// unioned in, books are appended, a URL callback replaces the old one.
    pub fn apply_subscribe(&mut self, filter: &ParsedFilter) -> FilterChanges {
        let mut changes = FilterChanges::default();

        for stream in &filter.streams {
            if self
                .entries
                .insert(SubscriptionKind::Stream(*stream), SubscriptionConfig::Stream)
                .is_none()
            {
                changes.added_streams.push(*stream);
            }
        }

        changes.added_accounts =
            self.insert_accounts(SubscriptionKind::Accounts, &filter.accounts);
        changes.added_proposed =
            self.insert_accounts(SubscriptionKind::AccountsProposed, &filter.accounts_proposed);

        if !filter.books.is_empty() {
            let entry = self
                .entries
                .entry(SubscriptionKind::OrderBooks)
                .or_insert_with(|| SubscriptionConfig::OrderBooks(Vec::new()));
            if let SubscriptionConfig::OrderBooks(books) = entry {
                books.extend(filter.books.iter().cloned());
                changes.books_added = filter.books.iter().flat_map(book_keys).collect();
            }
        }

        if let UrlChange::Set(callback) = &filter.url {
            self.url_callback = Some(callback.clone());
        }

        changes
    }

    /// Applies a validated unsubscribe request. Anything not subscribed is ignored.
    pub fn apply_unsubscribe(&mut self, filter: &ParsedFilter) -> FilterChanges {
        let mut changes = FilterChanges::default();

        for stream in &filter.streams {
            if self.entries.remove(&SubscriptionKind::Stream(*stream)).is_some() {
                changes.removed_streams.push(*stream);
            }
        }

        changes.removed_accounts =
            self.remove_accounts(SubscriptionKind::Accounts, &filter.accounts);
        changes.removed_proposed =
            self.remove_accounts(SubscriptionKind::AccountsProposed, &filter.accounts_proposed);

        if !filter.books.is_empty() {
            if let Some(SubscriptionConfig::OrderBooks(books)) =
                self.entries.get_mut(&SubscriptionKind::OrderBooks)
            {
                let (gone, kept): (Vec<BookSpec>, Vec<BookSpec>) = std::mem::take(books)
                    .into_iter()
                    .partition(|book| filter.books.iter().any(|target| target.same_pair(book)));
                *books = kept;
                changes.books_removed = gone.iter().flat_map(book_keys).collect();
                if books.is_empty() {
                    self.entries.remove(&SubscriptionKind::OrderBooks);
                }
            }
        }

        if filter.url == UrlChange::Clear {
            self.url_callback = None;
        }

        changes
    }

    /// Empties the set and reports everything that was removed.
    pub(crate) fn clear(&mut self) -> FilterChanges {
        let mut changes = FilterChanges::default();
        for (kind, config) in std::mem::take(&mut self.entries) {
            match (kind, config) {
                (SubscriptionKind::Stream(stream), _) => changes.removed_streams.push(stream),
                (_, SubscriptionConfig::Accounts(set)) => changes.removed_accounts.extend(set),
                (_, SubscriptionConfig::AccountsProposed(set)) => {
                    changes.removed_proposed.extend(set)
                }
                (_, SubscriptionConfig::OrderBooks(books)) => {
                    changes.books_removed.extend(books.iter().flat_map(book_keys))
                }
                (_, SubscriptionConfig::Stream) => {}
            }
        }
        self.url_callback = None;
        changes
    }

    fn insert_accounts(&mut self, kind: SubscriptionKind, accounts: &[String]) -> Vec<String> {
        if accounts.is_empty() {
            return Vec::new();
        }
        let entry = self.entries.entry(kind).or_insert_with(|| match kind {
            SubscriptionKind::AccountsProposed => SubscriptionConfig::AccountsProposed(HashSet::new()),
            _ => SubscriptionConfig::Accounts(HashSet::new()),
        });
        let Some(set) = account_set_mut(entry) else {
            return Vec::new();
        };
        accounts
            .iter()
            .filter(|account| set.insert((*account).clone()))
            .cloned()
            .collect()
    }

    fn remove_accounts(&mut self, kind: SubscriptionKind, accounts: &[String]) -> Vec<String> {
        let Some(set) = self.entries.get_mut(&kind).and_then(account_set_mut) else {
            return Vec::new();
        };
        let removed: Vec<String> = accounts
            .iter()
            .filter(|account| set.remove(*account))
            .cloned()
            .collect();
        if set.is_empty() {
            self.entries.remove(&kind);
        }
        removed
    }
}

fn account_set_mut(config: &mut SubscriptionConfig) -> Option<&mut HashSet<String>> {
    match config {
        SubscriptionConfig::Accounts(set) | SubscriptionConfig::AccountsProposed(set) => Some(set),
        _ => None,
    }
}

//--------------------------------------------------------------------------------------------------
//  Queue and close signal
//--------------------------------------------------------------------------------------------------

/// Single-use teardown notification.
#[derive(Debug)]
pub struct CloseSignal {
    fired: AtomicBool,
    sender: watch::Sender<bool>,
}

impl CloseSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            fired: AtomicBool::new(false),
            sender,
        }
    }

    /// Fires the signal. Returns false if it had already fired.
    pub fn fire(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.sender.send_replace(true);
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for CloseSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Sender half of a connection's bounded outbound queue.
#[derive(Debug)]
pub struct OutboundQueue {
    // `None` once closed; taking the sender is what makes later enqueues fail.
    sender: Mutex<Option<mpsc::Sender<Bytes>>>,
    capacity: usize,
}

impl OutboundQueue {
    fn new(sender: mpsc::Sender<Bytes>, capacity: usize) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            capacity,
        }
    }

    /// Enqueues without waiting.
    pub fn try_enqueue(&self, payload: Bytes) -> SendOutcome {
        let guard = self.sender.lock();
        let Some(sender) = guard.as_ref() else {
            return SendOutcome::Closed;
        };
        match sender.try_send(payload) {
            Ok(()) => SendOutcome::Enqueued,
            Err(TrySendError::Full(_)) => SendOutcome::Dropped,
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn close(&self) {
        self.sender.lock().take();
    }
}

/// Receiver half of a connection's outbound queue, owned by the transport.
#[derive(Debug)]
pub struct OutboundStream {
    receiver: mpsc::Receiver<Bytes>,
    closed: watch::Receiver<bool>,
}

impl OutboundStream {
    /// Waits for the next payload. Returns `None` once the connection is closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        if *self.closed.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.closed.changed() => None,
            payload = self.receiver.recv() => payload,
        }
    }

    /// Takes the next payload if one is ready.
    pub fn try_recv(&mut self) -> Option<Bytes> {
        if *self.closed.borrow() {
            return None;
        }
        self.receiver.try_recv().ok()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

//--------------------------------------------------------------------------------------------------
//  Connection
//--------------------------------------------------------------------------------------------------

/// One streaming client.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    filters: Mutex<SubscriptionSet>,
    queue: OutboundQueue,
    close_signal: CloseSignal,
    delivered_events: AtomicU64,
    dropped_events: AtomicU64,
    connected_at: DateTime<Utc>,
}

impl Connection {
    /// Creates a connection with a bounded queue of `capacity` payloads.
    ///
    /// # Arguments
    /// * `id` - Transport-assigned identifier
    /// * `capacity` - Queue bound (at least 1)
    ///
    /// # Returns
    /// The connection and the stream the transport drains.
    pub fn open(id: ConnectionId, capacity: usize) -> (Self, OutboundStream) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let close_signal = CloseSignal::new();
        let stream = OutboundStream {
            receiver,
            closed: close_signal.subscribe(),
        };
        let connection = Self {
            id,
            filters: Mutex::new(SubscriptionSet::default()),
            queue: OutboundQueue::new(sender, capacity),
            close_signal,
            delivered_events: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            connected_at: Utc::now(),
        };
        (connection, stream)
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Copy of the current filters.
    pub fn subscriptions(&self) -> SubscriptionSet {
        self.filters.lock().clone()
    }

    pub(crate) fn lock_filters(&self) -> MutexGuard<'_, SubscriptionSet> {
        self.filters.lock()
    }

    /// Non-blocking enqueue of an event payload.
    pub fn enqueue(&self, payload: Bytes) -> SendOutcome {
        let outcome = self.queue.try_enqueue(payload);
        match outcome {
            SendOutcome::Enqueued => {
                self.delivered_events.fetch_add(1, Ordering::Relaxed);
            }
            SendOutcome::Dropped => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
            SendOutcome::Closed => {}
        }
        outcome
    }

    /// Tears the connection down. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        // Queue first, so nothing can be enqueued once the signal is observable.
        self.queue.close();
        self.close_signal.fire()
    }

    pub fn is_closed(&self) -> bool {
        self.close_signal.is_fired()
    }

    /// Receiver that flips to `true` when the connection closes.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.close_signal.subscribe()
    }

    pub fn delivered_events(&self) -> u64 {
        self.delivered_events.load(Ordering::Relaxed)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}
