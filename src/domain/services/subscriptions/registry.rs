//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name             | Description                                         |
// |------------------|-----------------------------------------------------|
// | Registry         | Live connections and the subscriber indexes         |
// | SubscriberIndex  | stream/account/book pair -> connection ids          |
//--------------------------------------------------------------------------------------------------
// Lock order: connections map, then a connection's filters, then the index. No method holds
// more than one of these while enqueuing.
//--------------------------------------------------------------------------------------------------

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::domain::models::types::{BookTrade, ConnectionId, StreamKind};

use super::connection::{Connection, FilterChanges};
use super::{SubscriptionError, SubscriptionResult};

#[derive(Debug, Default)]
struct SubscriberIndex {
    streams: HashMap<StreamKind, HashSet<ConnectionId>>,
    accounts: HashMap<String, HashSet<ConnectionId>>,
    accounts_proposed: HashMap<String, HashSet<ConnectionId>>,
    /// Keyed by the trade pair a book answers to; the count is how many of
    /// the connection's books share that key.
    books: HashMap<BookTrade, HashMap<ConnectionId, usize>>,
}

impl SubscriberIndex {
    fn apply(&mut self, id: &ConnectionId, changes: &FilterChanges) {
        for stream in &changes.added_streams {
            index_insert(&mut self.streams, *stream, id);
        }
        for stream in &changes.removed_streams {
            index_remove(&mut self.streams, stream, id);
        }
        for account in &changes.added_accounts {
            index_insert(&mut self.accounts, account.clone(), id);
        }
        for account in &changes.removed_accounts {
            index_remove(&mut self.accounts, account, id);
        }
        for account in &changes.added_proposed {
            index_insert(&mut self.accounts_proposed, account.clone(), id);
        }
        for account in &changes.removed_proposed {
            index_remove(&mut self.accounts_proposed, account, id);
        }
        for key in &changes.books_added {
            *self
                .books
                .entry(key.clone())
                .or_default()
                .entry(id.clone())
                .or_insert(0) += 1;
        }
        for key in &changes.books_removed {
            let Some(counts) = self.books.get_mut(key) else {
                continue;
            };
            if let Some(count) = counts.get_mut(id) {
                *count -= 1;
                if *count == 0 {
                    counts.remove(id);
                }
            }
            if counts.is_empty() {
                self.books.remove(key);
            }
        }
    }
}

fn index_insert<K: Eq + Hash>(index: &mut HashMap<K, HashSet<ConnectionId>>, key: K, id: &ConnectionId) {
    index.entry(key).or_default().insert(id.clone());
}

fn index_remove<K: Eq + Hash>(index: &mut HashMap<K, HashSet<ConnectionId>>, key: &K, id: &ConnectionId) {
    if let Some(ids) = index.get_mut(key) {
        ids.remove(id);
        if ids.is_empty() {
            index.remove(key);
        }
    }
}

/// Owns every live connection.
#[derive(Debug, Default)]
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    index: Mutex<SubscriberIndex>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection.
    ///
    /// # Returns
    /// * `Ok(())` - If the id was free
    /// * `Err(SubscriptionError::DuplicateConnection)` - If the id is taken
    pub fn insert(&self, connection: Arc<Connection>) -> SubscriptionResult<()> {
        let mut connections = self.connections.write();
        let id = connection.id().clone();
        if connections.contains_key(&id) {
            return Err(SubscriptionError::DuplicateConnection(id));
        }
        connections.insert(id, connection);
        Ok(())
    }

    /// Unregisters and tears down a connection.
    ///
    /// The close signal fires before the filters are cleared, so a subscribe
    /// racing with this call either lands first and is purged here, or sees
    /// the connection closed and fails. The map stays write-locked until the
    /// purge is done; a connection reusing the id is indexed only after it.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write();
        let connection = connections.remove(id)?;
        connection.close();

        let mut filters = connection.lock_filters();
        let changes = filters.clear();
        self.index.lock().apply(id, &changes);
        drop(filters);
        drop(connections);

        debug!(connection_id = %id, "Connection removed");
        Some(connection)
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections.read().get(id).cloned()
    }

    /// Resolves ids to live connections, skipping ids that are gone.
    pub fn resolve<'a, I>(&self, ids: I) -> Vec<Arc<Connection>>
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        let connections = self.connections.read();
        ids.into_iter()
            .filter_map(|id| connections.get(id).cloned())
            .collect()
    }

    /// All live connections.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Folds a filter mutation into the indexes. Callers hold the
    /// connection's filter lock so index updates follow mutation order.
    pub(crate) fn apply_changes(&self, id: &ConnectionId, changes: &FilterChanges) {
        if changes.is_empty() {
            return;
        }
        self.index.lock().apply(id, changes);
    }

    pub fn stream_subscribers(&self, kind: StreamKind) -> Vec<ConnectionId> {
        self.index
            .lock()
            .streams
            .get(&kind)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Connections subscribed to any of `accounts`, each listed once.
    ///
    /// # Arguments
    /// * `accounts` - Accounts affected by the event
    /// * `proposed` - Read the `accounts_proposed` index instead of `accounts`
    pub fn account_subscribers(&self, accounts: &[String], proposed: bool) -> HashSet<ConnectionId> {
        let index = self.index.lock();
        let map = if proposed {
            &index.accounts_proposed
        } else {
            &index.accounts
        };
        accounts
            .iter()
            .filter_map(|account| map.get(account))
            .flatten()
            .cloned()
            .collect()
    }

    /// Connections holding a book that matches any of `trades`, each listed once.
    pub fn book_subscribers(&self, trades: &[BookTrade]) -> HashSet<ConnectionId> {
        let index = self.index.lock();
        trades
            .iter()
            .filter_map(|trade| index.books.get(trade))
            .flat_map(HashMap::keys)
            .cloned()
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn stream_subscriber_count(&self, kind: StreamKind) -> usize {
        self.index.lock().streams.get(&kind).map_or(0, HashSet::len)
    }

    pub fn account_subscriber_count(&self, account: &str, proposed: bool) -> usize {
        let index = self.index.lock();
        let map = if proposed {
            &index.accounts_proposed
        } else {
            &index.accounts
        };
        map.get(account).map_or(0, HashSet::len)
    }

    /// Number of connections a trade on this pair reaches.
    pub fn book_subscriber_count(&self, trade: &BookTrade) -> usize {
        self.index.lock().books.get(trade).map_or(0, HashMap::len)
    }
}
