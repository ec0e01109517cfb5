//! Keyed query cache
//!
//! Holds the server data the console displays, keyed by resource kind and
//! request parameters. Entries are only ever inserted whole (after a fetch) or
//! discarded (invalidation); nothing patches a cached value in place.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::admin::types::{BalanceResponse, CredentialsStatusResponse};

/// Subscriber channel capacity; slow subscribers see `Lagged` and should re-read
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Credentials,
    Balance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// One page of the credential listing
    Credentials { page: u32, page_size: u32 },
    /// Balance of one credential
    Balance(u64),
}

impl QueryKey {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryKey::Credentials { .. } => QueryKind::Credentials,
            QueryKey::Balance(_) => QueryKind::Balance,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    Listing(Arc<CredentialsStatusResponse>),
    Balance(Arc<BalanceResponse>),
}

/// Change notification sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// A fresh value was stored under this key
    Updated(QueryKey),
    /// Every entry of this kind was discarded
    Invalidated(QueryKind),
    /// A single entry was discarded
    Removed(QueryKey),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CachedValue>,
    /// Bumped on every listing invalidation
    listing_generation: u64,
}

pub struct QueryCache {
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(CacheState::default()),
            events,
        }
    }

    /// Receive every subsequent cache change
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn listing(&self, page: u32, page_size: u32) -> Option<Arc<CredentialsStatusResponse>> {
        match self.get(&QueryKey::Credentials { page, page_size })? {
            CachedValue::Listing(listing) => Some(listing),
            CachedValue::Balance(_) => None,
        }
    }

    pub fn balance(&self, id: u64) -> Option<Arc<BalanceResponse>> {
        match self.get(&QueryKey::Balance(id))? {
            CachedValue::Balance(balance) => Some(balance),
            CachedValue::Listing(_) => None,
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<CachedValue> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Token a listing fetch takes before it starts
    ///
    /// Pass it back to [`store_listing_for`](Self::store_listing_for): a
    /// listing fetched across an invalidation is never stored.
    pub fn listing_generation(&self) -> u64 {
        self.state.lock().listing_generation
    }

    /// Store a listing under the parameters it was requested with
    ///
    /// The server echoes `page`/`pageSize`, but the request key is what
    /// readers look up. If listings were invalidated since `generation` was
    /// taken, the listing is returned but not cached.
    pub fn store_listing_for(
        &self,
        page: u32,
        page_size: u32,
        listing: CredentialsStatusResponse,
        generation: u64,
    ) -> Arc<CredentialsStatusResponse> {
        let listing = Arc::new(listing);
        let key = QueryKey::Credentials { page, page_size };
        {
            let mut state = self.state.lock();
            if state.listing_generation != generation {
                tracing::debug!(page, page_size, "Dropping listing fetched before invalidation");
                return listing;
            }
            state
                .entries
                .insert(key, CachedValue::Listing(listing.clone()));
        }
        self.notify(CacheEvent::Updated(key));
        listing
    }

    pub fn store_balance(&self, id: u64, balance: BalanceResponse) -> Arc<BalanceResponse> {
        let balance = Arc::new(balance);
        let key = QueryKey::Balance(id);
        self.state
            .lock()
            .entries
            .insert(key, CachedValue::Balance(balance.clone()));
        self.notify(CacheEvent::Updated(key));
        balance
    }

    /// Discard every entry of `kind`; the next read re-fetches
    pub fn invalidate(&self, kind: QueryKind) {
        let removed = {
            let mut state = self.state.lock();
            if kind == QueryKind::Credentials {
                state.listing_generation += 1;
            }
            let before = state.entries.len();
            state.entries.retain(|k, _| k.kind() != kind);
            before - state.entries.len()
        };
        tracing::debug!(?kind, removed, "Cache invalidated");
        self.notify(CacheEvent::Invalidated(kind));
    }

    /// Discard a single entry
    pub fn remove(&self, key: &QueryKey) -> bool {
        let removed = self.state.lock().entries.remove(key).is_some();
        if removed {
            self.notify(CacheEvent::Removed(*key));
        }
        removed
    }

    fn notify(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
