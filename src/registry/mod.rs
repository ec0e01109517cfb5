//! Credential registry synchronization
//!
//! Keeps a cached, paginated projection of the server's credential pool in
//! step with the mutations the console issues.
//!
//! The server's rotation logic changes `isCurrent` and failure counters on its
//! own, so cached listings are never patched: every successful mutation
//! discards them and the next read fetches fresh data. Failed mutations leave
//! the cache untouched. Balance lookups are cached per credential and never
//! retried automatically.

pub mod cache;
pub mod mutation;
pub mod selection;
#[cfg(test)]
pub(crate) mod test_support;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::admin::types::{
    AddCredentialResponse, BalanceResponse, BatchDeleteResponse, BatchImportResponse,
    BatchOutcome, CredentialInput, CredentialsStatusResponse, ExportFormat, SuccessResponse,
};
use crate::admin::{AdminApi, AdminClientError};

use cache::{CacheEvent, QueryCache, QueryKey, QueryKind};
use mutation::{MutationKind, MutationTracker};

/// Registry operation failure
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// The remote call failed
    Api(AdminClientError),
    /// The same operation is still in flight
    Busy(MutationKind),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Api(e) => write!(f, "{}", e),
            RegistryError::Busy(kind) => write!(f, "A {} operation is already in progress", kind),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<AdminClientError> for RegistryError {
    fn from(e: AdminClientError) -> Self {
        RegistryError::Api(e)
    }
}

/// Listing page a view is showing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }
}

pub struct CredentialRegistry {
    api: Arc<dyn AdminApi>,
    cache: QueryCache,
    mutations: MutationTracker,
}

impl CredentialRegistry {
    pub fn new(api: Arc<dyn AdminApi>) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
            mutations: MutationTracker::new(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Cache change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    /// Whether `kind` is in flight (its trigger should be disabled)
    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.mutations.is_pending(kind)
    }

    #[cfg(test)]
    pub fn mutation_state(&self, kind: MutationKind) -> mutation::MutationState {
        self.mutations.state(kind)
    }

    // ============ Reads ============

    /// Listing page, from cache when present
    pub async fn list_credentials(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Arc<CredentialsStatusResponse>, RegistryError> {
        if let Some(listing) = self.cache.listing(page, page_size) {
            return Ok(listing);
        }
        self.refresh_credentials(page, page_size).await
    }

    /// Fetch a listing page and replace the cached one
    ///
    /// Concurrent refreshes of the same page are not coalesced; the last
    /// response to arrive wins. A response that was in flight while a
    /// mutation invalidated the listings is returned but not cached.
    pub async fn refresh_credentials(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Arc<CredentialsStatusResponse>, RegistryError> {
        let generation = self.cache.listing_generation();
        let listing = self
            .api
            .list_credentials(page, page_size)
            .await
            .inspect_err(|e| tracing::warn!("Failed to fetch credential listing: {}", e))?;

        if !listing.is_consistent() {
            tracing::warn!(
                total = listing.total,
                page_size = listing.page_size,
                total_pages = listing.total_pages,
                returned = listing.credentials.len(),
                "Server returned inconsistent pagination"
            );
        }

        Ok(self
            .cache
            .store_listing_for(page, page_size, listing, generation))
    }

    /// Balance of one credential, from cache when present
    ///
    /// A failed lookup is returned as-is: no retry and no cache entry, so a
    /// rate-limited or banned upstream account is not hit again until the
    /// user asks.
    pub async fn get_balance(&self, id: u64) -> Result<Arc<BalanceResponse>, RegistryError> {
        if let Some(balance) = self.cache.balance(id) {
            tracing::debug!("Credential #{} balance cache hit", id);
            return Ok(balance);
        }

        let balance = self
            .api
            .get_balance(id)
            .await
            .inspect_err(|e| tracing::warn!("Balance lookup for credential #{} failed: {}", id, e))?;
        Ok(self.cache.store_balance(id, balance))
    }

    /// Drop the cached balance of `id` and fetch it once
    pub async fn refresh_balance(&self, id: u64) -> Result<Arc<BalanceResponse>, RegistryError> {
        self.cache.remove(&QueryKey::Balance(id));
        self.get_balance(id).await
    }

    /// Refresh the page `view` points at every `every`, until the sender is dropped
    ///
    /// A failed refresh is logged and simply retried on the next tick.
    pub fn spawn_auto_refresh(
        self: &Arc<Self>,
        view: watch::Receiver<PageRequest>,
        every: Duration,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if view.has_changed().is_err() {
                    tracing::debug!("Auto refresh stopped");
                    break;
                }
                let PageRequest { page, page_size } = *view.borrow();
                if let Err(e) = registry.refresh_credentials(page, page_size).await {
                    tracing::warn!("Periodic refresh failed, retrying next tick: {}", e);
                }
            }
        })
    }

    // ============ Mutations ============

    /// Run one mutation through the state machine
    ///
    /// Invalidation only happens after the success response is observed.
    async fn mutate<T>(
        &self,
        kind: MutationKind,
        call: impl Future<Output = Result<T, AdminClientError>>,
    ) -> Result<T, RegistryError> {
        let guard = self
            .mutations
            .begin(kind)
            .ok_or(RegistryError::Busy(kind))?;

        match call.await {
            Ok(value) => {
                guard.succeed();
                if kind.invalidates_listing() {
                    self.cache.invalidate(QueryKind::Credentials);
                }
                Ok(value)
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", kind, e);
                guard.fail(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Set credential disabled status
    pub async fn set_disabled(
        &self,
        id: u64,
        disabled: bool,
    ) -> Result<SuccessResponse, RegistryError> {
        let response = self
            .mutate(MutationKind::SetDisabled, self.api.set_disabled(id, disabled))
            .await?;
        tracing::info!("Credential #{} disabled={}", id, disabled);
        Ok(response)
    }

    /// Set credential priority
    pub async fn set_priority(
        &self,
        id: u64,
        priority: u32,
    ) -> Result<SuccessResponse, RegistryError> {
        let response = self
            .mutate(MutationKind::SetPriority, self.api.set_priority(id, priority))
            .await?;
        tracing::info!("Credential #{} priority set to {}", id, priority);
        Ok(response)
    }

    /// Reset failure count (the server also re-enables the credential)
    pub async fn reset_failure_count(&self, id: u64) -> Result<SuccessResponse, RegistryError> {
        let response = self
            .mutate(
                MutationKind::ResetFailureCount,
                self.api.reset_failure_count(id),
            )
            .await?;
        tracing::info!("Credential #{} failure count reset", id);
        Ok(response)
    }

    pub async fn add_credential(
        &self,
        input: &CredentialInput,
    ) -> Result<AddCredentialResponse, RegistryError> {
        let response = self
            .mutate(MutationKind::AddCredential, self.api.add_credential(input))
            .await?;
        tracing::info!("Credential #{} added", response.credential_id);
        Ok(response)
    }

    pub async fn delete_credential(&self, id: u64) -> Result<SuccessResponse, RegistryError> {
        let response = self
            .mutate(MutationKind::DeleteCredential, self.api.delete_credential(id))
            .await?;
        self.cache.remove(&QueryKey::Balance(id));
        tracing::info!("Credential #{} deleted", id);
        Ok(response)
    }

    /// Import several credentials; items succeed or fail independently
    ///
    /// `Err` means the call itself failed. Per-item failures come back inside
    /// the `Ok` result, indexed by position in `credentials`.
    pub async fn batch_import(
        &self,
        credentials: &[CredentialInput],
    ) -> Result<BatchImportResponse, RegistryError> {
        let result = self
            .mutate(MutationKind::BatchImport, self.api.batch_import(credentials))
            .await?;

        if !result.accounts_for(credentials.len()) {
            tracing::warn!(
                submitted = credentials.len(),
                imported = result.imported,
                failed = result.failed,
                "Batch import result does not account for every item"
            );
        }
        tracing::info!(
            "Batch import: {} imported, {} failed",
            result.imported,
            result.failed
        );
        Ok(result)
    }

    /// Delete several credentials; items succeed or fail independently
    pub async fn batch_delete(&self, ids: &[u64]) -> Result<BatchDeleteResponse, RegistryError> {
        let result = self
            .mutate(MutationKind::BatchDelete, self.api.batch_delete(ids))
            .await?;

        if !result.accounts_for(ids.len()) {
            tracing::warn!(
                submitted = ids.len(),
                deleted = result.deleted,
                failed = result.failed,
                "Batch delete result does not account for every item"
            );
        }

        for id in ids {
            if !result.errors.iter().any(|e| e.id == *id) {
                self.cache.remove(&QueryKey::Balance(*id));
            }
        }
        tracing::info!(
            "Batch delete: {} deleted, {} failed",
            result.deleted,
            result.failed
        );
        Ok(result)
    }

    /// Export payload exactly as the server serialized it
    pub async fn export_credentials(&self, format: ExportFormat) -> Result<Bytes, RegistryError> {
        self.mutate(MutationKind::Export, self.api.export_credentials(format))
            .await
    }
}
