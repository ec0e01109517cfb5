//! In-memory admin API for registry and console tests

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::admin::types::{
    AddCredentialResponse, BalanceResponse, BatchDeleteError, BatchDeleteResponse,
    BatchImportError, BatchImportResponse, CredentialInput, CredentialStatusItem,
    CredentialsStatusResponse, ExportFormat, SuccessResponse,
};
use crate::admin::{AdminApi, AdminClientError};

/// Server-side state plus a call log
#[derive(Default)]
pub(crate) struct FakeAdminApi {
    credentials: Mutex<Vec<CredentialStatusItem>>,
    next_id: Mutex<u64>,
    calls: Mutex<Vec<&'static str>>,
    /// Errors returned by the next calls, in order, whatever the operation
    failures: Mutex<VecDeque<AdminClientError>>,
    /// Batch-import positions the server rejects
    rejected_import_indices: Mutex<HashSet<usize>>,
    /// Credentials whose balance lookup fails
    banned: Mutex<HashSet<u64>>,
    /// The next call to this operation waits for a notification before answering
    gate: Mutex<Option<(&'static str, Arc<Notify>)>>,
}

impl FakeAdminApi {
    /// Pool with IDs `1..=count`, credential 1 current
    pub(crate) fn with_credentials(count: u64) -> Self {
        let api = Self::default();
        {
            let mut creds = api.credentials.lock();
            for id in 1..=count {
                creds.push(item(id));
            }
        }
        *api.next_id.lock() = count + 1;
        api
    }

    pub(crate) fn calls_to(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| **c == name).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub(crate) fn fail_next(&self, error: AdminClientError) {
        self.failures.lock().push_back(error);
    }

    pub(crate) fn reject_import_at(&self, index: usize) {
        self.rejected_import_indices.lock().insert(index);
    }

    pub(crate) fn ban(&self, id: u64) {
        self.banned.lock().insert(id);
    }

    /// Park the next `name` call until the returned handle is notified
    ///
    /// `list` parks after taking its snapshot; other operations park before
    /// touching any state.
    pub(crate) fn hold_next_call(&self, name: &'static str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.gate.lock() = Some((name, notify.clone()));
        notify
    }

    async fn wait_if_held(&self, name: &str) {
        let gate = {
            let mut gate = self.gate.lock();
            match gate.as_ref() {
                Some((held, _)) if *held == name => gate.take().map(|(_, notify)| notify),
                _ => None,
            }
        };
        if let Some(notify) = gate {
            notify.notified().await;
        }
    }

    pub(crate) fn ids(&self) -> Vec<u64> {
        self.credentials.lock().iter().map(|c| c.id).collect()
    }

    fn record(&self, name: &'static str) -> Result<(), AdminClientError> {
        self.calls.lock().push(name);
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn with_item<T>(
        &self,
        id: u64,
        f: impl FnOnce(&mut CredentialStatusItem) -> T,
    ) -> Result<T, AdminClientError> {
        let mut creds = self.credentials.lock();
        match creds.iter_mut().find(|c| c.id == id) {
            Some(item) => Ok(f(item)),
            None => Err(not_found(id)),
        }
    }
}

fn item(id: u64) -> CredentialStatusItem {
    CredentialStatusItem {
        id,
        priority: 0,
        disabled: false,
        failure_count: 0,
        is_current: id == 1,
        expires_at: None,
        auth_method: Some("social".to_string()),
        has_profile_arn: false,
    }
}

pub(crate) fn not_found(id: u64) -> AdminClientError {
    AdminClientError::Rejected {
        status: 404,
        error_type: "not_found".to_string(),
        message: format!("Credential not found: {}", id),
    }
}

fn ok(message: String) -> SuccessResponse {
    SuccessResponse {
        success: true,
        message,
    }
}

#[async_trait]
impl AdminApi for FakeAdminApi {
    async fn list_credentials(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<CredentialsStatusResponse, AdminClientError> {
        self.record("list")?;
        let listing = {
            let creds = self.credentials.lock();
            let total = creds.len() as u64;
            let start = (page.saturating_sub(1) as usize) * page_size as usize;
            let credentials = creds
                .iter()
                .skip(start)
                .take(page_size as usize)
                .cloned()
                .collect();
            CredentialsStatusResponse {
                total,
                available: creds.iter().filter(|c| !c.disabled).count() as u64,
                current_id: creds.iter().find(|c| c.is_current).map(|c| c.id).unwrap_or(0),
                page,
                page_size,
                total_pages: CredentialsStatusResponse::expected_total_pages(total, page_size),
                credentials,
            }
        };
        self.wait_if_held("list").await;
        Ok(listing)
    }

    async fn set_disabled(
        &self,
        id: u64,
        disabled: bool,
    ) -> Result<SuccessResponse, AdminClientError> {
        self.record("set_disabled")?;
        self.with_item(id, |c| c.disabled = disabled)?;
        Ok(ok(format!("Credential #{} updated", id)))
    }

    async fn set_priority(
        &self,
        id: u64,
        priority: u32,
    ) -> Result<SuccessResponse, AdminClientError> {
        self.wait_if_held("set_priority").await;
        self.record("set_priority")?;
        self.with_item(id, |c| c.priority = priority)?;
        Ok(ok(format!("Credential #{} priority set to {}", id, priority)))
    }

    async fn reset_failure_count(&self, id: u64) -> Result<SuccessResponse, AdminClientError> {
        self.record("reset")?;
        self.with_item(id, |c| {
            c.failure_count = 0;
            c.disabled = false;
        })?;
        Ok(ok(format!("Credential #{} reset", id)))
    }

    async fn get_balance(&self, id: u64) -> Result<BalanceResponse, AdminClientError> {
        self.record("balance")?;
        if self.banned.lock().contains(&id) {
            return Err(AdminClientError::Rejected {
                status: 502,
                error_type: "api_error".to_string(),
                message: "Too many requests, rate limited".to_string(),
            });
        }
        self.with_item(id, |_| ())?;
        Ok(BalanceResponse {
            id,
            subscription_title: Some("KIRO FREE".to_string()),
            current_usage: 10.0,
            usage_limit: 50.0,
            remaining: 40.0,
            usage_percentage: 20.0,
            next_reset_at: None,
        })
    }

    async fn add_credential(
        &self,
        input: &CredentialInput,
    ) -> Result<AddCredentialResponse, AdminClientError> {
        self.record("add")?;
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        let mut new_item = item(id);
        new_item.is_current = false;
        new_item.priority = input.priority.unwrap_or(0);
        new_item.auth_method = Some(input.auth_method.clone());
        self.credentials.lock().push(new_item);
        Ok(AddCredentialResponse {
            success: true,
            message: format!("Credential added successfully, ID: {}", id),
            credential_id: id,
        })
    }

    async fn delete_credential(&self, id: u64) -> Result<SuccessResponse, AdminClientError> {
        self.record("delete")?;
        let mut creds = self.credentials.lock();
        let before = creds.len();
        creds.retain(|c| c.id != id);
        if creds.len() == before {
            return Err(not_found(id));
        }
        Ok(ok(format!("Credential #{} deleted", id)))
    }

    async fn batch_import(
        &self,
        credentials: &[CredentialInput],
    ) -> Result<BatchImportResponse, AdminClientError> {
        self.record("batch_import")?;
        let rejected = self.rejected_import_indices.lock().clone();
        let mut result = BatchImportResponse {
            imported: 0,
            failed: 0,
            errors: Vec::new(),
        };
        for (index, input) in credentials.iter().enumerate() {
            if rejected.contains(&index) {
                result.failed += 1;
                result.errors.push(BatchImportError {
                    index,
                    message: "Credential already exists".to_string(),
                });
                continue;
            }
            let id = {
                let mut next = self.next_id.lock();
                let id = *next;
                *next += 1;
                id
            };
            let mut new_item = item(id);
            new_item.is_current = false;
            new_item.priority = input.priority.unwrap_or(0);
            self.credentials.lock().push(new_item);
            result.imported += 1;
        }
        Ok(result)
    }

    async fn batch_delete(&self, ids: &[u64]) -> Result<BatchDeleteResponse, AdminClientError> {
        self.wait_if_held("batch_delete").await;
        self.record("batch_delete")?;
        let mut creds = self.credentials.lock();
        let mut result = BatchDeleteResponse {
            deleted: 0,
            failed: 0,
            errors: Vec::new(),
        };
        for &id in ids {
            let before = creds.len();
            creds.retain(|c| c.id != id);
            if creds.len() == before {
                result.failed += 1;
                result.errors.push(BatchDeleteError {
                    id,
                    message: format!("Credential not found: {}", id),
                });
            } else {
                result.deleted += 1;
            }
        }
        Ok(result)
    }

    async fn export_credentials(&self, format: ExportFormat) -> Result<Bytes, AdminClientError> {
        self.record("export")?;
        let creds = self.credentials.lock();
        let payload = match format {
            ExportFormat::Json => serde_json::to_vec_pretty(&*creds)
                .map_err(|e| AdminClientError::Decode(e.to_string()))?,
            ExportFormat::Csv => {
                let mut out = String::from("id,priority\n");
                for c in creds.iter() {
                    out.push_str(&format!("{},{}\n", c.id, c.priority));
                }
                out.into_bytes()
            }
        };
        Ok(Bytes::from(payload))
    }
}
