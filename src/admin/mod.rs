//! Admin API transport
//!
//! One call per remote operation of the kiro.rs `/api/admin` surface.
//!
//! # Operations
//! - Paginated credential listing
//! - Enable/disable credentials
//! - Modify credential priority
//! - Reset failure count
//! - Query credential balance
//! - Add / delete a credential
//! - Batch import / batch delete
//! - Export (raw payload, serialized by the server)
//!
//! # Usage
//! ```ignore
//! let client = AdminClient::new(&config, api_key)?;
//! let listing = client.list_credentials(1, 20).await?;
//! ```

mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;
use bytes::Bytes;

pub use client::AdminClient;
pub use error::AdminClientError;

use types::{
    AddCredentialResponse, BalanceResponse, BatchDeleteResponse, BatchImportResponse,
    CredentialInput, CredentialsStatusResponse, ExportFormat, SuccessResponse,
};

/// Remote admin API
///
/// Implemented over HTTP by [`AdminClient`]; the registry only sees this trait.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// `GET /credentials?page&pageSize`
    async fn list_credentials(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<CredentialsStatusResponse, AdminClientError>;

    /// `POST /credentials/{id}/disabled`
    async fn set_disabled(&self, id: u64, disabled: bool)
    -> Result<SuccessResponse, AdminClientError>;

    /// `POST /credentials/{id}/priority`
    async fn set_priority(&self, id: u64, priority: u32)
    -> Result<SuccessResponse, AdminClientError>;

    /// `POST /credentials/{id}/reset`
    async fn reset_failure_count(&self, id: u64) -> Result<SuccessResponse, AdminClientError>;

    /// `GET /credentials/{id}/balance`
    async fn get_balance(&self, id: u64) -> Result<BalanceResponse, AdminClientError>;

    /// `POST /credentials`
    async fn add_credential(
        &self,
        input: &CredentialInput,
    ) -> Result<AddCredentialResponse, AdminClientError>;

    /// `DELETE /credentials/{id}`
    async fn delete_credential(&self, id: u64) -> Result<SuccessResponse, AdminClientError>;

    /// `POST /credentials/batch-import`
    async fn batch_import(
        &self,
        credentials: &[CredentialInput],
    ) -> Result<BatchImportResponse, AdminClientError>;

    /// `POST /credentials/batch-delete`
    async fn batch_delete(&self, ids: &[u64]) -> Result<BatchDeleteResponse, AdminClientError>;

    /// `GET /credentials/export?format=`
    async fn export_credentials(&self, format: ExportFormat) -> Result<Bytes, AdminClientError>;
}
