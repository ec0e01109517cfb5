//! reqwest implementation of the admin API

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::http_client::{ProxyConfig, build_client};
use crate::model::config::Config;

use super::AdminApi;
use super::error::AdminClientError;
use super::types::{
    AddCredentialResponse, BalanceResponse, BatchDeleteRequest, BatchDeleteResponse,
    BatchImportRequest, BatchImportResponse, CredentialInput, CredentialsStatusResponse,
    ExportFormat, SetDisabledRequest, SetPriorityRequest, SuccessResponse,
};

/// Admin API HTTP client
///
/// The API key travels as a default header on the inner client, so every
/// request carries it.
pub struct AdminClient {
    client: Client,
    /// `{baseUrl}/api/admin`
    base_url: String,
}

impl AdminClient {
    pub fn new(config: &Config, api_key: &str) -> anyhow::Result<Self> {
        let proxy = ProxyConfig::from_config(config);
        let client = build_client(
            proxy.as_ref(),
            config.request_timeout_secs,
            config.tls_backend,
            api_key,
        )?;
        Ok(Self::with_client(client, config.admin_base_url()))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and turn non-2xx responses into errors
    async fn execute(&self, request: RequestBuilder) -> Result<Response, AdminClientError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let response = request.header("x-request-id", &request_id).send().await?;

        let status = response.status();
        tracing::debug!(
            request_id = %request_id,
            status = %status,
            url = %response.url(),
            "Admin API response"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdminClientError::from_response(status, &body));
        }
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, AdminClientError> {
        let body = self.execute(request).await?.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| AdminClientError::Decode(e.to_string()))
    }

    /// Like `send_json`, but `{"success": false}` is a rejection
    async fn send_success(
        &self,
        request: RequestBuilder,
    ) -> Result<SuccessResponse, AdminClientError> {
        let response: SuccessResponse = self.send_json(request).await?;
        if !response.success {
            return Err(AdminClientError::Rejected {
                status: 200,
                error_type: "operation_failed".to_string(),
                message: response.message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn list_credentials(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<CredentialsStatusResponse, AdminClientError> {
        let request = self
            .client
            .get(self.url("/credentials"))
            .query(&[("page", page), ("pageSize", page_size)]);
        self.send_json(request).await
    }

    async fn set_disabled(
        &self,
        id: u64,
        disabled: bool,
    ) -> Result<SuccessResponse, AdminClientError> {
        let request = self
            .client
            .post(self.url(&format!("/credentials/{}/disabled", id)))
            .json(&SetDisabledRequest { disabled });
        self.send_success(request).await
    }

    async fn set_priority(
        &self,
        id: u64,
        priority: u32,
    ) -> Result<SuccessResponse, AdminClientError> {
        let request = self
            .client
            .post(self.url(&format!("/credentials/{}/priority", id)))
            .json(&SetPriorityRequest { priority });
        self.send_success(request).await
    }

    async fn reset_failure_count(&self, id: u64) -> Result<SuccessResponse, AdminClientError> {
        let request = self
            .client
            .post(self.url(&format!("/credentials/{}/reset", id)));
        self.send_success(request).await
    }

    async fn get_balance(&self, id: u64) -> Result<BalanceResponse, AdminClientError> {
        let request = self
            .client
            .get(self.url(&format!("/credentials/{}/balance", id)));
        self.send_json(request).await
    }

    async fn add_credential(
        &self,
        input: &CredentialInput,
    ) -> Result<AddCredentialResponse, AdminClientError> {
        let request = self.client.post(self.url("/credentials")).json(input);
        self.send_json(request).await
    }

    async fn delete_credential(&self, id: u64) -> Result<SuccessResponse, AdminClientError> {
        let request = self
            .client
            .delete(self.url(&format!("/credentials/{}", id)));
        self.send_success(request).await
    }

    async fn batch_import(
        &self,
        credentials: &[CredentialInput],
    ) -> Result<BatchImportResponse, AdminClientError> {
        let request = self
            .client
            .post(self.url("/credentials/batch-import"))
            .json(&BatchImportRequest {
                credentials: credentials.to_vec(),
            });
        self.send_json(request).await
    }

    async fn batch_delete(&self, ids: &[u64]) -> Result<BatchDeleteResponse, AdminClientError> {
        let request = self
            .client
            .post(self.url("/credentials/batch-delete"))
            .json(&BatchDeleteRequest { ids: ids.to_vec() });
        self.send_json(request).await
    }

    async fn export_credentials(&self, format: ExportFormat) -> Result<Bytes, AdminClientError> {
        let request = self
            .client
            .get(self.url("/credentials/export"))
            .query(&[("format", format.as_str())]);
        Ok(self.execute(request).await?.bytes().await?)
    }
}
