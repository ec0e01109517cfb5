//! Admin API type definitions

use serde::{Deserialize, Serialize};

// ============ Credential Status ============

/// Paginated credential status response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsStatusResponse {
    /// Total number of credentials
    pub total: u64,
    /// Number of available credentials (not disabled, not failed out)
    pub available: u64,
    /// Current active credential ID (0 when the pool has none)
    #[serde(default)]
    pub current_id: u64,
    /// Requested page (1-indexed)
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    /// Credentials on this page, in server order
    #[serde(default)]
    pub credentials: Vec<CredentialStatusItem>,
}

impl CredentialsStatusResponse {
    /// Current credential ID, if the server reports one
    pub fn current(&self) -> Option<u64> {
        (self.current_id != 0).then_some(self.current_id)
    }

    /// IDs visible on this page
    pub fn ids(&self) -> Vec<u64> {
        self.credentials.iter().map(|c| c.id).collect()
    }

    /// Page count implied by `total` and `page_size`
    pub fn expected_total_pages(total: u64, page_size: u32) -> u32 {
        if page_size == 0 {
            return 0;
        }
        u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
    }

    /// Whether the pagination fields are mutually consistent
    pub fn is_consistent(&self) -> bool {
        self.total_pages == Self::expected_total_pages(self.total, self.page_size)
            && self.credentials.len() <= self.page_size as usize
    }
}

/// Status information for a single credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatusItem {
    /// Credential unique ID
    pub id: u64,
    /// Priority (lower number = higher priority)
    pub priority: u32,
    /// Whether disabled
    pub disabled: bool,
    /// Consecutive failure count
    pub failure_count: u32,
    /// Whether this is the credential the server is currently using
    pub is_current: bool,
    /// Token expiration time (RFC3339 format)
    #[serde(default)]
    pub expires_at: Option<String>,
    /// Authentication method
    #[serde(default)]
    pub auth_method: Option<String>,
    /// Whether has Profile ARN
    #[serde(default)]
    pub has_profile_arn: bool,
}

// ============ Operation Requests ============

/// Enable/disable credential request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDisabledRequest {
    pub disabled: bool,
}

/// Modify priority request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPriorityRequest {
    pub priority: u32,
}

/// Credential to add, built from the add form or an import file
///
/// Sent once and discarded; never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialInput {
    /// Refresh token (required)
    pub refresh_token: String,

    /// Authentication method (social / idc)
    #[serde(default = "default_auth_method")]
    pub auth_method: String,

    /// OIDC Client ID (required for IdC authentication)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// OIDC Client Secret (required for IdC authentication)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,

    /// Credential-level Region (for OIDC token refresh)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

pub fn default_auth_method() -> String {
    "social".to_string()
}

impl CredentialInput {
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            auth_method: default_auth_method(),
            client_id: None,
            client_secret: None,
            priority: None,
            region: None,
        }
    }
}

/// Add credential success response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCredentialResponse {
    pub success: bool,
    pub message: String,
    /// Newly added credential ID
    pub credential_id: u64,
}

// ============ Batch Operations ============

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchImportRequest {
    pub credentials: Vec<CredentialInput>,
}

/// Batch import result; items succeed or fail independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchImportResponse {
    pub imported: u32,
    pub failed: u32,
    #[serde(default)]
    pub errors: Vec<BatchImportError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchImportError {
    /// 0-based position in the submitted batch
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchDeleteRequest {
    pub ids: Vec<u64>,
}

/// Batch delete result; items succeed or fail independently
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    pub deleted: u32,
    pub failed: u32,
    #[serde(default)]
    pub errors: Vec<BatchDeleteError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDeleteError {
    pub id: u64,
    pub message: String,
}

/// Counts shared by both batch results
pub trait BatchOutcome {
    fn succeeded(&self) -> u32;
    fn failed(&self) -> u32;

    /// `succeeded + failed` must equal the number of submitted items
    fn accounts_for(&self, submitted: usize) -> bool {
        (self.succeeded() as usize + self.failed() as usize) == submitted
    }
}

impl BatchOutcome for BatchImportResponse {
    fn succeeded(&self) -> u32 {
        self.imported
    }

    fn failed(&self) -> u32 {
        self.failed
    }
}

impl BatchOutcome for BatchDeleteResponse {
    fn succeeded(&self) -> u32 {
        self.deleted
    }

    fn failed(&self) -> u32 {
        self.failed
    }
}

// ============ Balance Query ============

/// Balance query response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    /// Credential ID
    pub id: u64,
    /// Subscription type
    #[serde(default)]
    pub subscription_title: Option<String>,
    /// Current usage
    pub current_usage: f64,
    /// Usage limit
    pub usage_limit: f64,
    /// Remaining quota
    pub remaining: f64,
    /// Usage percentage
    pub usage_percentage: f64,
    /// Next reset time (Unix timestamp)
    #[serde(default)]
    pub next_reset_at: Option<f64>,
}

// ============ Export ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Query value and file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

// ============ Common Responses ============

/// Operation success response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminErrorResponse {
    pub error: AdminErrorBody,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminErrorBody {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_total_pages() {
        assert_eq!(CredentialsStatusResponse::expected_total_pages(0, 20), 0);
        assert_eq!(CredentialsStatusResponse::expected_total_pages(1, 20), 1);
        assert_eq!(CredentialsStatusResponse::expected_total_pages(20, 20), 1);
        assert_eq!(CredentialsStatusResponse::expected_total_pages(21, 20), 2);
        assert_eq!(CredentialsStatusResponse::expected_total_pages(5, 0), 0);
        assert_eq!(CredentialsStatusResponse::expected_total_pages(u64::MAX, 1), u32::MAX);
    }

    #[test]
    fn test_listing_from_server_json() {
        let json = r#"{
            "total": 3,
            "available": 2,
            "currentId": 7,
            "page": 1,
            "pageSize": 2,
            "totalPages": 2,
            "credentials": [
                {"id": 7, "priority": 0, "disabled": false, "failureCount": 0,
                 "isCurrent": true, "expiresAt": "2026-01-01T00:00:00Z",
                 "authMethod": "social", "hasProfileArn": true},
                {"id": 9, "priority": 1, "disabled": true, "failureCount": 3,
                 "isCurrent": false, "expiresAt": null, "authMethod": null,
                 "hasProfileArn": false}
            ]
        }"#;

        let listing: CredentialsStatusResponse = serde_json::from_str(json).unwrap();
        assert_eq!(listing.current(), Some(7));
        assert_eq!(listing.ids(), vec![7, 9]);
        assert!(listing.is_consistent());
        assert_eq!(listing.credentials[1].failure_count, 3);
        assert!(listing.credentials[1].auth_method.is_none());
    }

    #[test]
    fn test_inconsistent_listing_detected() {
        let listing = CredentialsStatusResponse {
            total: 41,
            available: 41,
            current_id: 0,
            page: 1,
            page_size: 20,
            total_pages: 2,
            credentials: vec![],
        };
        assert_eq!(listing.current(), None);
        assert!(!listing.is_consistent());
    }

    #[test]
    fn test_credential_input_omits_absent_fields() {
        let input = CredentialInput::new("rt");
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"refreshToken": "rt", "authMethod": "social"})
        );
    }

    #[test]
    fn test_credential_input_defaults_auth_method() {
        let input: CredentialInput = serde_json::from_str(r#"{"refreshToken": "x"}"#).unwrap();
        assert_eq!(input, CredentialInput::new("x"));
    }

    #[test]
    fn test_batch_outcome_accounting() {
        let result = BatchImportResponse {
            imported: 2,
            failed: 1,
            errors: vec![BatchImportError {
                index: 1,
                message: "duplicate".to_string(),
            }],
        };
        assert!(result.accounts_for(3));
        assert!(!result.accounts_for(4));
    }

    #[test]
    fn test_export_format_serialization() {
        assert_eq!(serde_json::to_string(&ExportFormat::Csv).unwrap(), "\"csv\"");
        assert_eq!(ExportFormat::Json.as_str(), "json");
    }
}
