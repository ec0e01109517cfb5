//! Batch-import file parsing
//!
//! Turns a `.json` or `.csv` file into normalized [`CredentialInput`]s. Parsing
//! is total: malformed input degrades to fewer (or zero) records and the caller
//! reports "no valid records found".
//!
//! Accepted shapes:
//! - JSON: `[{...}, ...]` or `{"credentials": [{...}, ...]}`
//! - CSV: a header row followed by data rows; headers may be camelCase or
//!   snake_case (`refreshToken` / `refresh_token`, ...)

use std::fmt;
use std::path::Path;

use serde_json::Value;

use crate::admin::types::{CredentialInput, default_auth_method};

/// Where a record came from in the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    /// 0-based index into the JSON array
    JsonElement(usize),
    /// 1-based line number in the CSV file
    CsvLine(u64),
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordOrigin::JsonElement(index) => write!(f, "element {}", index),
            RecordOrigin::CsvLine(line) => write!(f, "line {}", line),
        }
    }
}

/// One candidate credential parsed from an import file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRecord {
    pub origin: RecordOrigin,
    pub input: CredentialInput,
    /// Raw priority value that is not a non-negative integer
    pub priority_error: Option<String>,
}

/// Import rejected before anything is sent
#[derive(Debug, Clone, PartialEq)]
pub enum ImportError {
    /// The file yielded no usable record
    NoRecords,
    /// A record's priority is not a non-negative integer
    InvalidPriority { origin: RecordOrigin, value: String },
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::NoRecords => write!(f, "No valid credential records found"),
            ImportError::InvalidPriority { origin, value } => {
                write!(f, "Invalid priority {:?} at {}", value, origin)
            }
        }
    }
}

impl std::error::Error for ImportError {}

const REFRESH_TOKEN: &[&str] = &["refreshToken", "refresh_token"];
const AUTH_METHOD: &[&str] = &["authMethod", "auth_method"];
const CLIENT_ID: &[&str] = &["clientId", "client_id"];
const CLIENT_SECRET: &[&str] = &["clientSecret", "client_secret"];
const PRIORITY: &[&str] = &["priority"];
const REGION: &[&str] = &["region"];

/// Parse an import file, choosing the format from its extension
///
/// Records keep source order: the i-th record is batch index i.
pub fn parse_import_source(file_name: &str, raw_text: &str) -> Vec<ImportRecord> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let records = match extension.as_deref() {
        Some("json") => parse_json(raw_text),
        Some("csv") => parse_csv(raw_text),
        _ => {
            tracing::warn!("Unsupported import file type: {}", file_name);
            Vec::new()
        }
    };
    tracing::debug!("Parsed {} record(s) from {}", records.len(), file_name);
    records
}

/// Validate parsed records and strip them down to what is submitted
pub fn prepare_batch(records: Vec<ImportRecord>) -> Result<Vec<CredentialInput>, ImportError> {
    if records.is_empty() {
        return Err(ImportError::NoRecords);
    }
    if let Some(bad) = records.iter().find(|r| r.priority_error.is_some()) {
        return Err(ImportError::InvalidPriority {
            origin: bad.origin,
            value: bad.priority_error.clone().unwrap_or_default(),
        });
    }
    Ok(records.into_iter().map(|r| r.input).collect())
}

fn parse_json(raw_text: &str) -> Vec<ImportRecord> {
    let parsed: Value = match serde_json::from_str(raw_text.trim_start_matches('\u{feff}')) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Import file is not valid JSON: {}", e);
            return Vec::new();
        }
    };

    let items = match &parsed {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("credentials") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let object = item.as_object()?;
            normalize(RecordOrigin::JsonElement(index), |name| {
                object.get(name).and_then(json_scalar)
            })
        })
        .collect()
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_csv(raw_text: &str) -> Vec<ImportRecord> {
    let text = raw_text.trim_start_matches('\u{feff}');

    // The header is the first non-blank line
    let mut start = 0;
    let mut skipped_lines = 0u64;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
        skipped_lines += 1;
    }
    let body = &text[start..];
    if body.is_empty() {
        return Vec::new();
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            tracing::warn!("Failed to read CSV header: {}", e);
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for row in reader.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Skipping unreadable CSV row: {}", e);
                continue;
            }
        };
        let line = row.position().map(|p| p.line()).unwrap_or(0) + skipped_lines;
        let record = normalize(RecordOrigin::CsvLine(line), |name| {
            let column = headers.iter().position(|h| h == name)?;
            row.get(column).map(str::to_string)
        });
        records.extend(record);
    }
    records
}

/// The single normalization boundary for every import shape
///
/// `field` looks up one raw field by name. Empty values count as absent. A
/// record without a refresh token is dropped.
fn normalize(
    origin: RecordOrigin,
    field: impl Fn(&str) -> Option<String>,
) -> Option<ImportRecord> {
    let lookup = |aliases: &[&str]| {
        aliases.iter().find_map(|&name| {
            field(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    };

    let refresh_token = lookup(REFRESH_TOKEN)?;
    let auth_method = lookup(AUTH_METHOD)
        .map(|m| canonicalize_auth_method(&m).to_string())
        .unwrap_or_else(default_auth_method);

    let (priority, priority_error) = match lookup(PRIORITY) {
        None => (None, None),
        Some(raw) => match raw.parse::<u32>() {
            Ok(p) => (Some(p), None),
            Err(_) => (None, Some(raw)),
        },
    };

    Some(ImportRecord {
        origin,
        input: CredentialInput {
            refresh_token,
            auth_method,
            client_id: lookup(CLIENT_ID),
            client_secret: lookup(CLIENT_SECRET),
            priority,
            region: lookup(REGION),
        },
        priority_error,
    })
}

/// `builder-id` and `iam` are IdC under another name
fn canonicalize_auth_method(value: &str) -> &str {
    if value.eq_ignore_ascii_case("builder-id") || value.eq_ignore_ascii_case("iam") {
        "idc"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(records: &[ImportRecord]) -> Vec<CredentialInput> {
        records.iter().map(|r| r.input.clone()).collect()
    }

    #[test]
    fn test_csv_snake_case_header() {
        let records = parse_import_source("creds.csv", "refresh_token,priority\nabc,5\n");
        assert_eq!(records.len(), 1);

        let input = &records[0].input;
        assert_eq!(input.refresh_token, "abc");
        assert_eq!(input.auth_method, "social");
        assert_eq!(input.priority, Some(5));
        assert_eq!(input.client_id, None);
        assert_eq!(input.region, None);
        assert_eq!(records[0].origin, RecordOrigin::CsvLine(2));
    }

    #[test]
    fn test_csv_camel_case_header() {
        let csv = "refreshToken,authMethod,clientId,clientSecret,region\n\
                   t1,idc,cid,secret,us-east-1\n";
        let records = parse_import_source("creds.CSV", csv);
        assert_eq!(records.len(), 1);

        let input = &records[0].input;
        assert_eq!(input.auth_method, "idc");
        assert_eq!(input.client_id.as_deref(), Some("cid"));
        assert_eq!(input.client_secret.as_deref(), Some("secret"));
        assert_eq!(input.region.as_deref(), Some("us-east-1"));
        assert_eq!(input.priority, None);
    }

    #[test]
    fn test_csv_rows_without_token_are_excluded() {
        let csv = "refresh_token,region\n\
                   a,eu\n\
                   ,us\n\
                   \n\
                   c,\n";
        let records = parse_import_source("creds.csv", csv);

        let tokens: Vec<_> = records.iter().map(|r| r.input.refresh_token.as_str()).collect();
        assert_eq!(tokens, vec!["a", "c"]);
        assert_eq!(records[1].input.region, None);
        assert_eq!(records[1].origin, RecordOrigin::CsvLine(5));
    }

    #[test]
    fn test_csv_header_after_blank_lines() {
        let csv = "\u{feff}\n  \nrefresh_token , auth_method\n tok , builder-id \n";
        let records = parse_import_source("creds.csv", csv);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].input.refresh_token, "tok");
        assert_eq!(records[0].input.auth_method, "idc");
        assert_eq!(records[0].origin, RecordOrigin::CsvLine(4));
    }

    #[test]
    fn test_csv_quoted_comma_stays_in_one_field() {
        let csv = "refresh_token,region\n\"to,ken\",eu-west-1\n";
        let records = parse_import_source("creds.csv", csv);
        assert_eq!(records[0].input.refresh_token, "to,ken");
        assert_eq!(records[0].input.region.as_deref(), Some("eu-west-1"));
    }

    #[test]
    fn test_csv_non_numeric_priority_is_flagged() {
        let csv = "refresh_token,priority\na,1\nb,high\nc,-2\n";
        let records = parse_import_source("creds.csv", csv);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].priority_error, None);
        assert_eq!(records[1].priority_error.as_deref(), Some("high"));
        assert_eq!(records[2].priority_error.as_deref(), Some("-2"));
    }

    #[test]
    fn test_json_envelope_and_array_are_equivalent() {
        let envelope = parse_import_source("a.json", r#"{"credentials":[{"refreshToken":"x"}]}"#);
        let array = parse_import_source("a.json", r#"[{"refreshToken":"x"}]"#);

        assert_eq!(envelope, array);
        assert_eq!(envelope.len(), 1);
        assert_eq!(envelope[0].input, CredentialInput::new("x"));
    }

    #[test]
    fn test_json_other_shapes_yield_nothing() {
        assert!(parse_import_source("a.json", r#"{"items":[{"refreshToken":"x"}]}"#).is_empty());
        assert!(parse_import_source("a.json", r#""refreshToken""#).is_empty());
        assert!(parse_import_source("a.json", "{not json").is_empty());
        assert!(parse_import_source("a.json", r#"{"credentials":{"refreshToken":"x"}}"#).is_empty());
    }

    #[test]
    fn test_json_keeps_element_indices() {
        let json = r#"[
            {"refreshToken": "a", "priority": 3},
            "garbage",
            {"refresh_token": "c", "auth_method": "IAM", "region": "us-east-1"},
            {"refreshToken": ""}
        ]"#;
        let records = parse_import_source("batch.json", json);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].origin, RecordOrigin::JsonElement(0));
        assert_eq!(records[0].input.priority, Some(3));

        assert_eq!(records[1].origin, RecordOrigin::JsonElement(2));
        assert_eq!(records[1].input.auth_method, "idc");
        assert_eq!(records[1].input.region.as_deref(), Some("us-east-1"));
    }

    #[test]
    fn test_unknown_extension_yields_nothing() {
        assert!(parse_import_source("creds.txt", "refresh_token\nabc\n").is_empty());
        assert!(parse_import_source("creds", "[]").is_empty());
    }

    #[test]
    fn test_prepare_batch_rejects_empty_and_bad_priority() {
        assert_eq!(prepare_batch(Vec::new()), Err(ImportError::NoRecords));

        let records = parse_import_source("creds.csv", "refresh_token,priority\na,1\nb,x\n");
        assert_eq!(
            prepare_batch(records),
            Err(ImportError::InvalidPriority {
                origin: RecordOrigin::CsvLine(3),
                value: "x".to_string(),
            })
        );
    }

    #[test]
    fn test_prepare_batch_keeps_order() {
        let records = parse_import_source("creds.csv", "refresh_token\nc\na\nb\n");
        let expected = inputs(&records);
        let batch = prepare_batch(records).unwrap();
        assert_eq!(batch, expected);
        assert_eq!(batch[0].refresh_token, "c");
        assert_eq!(batch[2].refresh_token, "b");
    }
}
