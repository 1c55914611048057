//! Browser CSP violation reports.
//!
//! Reports are classified and logged. Nothing is persisted.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::http::response;
use crate::observability::metrics;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CspViolation {
    pub directive: String,
    #[serde(rename = "blockedURI")]
    pub blocked_uri: String,
    #[serde(rename = "documentURI")]
    pub document_uri: String,
    pub line_number: Option<u32>,
    pub column_number: Option<u32>,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CspReport {
    pub violation: CspViolation,
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    /// Script violations are the likeliest sign of injection.
    pub fn classify(directive: &str) -> Self {
        if directive.starts_with("script-src") {
            Severity::High
        } else if directive.starts_with("connect-src") || directive.starts_with("frame-src") {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Parse, classify and log one report.
pub fn process_report(body: &[u8]) -> Result<Severity, serde_json::Error> {
    let report: CspReport = serde_json::from_slice(body)?;
    let violation = &report.violation;
    let severity = Severity::classify(&violation.directive);

    match severity {
        Severity::High => tracing::warn!(
            severity = severity.as_str(),
            directive = %violation.directive,
            blocked_uri = %violation.blocked_uri,
            document_uri = %violation.document_uri,
            source_file = ?violation.source_file,
            line = ?violation.line_number,
            column = ?violation.column_number,
            user_agent = ?report.user_agent,
            "CSP violation reported"
        ),
        _ => tracing::info!(
            severity = severity.as_str(),
            directive = %violation.directive,
            blocked_uri = %violation.blocked_uri,
            document_uri = %violation.document_uri,
            url = ?report.url,
            "CSP violation reported"
        ),
    }
    metrics::record_csp_violation(severity.as_str());

    Ok(severity)
}

pub async fn csp_report_handler(body: Bytes) -> Response {
    match process_report(&body) {
        Ok(_) => (StatusCode::OK, Json(json!({ "status": "received" }))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to process CSP report");
            response::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to process report")
        }
    }
}
