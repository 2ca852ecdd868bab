// ABOUTME: Typed error taxonomy for the authorization-server core
// ABOUTME: Maps internal failures onto the RFC 6749 wire error shape
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the crate
pub type AuthResult<T> = Result<T, AuthError>;

/// Why a registration field was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldReason {
    /// Value missing or whitespace-only
    Blank,
    /// Value already used by another record
    Taken,
    /// Value does not match the required shape
    Format,
}

impl FieldReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::Taken => "taken",
            Self::Format => "format",
        }
    }
}

/// A single validation violation, reported per field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub reason: FieldReason,
}

impl FieldError {
    pub fn new(field: impl Into<String>, reason: FieldReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

fn describe_violations(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} is {}", e.field, e.reason.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error taxonomy surfaced by the registry, stores, and service.
///
/// Every failure is a typed return value; nothing in this crate logs or
/// formats errors for end users. Cascade deletes that find nothing to
/// delete are successful no-ops, not errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client registration input failures; all violations reported together
    #[error("validation failed: {}", describe_violations(.0))]
    Validation(Vec<FieldError>),

    /// Lookup by client reference (internal id or public client_id) missed
    #[error("client not found")]
    ClientNotFound,

    /// Lookup failure for a grant or token id
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Redemption of a code that was never issued, already redeemed, or
    /// superseded by a later approval
    #[error("invalid grant")]
    InvalidGrant,

    /// Redemption of a code past its TTL; the code is consumed regardless
    #[error("expired grant")]
    ExpiredGrant,

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid or unparseable configuration value
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AuthError {
    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self::Validation(errors)
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// OAuth 2.0 error response body (RFC 6749 §5.2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2ErrorResponse {
    /// Error code
    pub error: String,
    /// Human-readable error description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    /// URI for error information
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
}

impl OAuth2ErrorResponse {
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self {
            error: "invalid_request".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-4.1.2.1".to_owned(),
            ),
        }
    }

    #[must_use]
    pub fn invalid_client() -> Self {
        Self {
            error: "invalid_client".to_owned(),
            error_description: Some("Client authentication failed".to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned(),
            ),
        }
    }

    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self {
            error: "invalid_grant".to_owned(),
            error_description: Some(description.to_owned()),
            error_uri: Some(
                "https://datatracker.ietf.org/doc/html/rfc6749#section-5.2".to_owned(),
            ),
        }
    }

    #[must_use]
    pub fn server_error() -> Self {
        Self {
            error: "server_error".to_owned(),
            error_description: None,
            error_uri: None,
        }
    }
}

impl From<&AuthError> for OAuth2ErrorResponse {
    fn from(err: &AuthError) -> Self {
        match err {
            AuthError::Validation(_) | AuthError::NotFound { .. } => {
                Self::invalid_request(&err.to_string())
            }
            AuthError::ClientNotFound => Self::invalid_client(),
            AuthError::InvalidGrant => Self::invalid_grant("Authorization code is not valid"),
            AuthError::ExpiredGrant => Self::invalid_grant("Authorization code has expired"),
            AuthError::Storage(_) | AuthError::Config(_) => Self::server_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_lists_every_violation() {
        let err = AuthError::validation(vec![
            FieldError::new("name", FieldReason::Blank),
            FieldError::new("redirect_uri", FieldReason::Format),
        ]);
        assert_eq!(
            err.to_string(),
            "validation failed: name is blank, redirect_uri is format"
        );
    }

    #[test]
    fn grant_errors_map_to_invalid_grant() {
        for err in [AuthError::InvalidGrant, AuthError::ExpiredGrant] {
            let wire = OAuth2ErrorResponse::from(&err);
            assert_eq!(wire.error, "invalid_grant");
        }
    }

    #[test]
    fn wire_error_serializes_without_null_fields() {
        let json = serde_json::to_string(&OAuth2ErrorResponse::server_error()).unwrap();
        assert_eq!(json, r#"{"error":"server_error"}"#);
    }
}
