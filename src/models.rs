// ABOUTME: Core data model: registered clients, authorization grants, access tokens
// ABOUTME: Plus the token response wire shape handed to the embedding HTTP layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered OAuth2 consumer.
///
/// `client_id` and `client_secret` are generated exactly once, at
/// registration, and never rotated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Storage-assigned opaque id
    pub id: String,
    /// Unique, trimmed display name
    pub name: String,
    /// Public identifier (64 hex chars)
    pub client_id: String,
    /// Confidential secret (64 hex chars)
    pub client_secret: String,
    /// Registered callback, always a well-formed http(s) URL
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
}

/// A short-lived, single-use proof that a resource owner approved a client.
///
/// At most one live grant exists per `(user_id, client_id)` pair; issuing a
/// new one replaces the old. Redemption consumes the grant whether or not it
/// turns out to be expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    pub id: String,
    /// Resource-owner identity, established by the host application
    pub user_id: String,
    /// Owning `Client::id`
    pub client_id: String,
    /// Single-use secret (64 hex chars)
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    /// A grant at or past its expiry is rejected as not-found
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// The long-lived credential issued by redeeming a grant.
///
/// At most one live token exists per `(user_id, client_id)` pair; redeeming
/// a fresh grant invalidates the user's prior session with the same client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: String,
    pub user_id: String,
    /// Owning `Client::id`
    pub client_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AccessToken {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds of validity remaining, clamped at zero
    #[must_use]
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// Token endpoint response body (RFC 6749 §5.1), built by the HTTP layer
/// from a freshly issued [`AccessToken`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

impl TokenResponse {
    #[must_use]
    pub fn from_token(token: &AccessToken, now: DateTime<Utc>) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_in: token.expires_in(now),
        }
    }
}
