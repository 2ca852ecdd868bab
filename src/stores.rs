// ABOUTME: AuthorizationStore mints and consumes single-use grants; TokenStore rotates and revokes tokens
// ABOUTME: Both read time through the injected Clock only
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::clock::Clock;
use crate::errors::{AuthError, AuthResult};
use crate::models::{AccessToken, AuthorizationGrant};
use crate::security::generate_secret;
use crate::storage::{Storage, StorageProvider};
use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Default authorization-code lifetime
#[must_use]
pub fn default_grant_ttl() -> Duration {
    Duration::hours(1)
}

/// Default access-token lifetime.
#[must_use]
pub fn default_token_ttl() -> Duration {
    Duration::days(90)
}

// Timestamps are stored at second precision; truncate at mint time so a
// value read back from storage equals the one handed out.
fn to_seconds(now: DateTime<Utc>) -> DateTime<Utc> {
    now.with_nanosecond(0).unwrap_or(now)
}

/// Owns in-flight authorization grants (codes).
#[derive(Clone)]
pub struct AuthorizationStore {
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl AuthorizationStore {
    #[must_use]
    pub fn new(storage: Arc<Storage>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            storage,
            clock,
            ttl,
        }
    }

    /// Mint a grant for `(user_id, client_id)`, replacing any live grant for
    /// the pair. The replacement happens inside the storage layer, so two
    /// concurrent issues for one pair leave exactly one grant.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn issue(&self, user_id: &str, client_id: &str) -> AuthResult<AuthorizationGrant> {
        let grant = AuthorizationGrant {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            client_id: client_id.to_owned(),
            code: generate_secret(),
            expires_at: to_seconds(self.clock.now()) + self.ttl,
        };
        self.storage.put_grant(&grant).await?;
        debug!("issued grant for user {user_id} and client {client_id}");
        Ok(grant)
    }

    /// Look up a grant by code and consume it. The grant is removed whether
    /// or not it is expired; judging expiry is the service layer's job.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn redeem(&self, code: &str) -> AuthResult<Option<AuthorizationGrant>> {
        self.storage.take_grant(code).await
    }

    /// Non-consuming lookup by internal id.
    ///
    /// # Errors
    /// `AuthError::NotFound` when no such grant is in flight.
    pub async fn find(&self, grant_id: &str) -> AuthResult<AuthorizationGrant> {
        self.storage
            .get_grant(grant_id)
            .await?
            .ok_or_else(|| AuthError::not_found("grant"))
    }

    /// Administrative reset of every in-flight grant.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn revoke_all(&self) -> AuthResult<()> {
        let removed = self.storage.delete_all_grants().await?;
        debug!("revoked all {removed} grants");
        Ok(())
    }
}

/// Owns issued access tokens.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<Storage>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl TokenStore {
    #[must_use]
    pub fn new(storage: Arc<Storage>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            storage,
            clock,
            ttl,
        }
    }

    /// Mint a token for `(user_id, client_id)`, replacing every prior token
    /// for that exact pair. Tokens the same user holds for other clients
    /// are untouched.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn issue_for(&self, user_id: &str, client_id: &str) -> AuthResult<AccessToken> {
        let now = to_seconds(self.clock.now());
        let token = AccessToken {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            client_id: client_id.to_owned(),
            access_token: generate_secret(),
            refresh_token: generate_secret(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.storage.put_token(&token).await?;
        debug!("issued token for user {user_id} and client {client_id}");
        Ok(token)
    }

    /// Revoke a single token by id (self-service).
    ///
    /// # Errors
    /// `AuthError::NotFound` when no such token exists.
    pub async fn revoke(&self, token_id: &str) -> AuthResult<()> {
        if self.storage.delete_token(token_id).await? {
            Ok(())
        } else {
            Err(AuthError::not_found("token"))
        }
    }

    /// Revoke every token the user holds, across all clients
    /// ("log me out everywhere"). A no-op when the user holds none.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn revoke_all_for(&self, user_id: &str) -> AuthResult<()> {
        let removed = self.storage.delete_tokens_for_user(user_id).await?;
        debug!("revoked {removed} tokens for user {user_id}");
        Ok(())
    }

    /// Administrative reset of every issued token.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn revoke_all(&self) -> AuthResult<()> {
        let removed = self.storage.delete_all_tokens().await?;
        debug!("revoked all {removed} tokens");
        Ok(())
    }

    /// The user's live tokens, for a token-management listing.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn find_by_user(&self, user_id: &str) -> AuthResult<Vec<AccessToken>> {
        self.storage.tokens_for_user(user_id).await
    }

    /// Resolve a bearer credential to its token. Expired tokens are
    /// reported as not-found.
    ///
    /// # Errors
    /// `AuthError::NotFound` when the value is unknown or expired.
    pub async fn find_by_access_token(&self, value: &str) -> AuthResult<AccessToken> {
        let token = self
            .storage
            .get_token_by_access_token(value)
            .await?
            .ok_or_else(|| AuthError::not_found("token"))?;
        if token.is_expired(self.clock.now()) {
            return Err(AuthError::not_found("token"));
        }
        Ok(token)
    }
}
