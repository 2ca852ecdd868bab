// ABOUTME: Protocol orchestration: approve issues a grant, exchange redeems it exactly once
// ABOUTME: Composes the client registry with the grant and token stores
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::clock::Clock;
use crate::errors::{AuthError, AuthResult};
use crate::models::{AccessToken, AuthorizationGrant};
use crate::registry::ClientRegistry;
use crate::stores::{AuthorizationStore, TokenStore};
use std::sync::Arc;
use tracing::debug;

/// Orchestrates one (user, client) authorization lifecycle:
///
/// ```text
/// [no grant] --approve--> [granted] --exchange ok--> [token issued]
///                         [granted] --exchange expired--> error, grant consumed
///                         [granted] --new approve--> old grant destroyed
/// [token issued] --revoke / expiry--> [no token]
/// ```
#[derive(Clone)]
pub struct AuthorizationService {
    clients: ClientRegistry,
    grants: AuthorizationStore,
    tokens: TokenStore,
    clock: Arc<dyn Clock>,
}

impl AuthorizationService {
    #[must_use]
    pub fn new(
        clients: ClientRegistry,
        grants: AuthorizationStore,
        tokens: TokenStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            clients,
            grants,
            tokens,
            clock,
        }
    }

    /// A resource owner approves `client_ref` (the public `client_id`).
    /// Issues a fresh grant, destroying any live grant for the pair.
    ///
    /// # Errors
    /// `AuthError::ClientNotFound` when the client reference does not resolve.
    pub async fn approve(&self, client_ref: &str, user_id: &str) -> AuthResult<AuthorizationGrant> {
        let client = self.clients.find_by_client_id(client_ref).await?;
        self.grants.issue(user_id, &client.id).await
    }

    /// Redeem an authorization code for an access token.
    ///
    /// The grant is consumed exactly once, as part of this call, regardless
    /// of the outcome: an expired code fails `ExpiredGrant` but is gone, so
    /// a retry with the same code fails `InvalidGrant`. Issuing the token
    /// replaces every prior token for the grant's `(user, client)` pair and
    /// only that pair.
    ///
    /// # Errors
    /// `AuthError::InvalidGrant` when the code was never issued, already
    /// redeemed, or superseded; `AuthError::ExpiredGrant` past the TTL.
    pub async fn exchange(&self, code: &str) -> AuthResult<AccessToken> {
        let grant = self
            .grants
            .redeem(code)
            .await?
            .ok_or(AuthError::InvalidGrant)?;

        if grant.is_expired(self.clock.now()) {
            debug!("rejected expired grant for user {}", grant.user_id);
            return Err(AuthError::ExpiredGrant);
        }

        // The owning client may have been deleted between approve and
        // exchange; its cascade normally consumes the grant first, but the
        // race loses to us here. Backend failures keep their own identity.
        match self.clients.find(&grant.client_id).await {
            Ok(_) => {}
            Err(AuthError::ClientNotFound) => return Err(AuthError::InvalidGrant),
            Err(other) => return Err(other),
        }

        self.tokens.issue_for(&grant.user_id, &grant.client_id).await
    }

    /// Resolve a bearer credential presented to a resource server.
    /// Expired tokens are reported as not-found.
    ///
    /// # Errors
    /// `AuthError::NotFound` when the value is unknown or expired.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<AccessToken> {
        self.tokens.find_by_access_token(access_token).await
    }

    /// Self-service revocation of a single token.
    ///
    /// # Errors
    /// `AuthError::NotFound` when no such token exists.
    pub async fn revoke(&self, token_id: &str) -> AuthResult<()> {
        self.tokens.revoke(token_id).await
    }

    /// Revoke every token the user holds, across all clients.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn revoke_all_for(&self, user_id: &str) -> AuthResult<()> {
        self.tokens.revoke_all_for(user_id).await
    }

    /// Administrative reset: destroys every in-flight grant and every
    /// issued token. Codes handed out before the reset fail redemption.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn revoke_all(&self) -> AuthResult<()> {
        self.grants.revoke_all().await?;
        self.tokens.revoke_all().await
    }

    /// Non-consuming lookup of an in-flight grant by its id.
    ///
    /// # Errors
    /// `AuthError::NotFound` when the grant was redeemed or never issued.
    pub async fn find_grant(&self, grant_id: &str) -> AuthResult<AuthorizationGrant> {
        self.grants.find(grant_id).await
    }

    /// The user's live tokens, for the token-management screen.
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn tokens_for_user(&self, user_id: &str) -> AuthResult<Vec<AccessToken>> {
        self.tokens.find_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use crate::provider::AuthorizationProvider;
    use crate::storage::Storage;

    #[tokio::test]
    async fn exchange_reports_backend_failures_as_storage_errors() {
        let config = AuthConfig {
            database_url: "sqlite::memory:".to_owned(),
            ..AuthConfig::default()
        };
        let provider = AuthorizationProvider::connect(&config).await.unwrap();
        let client = provider
            .registry()
            .register("ide-plugin", "https://ide.example/cb")
            .await
            .unwrap();
        let grant = provider
            .service()
            .approve(&client.client_id, "user-1")
            .await
            .unwrap();

        // Breaking the client table makes the mid-exchange client lookup
        // fail at the backend rather than miss.
        let Storage::Sqlite(sqlite) = provider.storage().as_ref().clone() else {
            panic!("expected sqlite backend");
        };
        sqlx::query("DROP TABLE oauth_clients")
            .execute(&sqlite.pool)
            .await
            .unwrap();

        let err = provider.service().exchange(&grant.code).await.unwrap_err();
        assert!(matches!(err, AuthError::Storage(_)), "got {err:?}");
    }
}
