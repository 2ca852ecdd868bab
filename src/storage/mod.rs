// ABOUTME: Storage abstraction for clients, authorization grants, and access tokens
// ABOUTME: Backend selected from the database URL at wire-up time, no runtime switching
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::AuthResult;
use crate::models::{AccessToken, AuthorizationGrant, Client};
use async_trait::async_trait;
use tracing::{debug, info};

pub mod memory;
pub mod sqlite;

use memory::MemoryStorage;
use sqlite::SqliteStorage;

/// Core storage trait implemented by every backend.
///
/// Compound operations (`put_grant`, `put_token`, `take_grant`,
/// `delete_client`) are atomic within a backend: two concurrent `put_grant`
/// calls for one `(user_id, client_id)` pair leave exactly one grant, and
/// one code handed to concurrent `take_grant` calls is returned to at most
/// one of them. Delete-style operations are idempotent; deleting what is
/// absent reports `false`/`0`, never an error.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Prepare the schema; a no-op for backends without one
    async fn migrate(&self) -> AuthResult<()>;

    // ================================
    // Clients
    // ================================

    /// Insert a client. Name uniqueness is enforced here, atomically with
    /// the insert; a duplicate name fails with a `Validation` error.
    async fn create_client(&self, client: &Client) -> AuthResult<()>;

    async fn get_client(&self, id: &str) -> AuthResult<Option<Client>>;

    /// Lookup by the public identifier handed to third parties
    async fn get_client_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Lookup by display name, for the uniqueness check at registration
    async fn get_client_by_name(&self, name: &str) -> AuthResult<Option<Client>>;

    /// Lookup by registered callback. The URI is not unique; ties resolve
    /// to the first client by name.
    async fn get_client_by_redirect_uri(&self, redirect_uri: &str) -> AuthResult<Option<Client>>;

    async fn list_clients(&self) -> AuthResult<Vec<Client>>;

    /// Delete a client and cascade to every grant and token it owns.
    /// Returns `false` when no such client exists.
    async fn delete_client(&self, id: &str) -> AuthResult<bool>;

    // ================================
    // Authorization grants
    // ================================

    /// Insert a grant, first removing any existing grant for the same
    /// `(user_id, client_id)` pair. Replacement and insert are one atomic step.
    async fn put_grant(&self, grant: &AuthorizationGrant) -> AuthResult<()>;

    /// Atomically look up a grant by code and remove it. The single-use
    /// guarantee lives here: a code can be taken at most once.
    async fn take_grant(&self, code: &str) -> AuthResult<Option<AuthorizationGrant>>;

    /// Non-consuming lookup by internal id, for administrative screens
    async fn get_grant(&self, id: &str) -> AuthResult<Option<AuthorizationGrant>>;

    async fn grants_for_client(&self, client_id: &str) -> AuthResult<Vec<AuthorizationGrant>>;

    /// Administrative reset; returns the number of grants removed
    async fn delete_all_grants(&self) -> AuthResult<u64>;

    // ================================
    // Access tokens
    // ================================

    /// Insert a token, first removing every token for the same
    /// `(user_id, client_id)` pair. Replacement and insert are one atomic step.
    async fn put_token(&self, token: &AccessToken) -> AuthResult<()>;

    async fn get_token(&self, id: &str) -> AuthResult<Option<AccessToken>>;

    async fn get_token_by_access_token(&self, value: &str) -> AuthResult<Option<AccessToken>>;

    async fn get_token_by_refresh_token(&self, value: &str) -> AuthResult<Option<AccessToken>>;

    async fn tokens_for_user(&self, user_id: &str) -> AuthResult<Vec<AccessToken>>;

    async fn tokens_for_client(&self, client_id: &str) -> AuthResult<Vec<AccessToken>>;

    /// Returns `false` when no such token exists
    async fn delete_token(&self, id: &str) -> AuthResult<bool>;

    /// Returns the number of tokens removed
    async fn delete_tokens_for_user(&self, user_id: &str) -> AuthResult<u64>;

    /// Administrative reset; returns the number of tokens removed
    async fn delete_all_tokens(&self) -> AuthResult<u64>;
}

/// Supported storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Sqlite,
}

/// Storage instance wrapper that delegates to the selected backend
#[derive(Clone)]
pub enum Storage {
    Memory(MemoryStorage),
    Sqlite(SqliteStorage),
}

impl Storage {
    /// Create a storage instance from a database URL.
    ///
    /// `memory://` selects the in-memory backend; `sqlite:` URLs select the
    /// SQLite backend.
    ///
    /// # Errors
    /// Returns an error if the URL scheme is unsupported or the backend
    /// fails to connect.
    pub async fn new(database_url: &str) -> AuthResult<Self> {
        debug!("detecting storage backend from url: {database_url}");
        match detect_storage_kind(database_url)? {
            StorageKind::Memory => {
                info!("initializing in-memory storage");
                Ok(Self::Memory(MemoryStorage::new()))
            }
            StorageKind::Sqlite => {
                info!("initializing sqlite storage");
                let storage = SqliteStorage::new(database_url).await?;
                Ok(Self::Sqlite(storage))
            }
        }
    }

    #[must_use]
    pub const fn kind(&self) -> StorageKind {
        match self {
            Self::Memory(_) => StorageKind::Memory,
            Self::Sqlite(_) => StorageKind::Sqlite,
        }
    }

    fn provider(&self) -> &dyn StorageProvider {
        match self {
            Self::Memory(storage) => storage,
            Self::Sqlite(storage) => storage,
        }
    }
}

fn detect_storage_kind(database_url: &str) -> AuthResult<StorageKind> {
    if database_url == "memory://" || database_url == "memory" {
        Ok(StorageKind::Memory)
    } else if database_url.starts_with("sqlite:") {
        Ok(StorageKind::Sqlite)
    } else {
        Err(crate::errors::AuthError::storage(format!(
            "unsupported database URL: {database_url}"
        )))
    }
}

#[async_trait]
impl StorageProvider for Storage {
    async fn migrate(&self) -> AuthResult<()> {
        self.provider().migrate().await
    }

    async fn create_client(&self, client: &Client) -> AuthResult<()> {
        self.provider().create_client(client).await
    }

    async fn get_client(&self, id: &str) -> AuthResult<Option<Client>> {
        self.provider().get_client(id).await
    }

    async fn get_client_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        self.provider().get_client_by_client_id(client_id).await
    }

    async fn get_client_by_name(&self, name: &str) -> AuthResult<Option<Client>> {
        self.provider().get_client_by_name(name).await
    }

    async fn get_client_by_redirect_uri(&self, redirect_uri: &str) -> AuthResult<Option<Client>> {
        self.provider().get_client_by_redirect_uri(redirect_uri).await
    }

    async fn list_clients(&self) -> AuthResult<Vec<Client>> {
        self.provider().list_clients().await
    }

    async fn delete_client(&self, id: &str) -> AuthResult<bool> {
        self.provider().delete_client(id).await
    }

    async fn put_grant(&self, grant: &AuthorizationGrant) -> AuthResult<()> {
        self.provider().put_grant(grant).await
    }

    async fn take_grant(&self, code: &str) -> AuthResult<Option<AuthorizationGrant>> {
        self.provider().take_grant(code).await
    }

    async fn get_grant(&self, id: &str) -> AuthResult<Option<AuthorizationGrant>> {
        self.provider().get_grant(id).await
    }

    async fn grants_for_client(&self, client_id: &str) -> AuthResult<Vec<AuthorizationGrant>> {
        self.provider().grants_for_client(client_id).await
    }

    async fn delete_all_grants(&self) -> AuthResult<u64> {
        self.provider().delete_all_grants().await
    }

    async fn put_token(&self, token: &AccessToken) -> AuthResult<()> {
        self.provider().put_token(token).await
    }

    async fn get_token(&self, id: &str) -> AuthResult<Option<AccessToken>> {
        self.provider().get_token(id).await
    }

    async fn get_token_by_access_token(&self, value: &str) -> AuthResult<Option<AccessToken>> {
        self.provider().get_token_by_access_token(value).await
    }

    async fn get_token_by_refresh_token(&self, value: &str) -> AuthResult<Option<AccessToken>> {
        self.provider().get_token_by_refresh_token(value).await
    }

    async fn tokens_for_user(&self, user_id: &str) -> AuthResult<Vec<AccessToken>> {
        self.provider().tokens_for_user(user_id).await
    }

    async fn tokens_for_client(&self, client_id: &str) -> AuthResult<Vec<AccessToken>> {
        self.provider().tokens_for_client(client_id).await
    }

    async fn delete_token(&self, id: &str) -> AuthResult<bool> {
        self.provider().delete_token(id).await
    }

    async fn delete_tokens_for_user(&self, user_id: &str) -> AuthResult<u64> {
        self.provider().delete_tokens_for_user(user_id).await
    }

    async fn delete_all_tokens(&self) -> AuthResult<u64> {
        self.provider().delete_all_tokens().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_memory_urls() {
        assert_eq!(detect_storage_kind("memory://").unwrap(), StorageKind::Memory);
        assert_eq!(detect_storage_kind("memory").unwrap(), StorageKind::Memory);
    }

    #[test]
    fn detects_sqlite_urls() {
        assert_eq!(
            detect_storage_kind("sqlite::memory:").unwrap(),
            StorageKind::Sqlite
        );
        assert_eq!(
            detect_storage_kind("sqlite:oauth.db").unwrap(),
            StorageKind::Sqlite
        );
    }

    #[test]
    fn rejects_unknown_urls() {
        assert!(detect_storage_kind("postgres://localhost/oauth").is_err());
    }
}
