// ABOUTME: Explicit wire-up of storage, registry, stores, and service
// ABOUTME: The backend is chosen once at construction, injected everywhere else
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::errors::AuthResult;
use crate::registry::ClientRegistry;
use crate::service::AuthorizationService;
use crate::storage::{Storage, StorageProvider};
use crate::stores::{AuthorizationStore, TokenStore};
use std::sync::Arc;

/// The fully wired authorization core.
///
/// Construction picks the storage backend from the config URL and runs the
/// schema migration; afterwards every component shares the same backend and
/// clock through `Arc`s. There is no global state to mutate.
#[derive(Clone)]
pub struct AuthorizationProvider {
    registry: ClientRegistry,
    service: AuthorizationService,
    storage: Arc<Storage>,
}

impl AuthorizationProvider {
    /// Connect using the system wall clock.
    ///
    /// # Errors
    /// Returns an error if the backend fails to connect or migrate.
    pub async fn connect(config: &AuthConfig) -> AuthResult<Self> {
        Self::connect_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Connect with an injected clock, for deterministic tests and
    /// embedders that control time.
    ///
    /// # Errors
    /// Returns an error if the backend fails to connect or migrate.
    pub async fn connect_with_clock(
        config: &AuthConfig,
        clock: Arc<dyn Clock>,
    ) -> AuthResult<Self> {
        let storage = Arc::new(Storage::new(&config.database_url).await?);
        storage.migrate().await?;

        let registry = ClientRegistry::new(storage.clone());
        let grants = AuthorizationStore::new(storage.clone(), clock.clone(), config.grant_ttl);
        let tokens = TokenStore::new(storage.clone(), clock.clone(), config.token_ttl);
        let service = AuthorizationService::new(registry.clone(), grants, tokens, clock);

        Ok(Self {
            registry,
            service,
            storage,
        })
    }

    #[must_use]
    pub const fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn service(&self) -> &AuthorizationService {
        &self.service
    }

    /// Direct backend access, for embedders layering their own queries
    #[must_use]
    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }
}
