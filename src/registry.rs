// ABOUTME: Client registration and lifecycle: validate, generate credentials, cascade delete
// ABOUTME: Validation is explicit and synchronous, no hidden persistence callbacks
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{AuthError, AuthResult, FieldError, FieldReason};
use crate::models::Client;
use crate::security::generate_secret;
use crate::storage::{Storage, StorageProvider};
use chrono::{Timelike, Utc};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};
use uuid::Uuid;

// Multi-line anchors are intentional; the original validated redirect URIs
// with line-boundary semantics and registered clients depend on it.
static REDIRECT_URI_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^(https|http)://.+$").ok());

/// Owns `Client` records: registration, lookup, uniqueness enforcement,
/// cascade deletion of dependent grants and tokens.
#[derive(Clone)]
pub struct ClientRegistry {
    storage: Arc<Storage>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Register a new OAuth2 client.
    ///
    /// Trims `name` and `redirect_uri`, checks presence, URL shape, and
    /// name uniqueness, then generates `client_id` and `client_secret` as
    /// independent 64-hex-char secrets. All violations are reported
    /// together in a single `Validation` error. The name check here only
    /// aggregates; storage enforces uniqueness atomically at insert, so a
    /// registration losing a race reports the same `Taken` violation.
    ///
    /// # Errors
    /// Returns `AuthError::Validation` when any input constraint fails, or
    /// `AuthError::Storage` on backend failure.
    pub async fn register(&self, name: &str, redirect_uri: &str) -> AuthResult<Client> {
        let name = name.trim();
        let redirect_uri = redirect_uri.trim();

        let mut violations = Vec::new();

        if name.is_empty() {
            violations.push(FieldError::new("name", FieldReason::Blank));
        } else if self.storage.get_client_by_name(name).await?.is_some() {
            violations.push(FieldError::new("name", FieldReason::Taken));
        }

        if redirect_uri.is_empty() {
            violations.push(FieldError::new("redirect_uri", FieldReason::Blank));
        } else if !is_valid_redirect_uri(redirect_uri) {
            violations.push(FieldError::new("redirect_uri", FieldReason::Format));
        }

        if !violations.is_empty() {
            debug!("client registration rejected: {violations:?}");
            return Err(AuthError::validation(violations));
        }

        // Second precision: timestamps survive a storage roundtrip unchanged.
        let now = Utc::now();
        let now = now.with_nanosecond(0).unwrap_or(now);

        let client = Client {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            client_id: generate_secret(),
            client_secret: generate_secret(),
            redirect_uri: redirect_uri.to_owned(),
            created_at: now,
        };

        self.storage.create_client(&client).await?;
        info!("registered oauth client {} ({})", client.name, client.id);
        Ok(client)
    }

    /// Lookup by internal storage id
    ///
    /// # Errors
    /// `AuthError::ClientNotFound` when no such client exists.
    pub async fn find(&self, id: &str) -> AuthResult<Client> {
        self.storage
            .get_client(id)
            .await?
            .ok_or(AuthError::ClientNotFound)
    }

    /// Lookup by the public `client_id` handed to third parties
    ///
    /// # Errors
    /// `AuthError::ClientNotFound` when no such client exists.
    pub async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Client> {
        self.storage
            .get_client_by_client_id(client_id)
            .await?
            .ok_or(AuthError::ClientNotFound)
    }

    /// Lookup by registered callback URI. Redirect URIs are not unique;
    /// ties resolve to the first client by name.
    ///
    /// # Errors
    /// `AuthError::ClientNotFound` when no client registered the URI.
    pub async fn find_by_redirect_uri(&self, redirect_uri: &str) -> AuthResult<Client> {
        self.storage
            .get_client_by_redirect_uri(redirect_uri)
            .await?
            .ok_or(AuthError::ClientNotFound)
    }

    /// All registered clients, ordered by name
    ///
    /// # Errors
    /// Returns `AuthError::Storage` on backend failure.
    pub async fn list(&self) -> AuthResult<Vec<Client>> {
        self.storage.list_clients().await
    }

    /// Delete a client, cascading to every grant and token it owns.
    ///
    /// # Errors
    /// `AuthError::ClientNotFound` when no such client exists.
    pub async fn delete(&self, id: &str) -> AuthResult<()> {
        if self.storage.delete_client(id).await? {
            info!("deleted oauth client {id} and its grants/tokens");
            Ok(())
        } else {
            Err(AuthError::ClientNotFound)
        }
    }
}

fn is_valid_redirect_uri(uri: &str) -> bool {
    REDIRECT_URI_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(uri))
}
