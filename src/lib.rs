// ABOUTME: Main library entry point for the OAuth2 authorization-server core
// ABOUTME: Client registry, single-use authorization codes, access-token rotation and revocation
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # OAuth2 Provider Core
//!
//! An embeddable OAuth2 authorization-server core implementing the
//! authorization-code grant: client registration, issuance and single-use
//! redemption of authorization codes, and access-token rotation, expiry,
//! and revocation.
//!
//! The crate holds protocol state and invariants only. HTTP routing, the
//! consent screen, and resource-owner authentication belong to the
//! embedding application, which hands this core an already-established
//! `user_id`.
//!
//! ## Invariants
//!
//! - An authorization code is redeemed exactly once, even under races.
//! - At most one live grant and one live token exist per (user, client)
//!   pair; re-approval and re-exchange replace the previous ones.
//! - Expiry decisions go through an injectable [`clock::Clock`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use oauth2_provider::config::AuthConfig;
//! use oauth2_provider::provider::AuthorizationProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = AuthorizationProvider::connect(&AuthConfig::default()).await?;
//!
//!     let client = provider
//!         .registry()
//!         .register("ide-plugin", "https://ide.example/cb")
//!         .await?;
//!
//!     let grant = provider.service().approve(&client.client_id, "user-1").await?;
//!     let token = provider.service().exchange(&grant.code).await?;
//!     println!("issued token {}", token.access_token);
//!     Ok(())
//! }
//! ```

/// Replaceable time source for expiry decisions
pub mod clock;

/// Environment-driven configuration
pub mod config;

/// Typed error taxonomy and the RFC 6749 wire error shape
pub mod errors;

/// Clients, authorization grants, access tokens
pub mod models;

/// Explicit wire-up of the core
pub mod provider;

/// Client registration and lifecycle
pub mod registry;

/// Secret generation
pub mod security;

/// Protocol orchestration (approve / exchange / revoke)
pub mod service;

/// Storage backends and the storage trait
pub mod storage;

/// Grant and token stores
pub mod stores;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use errors::{AuthError, AuthResult, FieldError, FieldReason, OAuth2ErrorResponse};
pub use models::{AccessToken, AuthorizationGrant, Client, TokenResponse};
pub use provider::AuthorizationProvider;
pub use registry::ClientRegistry;
pub use service::AuthorizationService;
pub use storage::{Storage, StorageProvider};
pub use stores::{AuthorizationStore, TokenStore};
