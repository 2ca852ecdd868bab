// ABOUTME: Registry behavior: validation, credential generation, uniqueness, cascade delete
// ABOUTME: Runs the same assertions over the memory and sqlite backends
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use anyhow::Result;
use common::all_providers;
use oauth2_provider::{AuthError, FieldReason, StorageProvider};

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn register_generates_distinct_64_hex_char_credentials() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        let client = provider
            .registry()
            .register("ide-plugin", "https://ide.example/cb")
            .await?;

        assert_eq!(client.name, "ide-plugin");
        assert_eq!(client.redirect_uri, "https://ide.example/cb");
        assert_eq!(client.client_id.len(), 64);
        assert_eq!(client.client_secret.len(), 64);
        assert!(client.client_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(client.client_secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(client.client_id, client.client_secret);
    }
    Ok(())
}

#[tokio::test]
async fn register_trims_name_and_redirect_uri() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        let client = provider
            .registry()
            .register("  mingle  ", "  https://mingle.example/oauth/callback \n")
            .await?;

        assert_eq!(client.name, "mingle");
        assert_eq!(client.redirect_uri, "https://mingle.example/oauth/callback");
    }
    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_names() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        provider
            .registry()
            .register("ide-plugin", "https://ide.example/cb")
            .await?;

        let err = provider
            .registry()
            .register("ide-plugin", "https://other.example/cb")
            .await
            .unwrap_err();

        match err {
            AuthError::Validation(violations) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "name");
                assert_eq!(violations[0].reason, FieldReason::Taken);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn register_reports_all_violations_together() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        let err = provider.registry().register("  ", "not-a-url").await.unwrap_err();

        match err {
            AuthError::Validation(violations) => {
                assert_eq!(violations.len(), 2);
                assert!(violations
                    .iter()
                    .any(|v| v.field == "name" && v.reason == FieldReason::Blank));
                assert!(violations
                    .iter()
                    .any(|v| v.field == "redirect_uri" && v.reason == FieldReason::Format));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    Ok(())
}

#[tokio::test]
async fn register_rejects_blank_redirect_uri() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        let err = provider.registry().register("mingle", "   ").await.unwrap_err();

        match err {
            AuthError::Validation(violations) => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].field, "redirect_uri");
                assert_eq!(violations[0].reason, FieldReason::Blank);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    Ok(())
}

// =============================================================================
// Lookup and listing
// =============================================================================

#[tokio::test]
async fn find_resolves_internal_and_public_ids() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        let client = provider
            .registry()
            .register("go-server", "https://go.example/cb")
            .await?;

        let by_id = provider.registry().find(&client.id).await?;
        assert_eq!(by_id, client);

        let by_public = provider.registry().find_by_client_id(&client.client_id).await?;
        assert_eq!(by_public, client);

        assert!(matches!(
            provider.registry().find("no-such-id").await,
            Err(AuthError::ClientNotFound)
        ));
    }
    Ok(())
}

#[tokio::test]
async fn find_by_redirect_uri_resolves_the_registered_callback() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        let mingle = provider
            .registry()
            .register("mingle", "https://mingle.example/cb")
            .await?;
        provider
            .registry()
            .register("go-server", "https://go.example/cb")
            .await?;

        let found = provider
            .registry()
            .find_by_redirect_uri("https://mingle.example/cb")
            .await?;
        assert_eq!(found, mingle);

        assert!(matches!(
            provider
                .registry()
                .find_by_redirect_uri("https://absent.example/cb")
                .await,
            Err(AuthError::ClientNotFound)
        ));
    }
    Ok(())
}

#[tokio::test]
async fn list_returns_clients_ordered_by_name() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        provider
            .registry()
            .register("mingle09", "https://nine.example/cb")
            .await?;
        provider
            .registry()
            .register("go01", "https://one.example/cb")
            .await?;
        provider
            .registry()
            .register("mingle05", "https://five.example/cb")
            .await?;

        let names: Vec<String> = provider
            .registry()
            .list()
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["go01", "mingle05", "mingle09"]);
    }
    Ok(())
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn delete_cascades_to_grants_and_tokens() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        let client = provider
            .registry()
            .register("mingle", "https://mingle.example/cb")
            .await?;

        let grant = provider.service().approve(&client.client_id, "foo@bar.com").await?;
        let other_grant = provider
            .service()
            .approve(&client.client_id, "baz@bar.com")
            .await?;
        let token = provider.service().exchange(&other_grant.code).await?;

        provider.registry().delete(&client.id).await?;

        assert!(matches!(
            provider.registry().find(&client.id).await,
            Err(AuthError::ClientNotFound)
        ));
        // The surviving grant's code is gone with the client.
        assert!(matches!(
            provider.service().exchange(&grant.code).await,
            Err(AuthError::InvalidGrant)
        ));
        let storage = provider.storage();
        assert!(storage.get_token(&token.id).await?.is_none());
        assert!(storage.grants_for_client(&client.id).await?.is_empty());
    }
    Ok(())
}

#[tokio::test]
async fn delete_of_unknown_client_reports_not_found() -> Result<()> {
    for (provider, _clock) in all_providers().await? {
        assert!(matches!(
            provider.registry().delete("no-such-id").await,
            Err(AuthError::ClientNotFound)
        ));
    }
    Ok(())
}
