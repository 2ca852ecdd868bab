// ABOUTME: SQLite storage backend using sqlx with runtime queries
// ABOUTME: Transactions guard replacement; DELETE..RETURNING makes redemption atomic
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::StorageProvider;
use crate::errors::{AuthError, AuthResult, FieldError, FieldReason};
use crate::models::{AccessToken, AuthorizationGrant, Client};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

/// SQLite backend. Timestamps are stored as unix seconds.
#[derive(Clone)]
pub struct SqliteStorage {
    pub(crate) pool: SqlitePool,
}

impl SqliteStorage {
    /// Connect to the given `sqlite:` URL, creating the file if missing.
    ///
    /// # Errors
    /// Returns an error if the URL is malformed or the connection fails.
    pub async fn new(database_url: &str) -> AuthResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AuthError::storage(format!("invalid sqlite url: {e}")))?
            .create_if_missing(true);

        // An in-memory database exists per connection; a larger pool would
        // hand each caller a different empty database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AuthError::storage(format!("failed to connect: {e}")))?;

        Ok(Self { pool })
    }
}

fn timestamp_to_datetime(secs: i64) -> AuthResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AuthError::storage(format!("invalid timestamp: {secs}")))
}

fn client_from_row(row: &SqliteRow) -> AuthResult<Client> {
    Ok(Client {
        id: row
            .try_get("id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        client_id: row
            .try_get("client_id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        client_secret: row
            .try_get("client_secret")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        redirect_uri: row
            .try_get("redirect_uri")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        created_at: timestamp_to_datetime(
            row.try_get("created_at")
                .map_err(|e| AuthError::storage(e.to_string()))?,
        )?,
    })
}

fn grant_from_row(row: &SqliteRow) -> AuthResult<AuthorizationGrant> {
    Ok(AuthorizationGrant {
        id: row
            .try_get("id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        client_id: row
            .try_get("client_id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        code: row
            .try_get("code")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        expires_at: timestamp_to_datetime(
            row.try_get("expires_at")
                .map_err(|e| AuthError::storage(e.to_string()))?,
        )?,
    })
}

fn token_from_row(row: &SqliteRow) -> AuthResult<AccessToken> {
    Ok(AccessToken {
        id: row
            .try_get("id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        user_id: row
            .try_get("user_id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        client_id: row
            .try_get("client_id")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        access_token: row
            .try_get("access_token")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        refresh_token: row
            .try_get("refresh_token")
            .map_err(|e| AuthError::storage(e.to_string()))?,
        expires_at: timestamp_to_datetime(
            row.try_get("expires_at")
                .map_err(|e| AuthError::storage(e.to_string()))?,
        )?,
        created_at: timestamp_to_datetime(
            row.try_get("created_at")
                .map_err(|e| AuthError::storage(e.to_string()))?,
        )?,
    })
}

// The UNIQUE index on oauth_clients.name is the authoritative uniqueness
// check; a registration losing that race reports the same validation error
// as one that failed the pre-insert lookup.
fn client_insert_error(e: sqlx::Error) -> AuthError {
    let name_taken = e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
        && e.to_string().contains("oauth_clients.name");
    if name_taken {
        AuthError::validation(vec![FieldError::new("name", FieldReason::Taken)])
    } else {
        AuthError::storage(format!("failed to insert client: {e}"))
    }
}

#[async_trait]
impl StorageProvider for SqliteStorage {
    async fn migrate(&self) -> AuthResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS oauth_clients (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                client_id TEXT NOT NULL UNIQUE,
                client_secret TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::storage(format!("failed to create oauth_clients: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS authorization_grants (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                code TEXT NOT NULL UNIQUE,
                expires_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::storage(format!("failed to create authorization_grants: {e}")))?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS access_tokens (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                client_id TEXT NOT NULL,
                access_token TEXT NOT NULL UNIQUE,
                refresh_token TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::storage(format!("failed to create access_tokens: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_grants_pair
             ON authorization_grants (user_id, client_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::storage(format!("failed to create grant index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tokens_pair
             ON access_tokens (user_id, client_id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::storage(format!("failed to create token index: {e}")))?;

        Ok(())
    }

    async fn create_client(&self, client: &Client) -> AuthResult<()> {
        sqlx::query(
            r"
            INSERT INTO oauth_clients (id, name, client_id, client_secret, redirect_uri, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.client_id)
        .bind(&client.client_secret)
        .bind(&client.redirect_uri)
        .bind(client.created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(client_insert_error)?;
        Ok(())
    }

    async fn get_client(&self, id: &str) -> AuthResult<Option<Client>> {
        let row = sqlx::query("SELECT * FROM oauth_clients WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to query client: {e}")))?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn get_client_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        let row = sqlx::query("SELECT * FROM oauth_clients WHERE client_id = ?1")
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to query client: {e}")))?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn get_client_by_name(&self, name: &str) -> AuthResult<Option<Client>> {
        let row = sqlx::query("SELECT * FROM oauth_clients WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to query client: {e}")))?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn get_client_by_redirect_uri(&self, redirect_uri: &str) -> AuthResult<Option<Client>> {
        let row = sqlx::query(
            "SELECT * FROM oauth_clients WHERE redirect_uri = ?1 ORDER BY name LIMIT 1",
        )
        .bind(redirect_uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::storage(format!("failed to query client: {e}")))?;
        row.as_ref().map(client_from_row).transpose()
    }

    async fn list_clients(&self) -> AuthResult<Vec<Client>> {
        let rows = sqlx::query("SELECT * FROM oauth_clients ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to list clients: {e}")))?;
        rows.iter().map(client_from_row).collect()
    }

    async fn delete_client(&self, id: &str) -> AuthResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthError::storage(format!("failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM access_tokens WHERE client_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthError::storage(format!("failed to cascade tokens: {e}")))?;

        sqlx::query("DELETE FROM authorization_grants WHERE client_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthError::storage(format!("failed to cascade grants: {e}")))?;

        let result = sqlx::query("DELETE FROM oauth_clients WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthError::storage(format!("failed to delete client: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AuthError::storage(format!("failed to commit: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn put_grant(&self, grant: &AuthorizationGrant) -> AuthResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthError::storage(format!("failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM authorization_grants WHERE user_id = ?1 AND client_id = ?2")
            .bind(&grant.user_id)
            .bind(&grant.client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthError::storage(format!("failed to replace grant: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO authorization_grants (id, user_id, client_id, code, expires_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(&grant.id)
        .bind(&grant.user_id)
        .bind(&grant.client_id)
        .bind(&grant.code)
        .bind(grant.expires_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| AuthError::storage(format!("failed to insert grant: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AuthError::storage(format!("failed to commit: {e}")))?;
        Ok(())
    }

    async fn take_grant(&self, code: &str) -> AuthResult<Option<AuthorizationGrant>> {
        // Single statement: concurrent redeemers race on the row delete and
        // at most one of them gets the grant back.
        let row = sqlx::query(
            r"
            DELETE FROM authorization_grants WHERE code = ?1
            RETURNING id, user_id, client_id, code, expires_at
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::storage(format!("failed to consume grant: {e}")))?;
        row.as_ref().map(grant_from_row).transpose()
    }

    async fn get_grant(&self, id: &str) -> AuthResult<Option<AuthorizationGrant>> {
        let row = sqlx::query("SELECT * FROM authorization_grants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to query grant: {e}")))?;
        row.as_ref().map(grant_from_row).transpose()
    }

    async fn grants_for_client(&self, client_id: &str) -> AuthResult<Vec<AuthorizationGrant>> {
        let rows = sqlx::query("SELECT * FROM authorization_grants WHERE client_id = ?1")
            .bind(client_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to list grants: {e}")))?;
        rows.iter().map(grant_from_row).collect()
    }

    async fn delete_all_grants(&self) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM authorization_grants")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to delete grants: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn put_token(&self, token: &AccessToken) -> AuthResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AuthError::storage(format!("failed to begin transaction: {e}")))?;

        sqlx::query("DELETE FROM access_tokens WHERE user_id = ?1 AND client_id = ?2")
            .bind(&token.user_id)
            .bind(&token.client_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AuthError::storage(format!("failed to replace token: {e}")))?;

        sqlx::query(
            r"
            INSERT INTO access_tokens
                (id, user_id, client_id, access_token, refresh_token, expires_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(&token.id)
        .bind(&token.user_id)
        .bind(&token.client_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at.timestamp())
        .bind(token.created_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| AuthError::storage(format!("failed to insert token: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| AuthError::storage(format!("failed to commit: {e}")))?;
        Ok(())
    }

    async fn get_token(&self, id: &str) -> AuthResult<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to query token: {e}")))?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn get_token_by_access_token(&self, value: &str) -> AuthResult<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE access_token = ?1")
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to query token: {e}")))?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn get_token_by_refresh_token(&self, value: &str) -> AuthResult<Option<AccessToken>> {
        let row = sqlx::query("SELECT * FROM access_tokens WHERE refresh_token = ?1")
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to query token: {e}")))?;
        row.as_ref().map(token_from_row).transpose()
    }

    async fn tokens_for_user(&self, user_id: &str) -> AuthResult<Vec<AccessToken>> {
        let rows = sqlx::query("SELECT * FROM access_tokens WHERE user_id = ?1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to list tokens: {e}")))?;
        rows.iter().map(token_from_row).collect()
    }

    async fn tokens_for_client(&self, client_id: &str) -> AuthResult<Vec<AccessToken>> {
        let rows = sqlx::query("SELECT * FROM access_tokens WHERE client_id = ?1")
            .bind(client_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to list tokens: {e}")))?;
        rows.iter().map(token_from_row).collect()
    }

    async fn delete_token(&self, id: &str) -> AuthResult<bool> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to delete token: {e}")))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_tokens_for_user(&self, user_id: &str) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to delete tokens: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn delete_all_tokens(&self) -> AuthResult<u64> {
        let result = sqlx::query("DELETE FROM access_tokens")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::storage(format!("failed to delete tokens: {e}")))?;
        Ok(result.rows_affected())
    }
}
