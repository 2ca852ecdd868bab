// ABOUTME: In-memory storage backend for tests and single-process embedders
// ABOUTME: One mutex over the whole state keeps compound operations atomic
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::StorageProvider;
use crate::errors::{AuthError, AuthResult, FieldError, FieldReason};
use crate::models::{AccessToken, AuthorizationGrant, Client};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct State {
    clients: HashMap<String, Client>,
    grants: HashMap<String, AuthorizationGrant>,
    tokens: HashMap<String, AccessToken>,
}

/// In-memory backend.
///
/// Every operation takes the single state lock, so delete-then-insert
/// replacement and lookup-and-consume are atomic with respect to concurrent
/// callers without any further coordination.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn migrate(&self) -> AuthResult<()> {
        Ok(())
    }

    async fn create_client(&self, client: &Client) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        // Name uniqueness is checked under the state lock so that two
        // concurrent registrations cannot both pass a read-then-insert.
        if state.clients.values().any(|c| c.name == client.name) {
            return Err(AuthError::validation(vec![FieldError::new(
                "name",
                FieldReason::Taken,
            )]));
        }
        state.clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, id: &str) -> AuthResult<Option<Client>> {
        let state = self.state.lock().await;
        Ok(state.clients.get(id).cloned())
    }

    async fn get_client_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        let state = self.state.lock().await;
        Ok(state
            .clients
            .values()
            .find(|c| c.client_id == client_id)
            .cloned())
    }

    async fn get_client_by_name(&self, name: &str) -> AuthResult<Option<Client>> {
        let state = self.state.lock().await;
        Ok(state.clients.values().find(|c| c.name == name).cloned())
    }

    async fn get_client_by_redirect_uri(&self, redirect_uri: &str) -> AuthResult<Option<Client>> {
        let state = self.state.lock().await;
        Ok(state
            .clients
            .values()
            .filter(|c| c.redirect_uri == redirect_uri)
            .min_by(|a, b| a.name.cmp(&b.name))
            .cloned())
    }

    async fn list_clients(&self) -> AuthResult<Vec<Client>> {
        let state = self.state.lock().await;
        let mut clients: Vec<Client> = state.clients.values().cloned().collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }

    async fn delete_client(&self, id: &str) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        if state.clients.remove(id).is_none() {
            return Ok(false);
        }
        // Cascade: no grant or token may outlive its client.
        state.grants.retain(|_, g| g.client_id != id);
        state.tokens.retain(|_, t| t.client_id != id);
        Ok(true)
    }

    async fn put_grant(&self, grant: &AuthorizationGrant) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state
            .grants
            .retain(|_, g| !(g.user_id == grant.user_id && g.client_id == grant.client_id));
        state.grants.insert(grant.id.clone(), grant.clone());
        Ok(())
    }

    async fn take_grant(&self, code: &str) -> AuthResult<Option<AuthorizationGrant>> {
        let mut state = self.state.lock().await;
        let id = state
            .grants
            .values()
            .find(|g| g.code == code)
            .map(|g| g.id.clone());
        Ok(id.and_then(|id| state.grants.remove(&id)))
    }

    async fn get_grant(&self, id: &str) -> AuthResult<Option<AuthorizationGrant>> {
        let state = self.state.lock().await;
        Ok(state.grants.get(id).cloned())
    }

    async fn grants_for_client(&self, client_id: &str) -> AuthResult<Vec<AuthorizationGrant>> {
        let state = self.state.lock().await;
        Ok(state
            .grants
            .values()
            .filter(|g| g.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn delete_all_grants(&self) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let removed = state.grants.len() as u64;
        state.grants.clear();
        Ok(removed)
    }

    async fn put_token(&self, token: &AccessToken) -> AuthResult<()> {
        let mut state = self.state.lock().await;
        state
            .tokens
            .retain(|_, t| !(t.user_id == token.user_id && t.client_id == token.client_id));
        state.tokens.insert(token.id.clone(), token.clone());
        Ok(())
    }

    async fn get_token(&self, id: &str) -> AuthResult<Option<AccessToken>> {
        let state = self.state.lock().await;
        Ok(state.tokens.get(id).cloned())
    }

    async fn get_token_by_access_token(&self, value: &str) -> AuthResult<Option<AccessToken>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .values()
            .find(|t| t.access_token == value)
            .cloned())
    }

    async fn get_token_by_refresh_token(&self, value: &str) -> AuthResult<Option<AccessToken>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .values()
            .find(|t| t.refresh_token == value)
            .cloned())
    }

    async fn tokens_for_user(&self, user_id: &str) -> AuthResult<Vec<AccessToken>> {
        let state = self.state.lock().await;
        let mut tokens: Vec<AccessToken> = state
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tokens.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tokens)
    }

    async fn tokens_for_client(&self, client_id: &str) -> AuthResult<Vec<AccessToken>> {
        let state = self.state.lock().await;
        Ok(state
            .tokens
            .values()
            .filter(|t| t.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn delete_token(&self, id: &str) -> AuthResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state.tokens.remove(id).is_some())
    }

    async fn delete_tokens_for_user(&self, user_id: &str) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - state.tokens.len()) as u64)
    }

    async fn delete_all_tokens(&self) -> AuthResult<u64> {
        let mut state = self.state.lock().await;
        let removed = state.tokens.len() as u64;
        state.tokens.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn client(name: &str) -> Client {
        Client {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_owned(),
            client_id: uuid::Uuid::new_v4().to_string(),
            client_secret: uuid::Uuid::new_v4().to_string(),
            redirect_uri: "https://host.example/cb".to_owned(),
            created_at: Utc::now(),
        }
    }

    fn grant(user: &str, client: &str, code: &str) -> AuthorizationGrant {
        AuthorizationGrant {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user.to_owned(),
            client_id: client.to_owned(),
            code: code.to_owned(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    #[tokio::test]
    async fn create_client_rejects_a_taken_name() {
        let storage = MemoryStorage::new();
        storage.create_client(&client("ide-plugin")).await.unwrap();

        let err = storage
            .create_client(&client("ide-plugin"))
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
        assert_eq!(storage.list_clients().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn put_grant_replaces_the_pair() {
        let storage = MemoryStorage::new();
        storage.put_grant(&grant("u1", "c1", "first")).await.unwrap();
        storage.put_grant(&grant("u1", "c1", "second")).await.unwrap();

        assert!(storage.take_grant("first").await.unwrap().is_none());
        assert!(storage.take_grant("second").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn take_grant_consumes_exactly_once() {
        let storage = MemoryStorage::new();
        storage.put_grant(&grant("u1", "c1", "code")).await.unwrap();

        assert!(storage.take_grant("code").await.unwrap().is_some());
        assert!(storage.take_grant("code").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn grants_for_different_pairs_coexist() {
        let storage = MemoryStorage::new();
        storage.put_grant(&grant("u1", "c1", "a")).await.unwrap();
        storage.put_grant(&grant("u1", "c2", "b")).await.unwrap();
        storage.put_grant(&grant("u2", "c1", "c")).await.unwrap();

        assert!(storage.take_grant("a").await.unwrap().is_some());
        assert!(storage.take_grant("b").await.unwrap().is_some());
        assert!(storage.take_grant("c").await.unwrap().is_some());
    }
}
