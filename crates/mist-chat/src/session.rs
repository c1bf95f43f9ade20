//! Authentication state and its persistence

use std::sync::Arc;

use mist_api::{ApiClient, AuthHandler, User};
use tokio::sync::watch;

use crate::{
    error::{Error, Result},
    storage::{ClientStorage, TOKEN_KEY},
};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Current authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub authenticated: bool,
    pub user: Option<User>,
}

/// Owns the session and keeps the stored token in sync with it.
///
/// Installed as the [`AuthHandler`] of the [`ApiClient`], so every request
/// carries the current token and any 401 tears the session down.
pub struct SessionStore {
    storage: Arc<dyn ClientStorage>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    /// Start from whatever token storage holds
    pub fn restore(storage: Arc<dyn ClientStorage>) -> Self {
        let token = storage.get(TOKEN_KEY).filter(|t| !t.is_empty());
        let session = Session {
            authenticated: token.is_some(),
            token,
            user: None,
        };
        let (state, _) = watch::channel(session);
        Self { storage, state }
    }

    /// Observe session changes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }

    /// Log in. State changes only when the token and profile both check out.
    pub async fn login(&self, api: &ApiClient, email: &str, password: &str) -> Result<User> {
        let token = api
            .login(email, password)
            .await
            .map_err(|e| auth_failure(e, "Login failed"))?
            .access_token;
        let user = api
            .current_user_with(&token)
            .await
            .map_err(|e| auth_failure(e, "Login failed"))?;

        self.storage.set(TOKEN_KEY, &token)?;
        self.state.send_replace(Session {
            token: Some(token),
            authenticated: true,
            user: Some(user.clone()),
        });
        tracing::info!("Logged in as {}", user.email);
        Ok(user)
    }

    /// Create the account, then log in with the same credentials
    pub async fn register(&self, api: &ApiClient, email: &str, password: &str) -> Result<User> {
        api.register(email, password)
            .await
            .map_err(|e| auth_failure(e, "Registration failed"))?;
        self.login(api, email, password).await
    }

    /// Re-fetch the profile for the stored token
    pub async fn refresh_user(&self, api: &ApiClient) -> Result<User> {
        if !self.is_authenticated() {
            return Err(Error::NotAuthenticated);
        }
        let user = api.current_user().await?;
        self.state.send_modify(|s| s.user = Some(user.clone()));
        Ok(user)
    }

    pub fn logout(&self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY) {
            tracing::warn!("Failed to remove stored token: {}", e);
        }
        self.state.send_replace(Session::default());
    }
}

impl AuthHandler for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.token()
    }

    fn on_unauthorized(&self) {
        let authenticated = self.is_authenticated();
        if authenticated {
            tracing::info!("Token rejected, logging out");
            self.logout();
        }
    }
}

fn auth_failure(error: mist_api::Error, fallback: &str) -> Error {
    tracing::warn!("{}: {}", fallback, error);
    match error.detail() {
        Some(detail) => Error::Auth(detail.to_string()),
        None => Error::Auth(fallback.to_string()),
    }
}

/// Check a registration form before it is submitted
pub fn validate_registration(password: &str, confirm: &str) -> Result<()> {
    if password != confirm {
        return Err(Error::Validation("Passwords do not match".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store_with_token(token: Option<&str>) -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(match token {
            Some(t) => MemoryStorage::with_entries([(TOKEN_KEY, t)]),
            None => MemoryStorage::new(),
        });
        let store = SessionStore::restore(storage.clone());
        (storage, store)
    }

    #[test]
    fn test_restore_from_storage() {
        let (_, store) = store_with_token(Some("abc"));
        let session = store.snapshot();
        assert!(session.authenticated);
        assert_eq!(session.token.as_deref(), Some("abc"));
        assert_eq!(store.bearer_token().as_deref(), Some("abc"));

        let (_, empty) = store_with_token(None);
        assert_eq!(empty.snapshot(), Session::default());
    }

    #[test]
    fn test_unauthorized_forces_logout() {
        let (storage, store) = store_with_token(Some("abc"));
        let mut rx = store.subscribe();

        store.on_unauthorized();

        assert_eq!(store.snapshot(), Session::default());
        assert!(storage.get(TOKEN_KEY).is_none());
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().authenticated);
    }

    #[test]
    fn test_unauthorized_when_logged_out_is_noop() {
        let (_, store) = store_with_token(None);
        let rx = store.subscribe();
        store.on_unauthorized();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_logout_clears_everything() {
        let (storage, store) = store_with_token(Some("abc"));
        store.logout();
        assert!(!store.is_authenticated());
        assert!(store.token().is_none());
        assert!(storage.get(TOKEN_KEY).is_none());
    }

    #[tokio::test]
    async fn test_failed_login_leaves_state() {
        // Nothing listens on port 9 of the loopback interface.
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let (storage, store) = store_with_token(None);

        let err = store.login(&api, "ana@example.com", "password1").await.unwrap_err();
        assert_eq!(err.to_string(), "Login failed");
        assert_eq!(store.snapshot(), Session::default());
        assert!(storage.get(TOKEN_KEY).is_none());
    }

    #[test]
    fn test_validate_registration() {
        assert!(validate_registration("longenough", "longenough").is_ok());
        assert_eq!(
            validate_registration("longenough", "different").unwrap_err().to_string(),
            "Passwords do not match"
        );
        assert_eq!(
            validate_registration("short", "short").unwrap_err().to_string(),
            "Password must be at least 8 characters"
        );
    }
}
