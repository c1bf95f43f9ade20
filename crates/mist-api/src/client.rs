//! HTTP client for the auth and chat endpoints

use std::sync::Arc;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    types::{
        ChatReply, ChatRequest, ConversationSummary, ConversationTarget, DeleteResponse,
        RegisterRequest, StoredMessage, TokenResponse, User,
    },
};

/// Supplies the bearer token and reacts to rejected tokens.
///
/// Installed once on an [`ApiClient`]; every authenticated request asks it for
/// the current token, and every 401 response is reported back to it.
pub trait AuthHandler: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Called for every 401 response
    fn on_unauthorized(&self) {}
}

/// Handler for clients that never authenticate
pub struct NoAuth;

impl AuthHandler for NoAuth {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Client for the chat backend
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Arc<dyn AuthHandler>,
}

impl ApiClient {
    /// Create a client for a server root such as `http://localhost:8000`
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            auth: Arc::new(NoAuth),
        })
    }

    /// Install the token source and 401 hook
    pub fn with_auth_handler(mut self, auth: Arc<dyn AuthHandler>) -> Self {
        self.auth = auth;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an absolute API path against the server root, keeping any path prefix
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let root = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{root}{path}"))?)
    }

    /// WebSocket URL for a conversation, with the token in the query string
    pub fn socket_url(&self, target: &ConversationTarget, token: &str) -> Result<Url> {
        let mut url = self.endpoint(&format!("/api/chat/ws/{}", target.path_segment()))?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| Error::WebSocket(format!("cannot use scheme {scheme} for {url}")))?;
        url.query_pairs_mut().append_pair("token", token);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map non-success statuses to errors, firing the 401 hook
    async fn check(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("{} returned 401", response.url().path());
            self.auth.on_unauthorized();
            return Err(Error::Unauthorized);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::api(status.as_u16(), extract_detail(&body)))
    }

    async fn json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.check(request.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Exchange credentials for an access token (form-encoded)
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let url = self.endpoint("/api/auth/jwt/login")?;
        tracing::debug!("POST {}", url);
        let request = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)]);
        self.json(request).await
    }

    /// Create an account; the caller logs in afterwards
    pub async fn register(&self, email: &str, password: &str) -> Result<User> {
        let url = self.endpoint("/api/auth/register")?;
        tracing::debug!("POST {}", url);
        let request = self.http.post(url).json(&RegisterRequest { email, password });
        self.json(request).await
    }

    /// Fetch the account behind an explicit token
    pub async fn current_user_with(&self, token: &str) -> Result<User> {
        let url = self.endpoint("/api/auth/users/me")?;
        self.json(self.http.get(url).bearer_auth(token)).await
    }

    /// Fetch the account behind the installed token
    pub async fn current_user(&self) -> Result<User> {
        let url = self.endpoint("/api/auth/users/me")?;
        self.json(self.authorized(self.http.get(url))).await
    }

    pub async fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let url = self.endpoint("/api/chat/conversations")?;
        self.json(self.authorized(self.http.get(url))).await
    }

    pub async fn conversation_messages(&self, id: Uuid) -> Result<Vec<StoredMessage>> {
        let url = self.endpoint(&format!("/api/chat/conversations/{id}/messages"))?;
        self.json(self.authorized(self.http.get(url))).await
    }

    pub async fn delete_conversation(&self, id: Uuid) -> Result<DeleteResponse> {
        let url = self.endpoint(&format!("/api/chat/conversations/{id}"))?;
        tracing::debug!("DELETE {}", url);
        self.json(self.authorized(self.http.delete(url))).await
    }

    /// Single-shot chat turn; `None` starts a new conversation
    pub async fn send_message(
        &self,
        message: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<ChatReply> {
        let url = self.endpoint("/api/chat/")?;
        tracing::debug!("POST {} (conversation {:?})", url, conversation_id);
        let body = ChatRequest {
            message,
            conversation_id,
        };
        self.json(self.authorized(self.http.post(url).json(&body)))
            .await
    }
}

/// Pull a human-readable `detail` out of an error body
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
            .next()
            .map(str::to_string),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}
