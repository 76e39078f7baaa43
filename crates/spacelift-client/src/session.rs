//! API sessions and bearer token management
//!
//! A session exchanges a long-lived API key for short-lived bearer tokens and
//! keeps the current one in a [`TokenStore`].

use crate::error::{ClientError, Result};
use crate::transport::{GraphQlRequest, GraphQlTransport};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

/// Seconds before expiry at which a token stops counting as fresh
pub const DEFAULT_FRESHNESS_MARGIN_SECS: i64 = 30;

/// Path appended to the configured API endpoint
const GRAPHQL_PATH: &str = "/graphql";

const API_KEY_USER_MUTATION: &str = r#"mutation GetSpaceliftToken($id: ID!, $secret: String!) {
  apiKeyUser(id: $id, secret: $secret) {
    id
    jwt
    validUntil
  }
}"#;

/// Build the GraphQL endpoint from an account base URL
pub fn graphql_endpoint(base: &str) -> Result<Url> {
    Ok(Url::parse(&format!(
        "{}{}",
        base.trim_end_matches('/'),
        GRAPHQL_PATH
    ))?)
}

/// API key credentials. Never printed.
pub struct Credentials {
    key_id: String,
    key_secret: Secret<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key_id", &"[REDACTED]")
            .field("key_secret", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Create credentials from a key id and secret
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret: Secret::new(key_secret.into()),
        }
    }
}

/// A bearer token and the instant it stops being accepted
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    valid_until: DateTime<Utc>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("valid_until", &self.valid_until)
            .finish()
    }
}

impl Token {
    pub fn new(value: impl Into<String>, valid_until: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            valid_until,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn valid_until(&self) -> DateTime<Utc> {
        self.valid_until
    }

    /// Fresh while `now + margin` is still strictly before expiry
    pub fn is_fresh_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.valid_until
    }
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<Token>,
    generation: u64,
}

/// Thread-safe holder of the current bearer token.
///
/// Reads take a shared lock for the duration of a clone; writers replace the
/// whole token at once, so a reader sees either the old or the new token.
#[derive(Debug)]
pub struct TokenStore {
    state: RwLock<TokenState>,
    margin: Duration,
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore {
    /// Create an empty store with the default freshness margin
    pub fn new() -> Self {
        Self::with_margin(Duration::seconds(DEFAULT_FRESHNESS_MARGIN_SECS))
    }

    /// Create an empty store with a custom freshness margin
    pub fn with_margin(margin: Duration) -> Self {
        Self {
            state: RwLock::new(TokenState::default()),
            margin,
        }
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// The cached token value. Fails if no token was ever stored.
    pub fn bearer_token(&self) -> Result<String> {
        self.state
            .read()
            .token
            .as_ref()
            .map(|token| token.value.clone())
            .ok_or(ClientError::NoToken)
    }

    /// Snapshot of the cached token
    pub fn token(&self) -> Option<Token> {
        self.state.read().token.clone()
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.state
            .read()
            .token
            .as_ref()
            .is_some_and(|token| token.is_fresh_at(now, self.margin))
    }

    /// Replace the cached token, returning the new generation
    pub fn replace(&self, token: Token) -> u64 {
        let mut state = self.state.write();
        state.token = Some(token);
        state.generation += 1;
        state.generation
    }

    /// Number of replacements so far
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }
}

/// Capabilities an authenticated API session exposes
#[async_trait]
pub trait Session: Send + Sync {
    /// The GraphQL endpoint
    fn endpoint(&self) -> &Url;

    /// The current bearer token. Never performs network I/O.
    fn bearer_token(&self) -> Result<String>;

    /// Whether the current token is outside the expiry margin
    fn is_fresh(&self) -> bool;

    /// Obtain a new token and replace the cached one
    async fn refresh_token(&self) -> Result<()>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyUserData {
    api_key_user: Option<ApiKeyUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiKeyUser {
    jwt: String,
    valid_until: i64,
}

struct SessionInner {
    transport: Arc<dyn GraphQlTransport>,
    endpoint: Url,
    credentials: Credentials,
    store: TokenStore,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl SessionInner {
    async fn refresh(&self, observed_generation: u64) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        if self.store.generation() != observed_generation && self.store.is_fresh() {
            debug!("token already refreshed by a concurrent caller");
            return Ok(());
        }

        let token = self.exchange().await?;
        let valid_until = token.valid_until();
        let generation = self.store.replace(token);
        info!(%valid_until, generation, "obtained Spacelift API token");
        Ok(())
    }

    async fn exchange(&self) -> Result<Token> {
        let request = GraphQlRequest::new(API_KEY_USER_MUTATION).with_variables(json!({
            "id": self.credentials.key_id,
            "secret": self.credentials.key_secret.expose_secret(),
        }));

        let data = self
            .transport
            .execute(&self.endpoint, None, &request)
            .await
            .map_err(|err| ClientError::AuthExchange(err.to_string()))?;

        let data: ApiKeyUserData = serde_json::from_value(data)
            .map_err(|err| ClientError::AuthExchange(format!("malformed token response: {err}")))?;

        let user = data
            .api_key_user
            .ok_or_else(|| ClientError::AuthExchange("API key was rejected".to_string()))?;

        let valid_until = DateTime::from_timestamp(user.valid_until, 0).ok_or_else(|| {
            ClientError::AuthExchange(format!("invalid token expiry {}", user.valid_until))
        })?;

        Ok(Token::new(user.jwt, valid_until))
    }
}

/// Session authenticated by exchanging an API key id/secret pair
#[derive(Clone)]
pub struct ApiKeySession {
    inner: Arc<SessionInner>,
}

impl std::fmt::Debug for ApiKeySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeySession")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("token", &self.inner.store.token())
            .finish()
    }
}

impl ApiKeySession {
    /// Create a session without obtaining a token
    pub fn new(
        transport: Arc<dyn GraphQlTransport>,
        base_endpoint: &str,
        credentials: Credentials,
    ) -> Result<Self> {
        Self::with_token_store(transport, base_endpoint, credentials, TokenStore::new())
    }

    /// Create a session around a preconfigured token store
    pub fn with_token_store(
        transport: Arc<dyn GraphQlTransport>,
        base_endpoint: &str,
        credentials: Credentials,
        store: TokenStore,
    ) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                endpoint: graphql_endpoint(base_endpoint)?,
                credentials,
                store,
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Create a session and obtain its first token
    #[instrument(skip(transport, credentials))]
    pub async fn connect(
        transport: Arc<dyn GraphQlTransport>,
        base_endpoint: &str,
        credentials: Credentials,
    ) -> Result<Self> {
        let session = Self::new(transport, base_endpoint, credentials)?;
        session.refresh_token().await?;
        Ok(session)
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.inner.store
    }
}

#[async_trait]
impl Session for ApiKeySession {
    fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    fn bearer_token(&self) -> Result<String> {
        self.inner.store.bearer_token()
    }

    fn is_fresh(&self) -> bool {
        self.inner.store.is_fresh()
    }

    async fn refresh_token(&self) -> Result<()> {
        let observed = self.inner.store.generation();
        let inner = Arc::clone(&self.inner);

        // Runs to completion even if the caller is dropped mid-refresh.
        tokio::spawn(async move { inner.refresh(observed).await })
            .await
            .map_err(|err| ClientError::AuthExchange(format!("token refresh task failed: {err}")))?
    }
}
