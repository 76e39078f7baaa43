//! Authenticated query client

use crate::error::Result;
use crate::session::Session;
use crate::transport::{GraphQlRequest, GraphQlTransport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn, Span};

/// Executes queries with the session's bearer token.
///
/// A request rejected as unauthorized triggers one token refresh and one
/// more attempt. The second outcome is returned as-is.
#[derive(Clone)]
pub struct AuthenticatedClient {
    transport: Arc<dyn GraphQlTransport>,
    session: Arc<dyn Session>,
    span: Span,
}

impl std::fmt::Debug for AuthenticatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedClient")
            .field("endpoint", &self.session.endpoint().as_str())
            .finish()
    }
}

impl AuthenticatedClient {
    /// Create a client over a transport and a session
    pub fn new(transport: Arc<dyn GraphQlTransport>, session: Arc<dyn Session>) -> Self {
        Self {
            transport,
            session,
            span: Span::none(),
        }
    }

    /// Emit log events under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn session(&self) -> &Arc<dyn Session> {
        &self.session
    }

    /// Execute a query and decode its `data` member into `T`
    pub async fn query<T: DeserializeOwned>(&self, request: &GraphQlRequest) -> Result<T> {
        let data = match self.execute(request).await {
            Err(err) if err.is_unauthorized() => {
                warn!(
                    parent: &self.span,
                    error = %err,
                    "Server returned an unauthorized response - retrying request with a new token"
                );
                self.session.refresh_token().await?;
                self.execute(request).await?
            }
            outcome => outcome?,
        };

        Ok(serde_json::from_value(data)?)
    }

    async fn execute(&self, request: &GraphQlRequest) -> Result<Value> {
        let token = self.session.bearer_token()?;

        if !self.session.is_fresh() {
            debug!(parent: &self.span, "presenting a token that is close to expiry");
        }

        self.transport
            .execute(self.session.endpoint(), Some(&token), request)
            .await
    }
}
