//! GraphQL transport
//!
//! Executes a single GraphQL document over HTTP and classifies whatever the
//! server reports into a [`ClientError`]. This is the only place where remote
//! error payloads are inspected.

use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

/// Value sent in the `User-Agent` header of every API request
pub const CLIENT_IDENTIFIER: &str = concat!("spacelift-promex/", env!("CARGO_PKG_VERSION"));

/// Error code some GraphQL servers put in `extensions.code` for a rejected token
const UNAUTHORIZED_CODE: &str = "UNAUTHORIZED";

/// A GraphQL document plus its variables
#[derive(Clone, Serialize)]
pub struct GraphQlRequest {
    query: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<Value>,
}

impl std::fmt::Debug for GraphQlRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Variables may carry credentials.
        f.debug_struct("GraphQlRequest")
            .field("query", &self.query)
            .field("variables", &self.variables.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl GraphQlRequest {
    /// Create a request without variables
    pub fn new(query: &'static str) -> Self {
        Self {
            query,
            variables: None,
        }
    }

    /// Attach variables to the request
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// The GraphQL document
    pub fn query(&self) -> &'static str {
        self.query
    }
}

/// A single error entry of a GraphQL response
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    pub message: String,
    #[serde(default)]
    pub extensions: Option<Value>,
}

impl GraphQlError {
    fn is_unauthorized(&self) -> bool {
        let code_matches = self
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(Value::as_str)
            .is_some_and(|code| code.eq_ignore_ascii_case(UNAUTHORIZED_CODE));

        code_matches || self.message.to_ascii_lowercase().contains("unauthorized")
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    fn into_data(self) -> Result<Value> {
        if !self.errors.is_empty() {
            return Err(classify_errors(self.errors));
        }

        self.data
            .filter(|data| !data.is_null())
            .ok_or_else(|| ClientError::RemoteQuery {
                messages: vec!["response contained no data".to_string()],
            })
    }
}

/// Turn the `errors` array of a GraphQL response into a single error.
///
/// Any unauthorized entry wins, so the caller can recover by refreshing its
/// token.
pub fn classify_errors(errors: Vec<GraphQlError>) -> ClientError {
    if let Some(err) = errors.iter().find(|err| err.is_unauthorized()) {
        return ClientError::Unauthorized(err.message.clone());
    }

    ClientError::RemoteQuery {
        messages: errors.into_iter().map(|err| err.message).collect(),
    }
}

/// Capability to execute one GraphQL request
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    /// Execute `request` against `endpoint`, presenting `bearer` if given,
    /// and return the `data` member of the response.
    async fn execute(
        &self,
        endpoint: &Url,
        bearer: Option<&str>,
        request: &GraphQlRequest,
    ) -> Result<Value>;
}

/// [`GraphQlTransport`] backed by a shared [`reqwest::Client`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    /// Wrap an HTTP client
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl GraphQlTransport for HttpTransport {
    #[instrument(skip(self, bearer, request), fields(endpoint = %endpoint))]
    async fn execute(
        &self,
        endpoint: &Url,
        bearer: Option<&str>,
        request: &GraphQlRequest,
    ) -> Result<Value> {
        let mut req = self
            .http
            .post(endpoint.clone())
            .header(header::USER_AGENT, CLIENT_IDENTIFIER)
            .header(header::ACCEPT, "application/json")
            .json(request);

        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }

        let response = req.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "received GraphQL response");

        match serde_json::from_slice::<GraphQlResponse>(&body) {
            Ok(envelope) if status.is_success() || !envelope.errors.is_empty() => {
                envelope.into_data()
            }
            Ok(_) => Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(err) => Err(ClientError::Decode(err)),
        }
    }
}
