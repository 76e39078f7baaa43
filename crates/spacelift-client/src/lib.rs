//! # Spacelift client
//!
//! Authenticated access to the Spacelift GraphQL API.
//!
//! ```rust,no_run
//! use spacelift_client::{ApiKeySession, AuthenticatedClient, Credentials, HttpTransport};
//! use std::sync::Arc;
//!
//! # async fn run() -> spacelift_client::Result<()> {
//! let transport = Arc::new(HttpTransport::new(reqwest::Client::new()));
//! let session = ApiKeySession::connect(
//!     transport.clone(),
//!     "https://myaccount.app.spacelift.io",
//!     Credentials::new("key-id", "key-secret"),
//! )
//! .await?;
//! let _client = AuthenticatedClient::new(transport, Arc::new(session));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod session;
pub mod transport;

pub use client::AuthenticatedClient;
pub use error::{ClientError, ErrorKind, Result};
pub use session::{ApiKeySession, Credentials, Session, Token, TokenStore};
pub use transport::{GraphQlRequest, GraphQlTransport, HttpTransport, CLIENT_IDENTIFIER};
