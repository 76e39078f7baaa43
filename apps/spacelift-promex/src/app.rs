//! Application wiring and startup

use anyhow::{anyhow, Context, Result};
use spacelift_client::{
    ApiKeySession, AuthenticatedClient, Credentials, GraphQlTransport, HttpTransport,
};
use spacelift_metrics::{BuildInfo, SpaceliftCollector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, info_span};

use crate::cli::ServeArgs;
use crate::http_client::build_http_client;
use crate::server::{AppState, Server};

/// Deadline for obtaining the first token at startup
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Main application
pub struct App {
    bind_address: String,
    state: AppState,
}

impl App {
    /// Validate the configuration, authenticate against the API and build
    /// the collector. Any failure here is a startup error.
    pub async fn build(args: ServeArgs) -> Result<Self> {
        args.validate().context("Invalid command line arguments")?;
        let bind_address = args.bind_address()?;

        let http = build_http_client(args.ca_cert_path.as_deref())?;
        let transport: Arc<dyn GraphQlTransport> = Arc::new(HttpTransport::new(http));

        info!("Prepping exporter for lift-off");

        let credentials = Credentials::new(args.api_key_id, args.api_key_secret);
        let session = tokio::time::timeout(
            SESSION_TIMEOUT,
            ApiKeySession::connect(transport.clone(), &args.api_endpoint, credentials),
        )
        .await
        .map_err(|_| anyhow!("timed out after {SESSION_TIMEOUT:?}"))
        .and_then(|connected| connected.map_err(anyhow::Error::from))
        .context("could not create session from Spacelift API key")?;

        info!("Successfully created Spacelift API session");

        let span = info_span!("collector", endpoint = %args.api_endpoint);
        let client =
            AuthenticatedClient::new(transport, Arc::new(session)).with_span(span.clone());
        let collector = SpaceliftCollector::new(Arc::new(client), args.scrape_timeout)
            .with_build_info(BuildInfo::new(env!("CARGO_PKG_VERSION")))
            .with_span(span);

        Ok(Self {
            bind_address,
            state: AppState {
                collector: Arc::new(collector),
            },
        })
    }

    /// Run the application until a stop signal
    pub async fn run(self) -> Result<()> {
        Server::new(self.bind_address, self.state).run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn args(endpoint: &str, timeout: &str) -> ServeArgs {
        let cli = Cli::try_parse_from([
            "spacelift-promex",
            "serve",
            "--api-endpoint",
            endpoint,
            "--api-key-id",
            "key-id",
            "--api-key-secret",
            "key-secret",
            "--scrape-timeout",
            timeout,
        ])
        .unwrap();

        match cli.command {
            Command::Serve(args) => args,
        }
    }

    #[tokio::test]
    async fn test_invalid_endpoint_fails_before_network() {
        let err = App::build(args("not a url", "5s")).await.err().unwrap();
        assert!(format!("{err:#}").contains("does not seem to be a valid URL"));
    }

    #[tokio::test]
    async fn test_zero_timeout_fails_before_network() {
        let err = App::build(args("https://acct.example.com", "0ms"))
            .await
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("scrape-timeout must be greater than 0"));
    }

    #[test]
    fn test_build_info_uses_binary_version() {
        let info = BuildInfo::new(env!("CARGO_PKG_VERSION"));
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert!(!info.commit.is_empty());
    }
}
