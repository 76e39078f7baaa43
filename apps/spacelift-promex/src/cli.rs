//! Command-line argument parsing

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "spacelift-promex",
    about = "Prometheus exporter for Spacelift",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Starts the Prometheus exporter
    Serve(ServeArgs),
}

#[derive(Args, Clone)]
pub struct ServeArgs {
    /// The address to listen on for HTTP requests
    #[arg(
        short,
        long,
        env = "SPACELIFT_PROMEX_LISTEN_ADDRESS",
        default_value = ":9953"
    )]
    pub listen_address: String,

    /// Your Spacelift API endpoint (e.g. https://myaccount.app.spacelift.io)
    #[arg(short = 'e', long, env = "SPACELIFT_PROMEX_API_ENDPOINT")]
    pub api_endpoint: String,

    /// Path to a PEM-encoded CA certificate to trust in addition to system certificates
    #[arg(long, env = "SPACELIFT_PROMEX_CA_CERT_PATH")]
    pub ca_cert_path: Option<PathBuf>,

    /// Your Spacelift API key ID
    #[arg(short = 'k', long, env = "SPACELIFT_PROMEX_API_KEY_ID")]
    pub api_key_id: String,

    /// Your Spacelift API key secret
    #[arg(
        short = 's',
        long,
        env = "SPACELIFT_PROMEX_API_KEY_SECRET",
        hide_env_values = true
    )]
    pub api_key_secret: String,

    /// Uses settings appropriate during local development
    #[arg(short = 'd', long, env = "SPACELIFT_PROMEX_IS_DEVELOPMENT")]
    pub is_development: bool,

    /// The maximum duration to wait for a response from the Spacelift API during scraping
    #[arg(
        short = 't',
        long,
        env = "SPACELIFT_PROMEX_SCRAPE_TIMEOUT",
        default_value = "5s",
        value_parser = parse_duration
    )]
    pub scrape_timeout: Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        env = "SPACELIFT_PROMEX_LOG_LEVEL",
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: String,
}

impl std::fmt::Debug for ServeArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServeArgs")
            .field("listen_address", &self.listen_address)
            .field("api_endpoint", &self.api_endpoint)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("api_key_id", &"[REDACTED]")
            .field("api_key_secret", &"[REDACTED]")
            .field("is_development", &self.is_development)
            .field("scrape_timeout", &self.scrape_timeout)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl ServeArgs {
    /// Validate the arguments
    pub fn validate(&self) -> Result<()> {
        if self.scrape_timeout.is_zero() {
            bail!("scrape-timeout must be greater than 0");
        }

        match Url::parse(&self.api_endpoint) {
            Ok(url) if !url.scheme().is_empty() && url.has_host() => {}
            _ => bail!(
                "api-endpoint {:?} does not seem to be a valid URL",
                self.api_endpoint
            ),
        }

        self.bind_address()?;

        Ok(())
    }

    /// Address to bind, with a bare `:port` expanded to all interfaces
    pub fn bind_address(&self) -> Result<String> {
        let Some((host, port)) = self.listen_address.rsplit_once(':') else {
            bail!(
                "listen-address {:?} must be of the form host:port",
                self.listen_address
            );
        };

        if port.parse::<u16>().is_err() {
            bail!(
                "listen-address {:?} has an invalid port",
                self.listen_address
            );
        }

        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Ok(format!("{host}:{port}"))
    }
}

/// Parse durations like "500ms", "5s", "1m" or "2h". A bare number is seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("invalid duration {s:?}, expected a number with a ms, s, m or h suffix");

    let (number, unit_millis) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        (s, 1_000)
    };

    let value: u64 = number.trim().parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit_millis)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}
