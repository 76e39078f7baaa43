//! Outbound HTTP client configuration

use anyhow::{bail, Context, Result};
use reqwest::tls::Version;
use reqwest::{Certificate, Client};
use std::path::Path;

/// Build the client shared by the session and every scrape.
///
/// When `ca_cert_path` is set, the certificates in that PEM file are
/// trusted in addition to the built-in roots.
pub fn build_http_client(ca_cert_path: Option<&Path>) -> Result<Client> {
    let mut builder = Client::builder()
        .use_rustls_tls()
        .min_tls_version(Version::TLS_1_2);

    if let Some(path) = ca_cert_path {
        for certificate in load_certificates(path)? {
            builder = builder.add_root_certificate(certificate);
        }
    }

    builder.build().context("could not configure HTTP client")
}

fn load_certificates(path: &Path) -> Result<Vec<Certificate>> {
    let pem = std::fs::read(path)
        .with_context(|| format!("could not read CA cert file \"{}\"", path.display()))?;

    let certificates = Certificate::from_pem_bundle(&pem)
        .with_context(|| format!("could not parse CA cert file \"{}\"", path.display()))?;

    if certificates.is_empty() {
        bail!(
            "could not parse CA cert file \"{}\": no certificates found",
            path.display()
        );
    }

    Ok(certificates)
}
