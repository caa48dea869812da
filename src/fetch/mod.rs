//! HTTP access to the Olho Vivo API.
//!
//! [`HttpClient`] is the transport seam; [`OlhoVivoClient`] layers the API
//! endpoints on top of any implementation of it.

mod basic;
mod client;
mod olhovivo;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use olhovivo::{OlhoVivoClient, parse_login};

use anyhow::Result;

/// Executes `req` and returns the body, failing on non-success statuses.
pub async fn execute_bytes<C: HttpClient>(client: &C, req: reqwest::Request) -> Result<Vec<u8>> {
    let url = req.url().clone();
    let resp = client.execute(req).await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!(
            "{} returned status {}: {}",
            url.path(),
            status,
            body
        ));
    }

    Ok(resp.bytes().await?.to_vec())
}
