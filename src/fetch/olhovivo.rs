use anyhow::{Context, Result};
use reqwest::header::{CONTENT_LENGTH, HeaderValue};
use reqwest::{Method, Request, Url};
use tracing::debug;

use super::client::HttpClient;
use super::execute_bytes;
use crate::parser::{
    LinePredictionsPayload, PositionsPayload, parse_line_predictions, parse_positions,
};

/// Olho Vivo endpoints over an [`HttpClient`].
///
/// The API is session based: [`OlhoVivoClient::authenticate`] must succeed on
/// the same underlying client before the data endpoints answer.
pub struct OlhoVivoClient<C> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> OlhoVivoClient<C> {
    pub fn new(http: C, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        format!("{}{}", self.base_url, path)
            .parse()
            .with_context(|| format!("Invalid API URL for {path}"))
    }

    /// `POST /Login/Autenticar?token=..`. Returns the API's success flag.
    pub async fn authenticate(&self, token: &str) -> Result<bool> {
        let mut url = self.url("/Login/Autenticar")?;
        url.query_pairs_mut().append_pair("token", token);

        let mut req = Request::new(Method::POST, url);
        req.headers_mut()
            .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));

        let bytes = execute_bytes(&self.http, req).await?;
        let ok = parse_login(&bytes)?;
        debug!(authenticated = ok, "Login response received");
        Ok(ok)
    }

    /// `GET /Posicao`: every vehicle of every line.
    pub async fn positions(&self) -> Result<PositionsPayload> {
        let req = Request::new(Method::GET, self.url("/Posicao")?);
        let bytes = execute_bytes(&self.http, req).await?;
        debug!(bytes = bytes.len(), "Positions received");
        parse_positions(&bytes)
    }

    /// `GET /Previsao/Linha?codigoLinha=..`: arrival predictions along one line.
    pub async fn line_predictions(&self, line_id: i64) -> Result<LinePredictionsPayload> {
        let mut url = self.url("/Previsao/Linha")?;
        url.query_pairs_mut()
            .append_pair("codigoLinha", &line_id.to_string());

        let req = Request::new(Method::GET, url);
        let bytes = execute_bytes(&self.http, req).await?;
        debug!(line_id, bytes = bytes.len(), "Predictions received");
        parse_line_predictions(&bytes)
    }
}

/// The login endpoint answers with a bare JSON boolean.
pub fn parse_login(bytes: &[u8]) -> Result<bool> {
    serde_json::from_slice(bytes).context("Unexpected login response")
}
