use async_trait::async_trait;
use reqwest::{Request, Response};

/// Transport used by [`super::OlhoVivoClient`].
///
/// Implementations must keep cookies between calls: the API authenticates
/// a session, not individual requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
