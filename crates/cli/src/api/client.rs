use std::time::Duration;

use reqwest::{header::HeaderMap, header::HeaderValue, Client, StatusCode};
use url::Url;

use super::ApiRequest;

/// Upper bound for a single maintenance request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
}

impl ApiError {
    /// Whether the service answered with `status`
    pub fn is_status(&self, status: StatusCode) -> bool {
        matches!(self, ApiError::HttpStatus(s, _) if *s == status)
    }
}

/// JSON client bound to one service's base URL
#[derive(Debug, Clone)]
pub struct ApiClient {
    remote: Url,
    client: Client,
}

impl ApiClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(default_headers)
            .user_agent(concat!("dfs/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    /// Send `request` and decode its response; non-2xx answers carry
    ///  the response body
    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = request_builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, body = %body, "request rejected");
            return Err(ApiError::HttpStatus(status, body));
        }
        Ok(response.json::<T::Response>().await?)
    }

    pub fn base_url(&self) -> &Url {
        &self.remote
    }
}
