use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;

use common::reference::Reference;
use common::trash::{Gateway, GatewayError, RecycleItem, ResourceInfo, StatusCode};

use super::{ApiClient, ApiError, ApiRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatRequest {
    pub reference: Reference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatResponse {
    #[serde(default)]
    pub info: Option<ResourceInfo>,
}

impl ApiRequest for StatRequest {
    type Response = StatResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, url::ParseError> {
        Ok(client.post(base_url.join("/api/v0/stat")?).json(&self))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub reference: Reference,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteResponse {}

impl ApiRequest for DeleteRequest {
    type Response = DeleteResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, url::ParseError> {
        Ok(client.post(base_url.join("/api/v0/delete")?).json(&self))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecycleRequest {
    pub reference: Reference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecycleResponse {
    pub items: Vec<RecycleItem>,
}

impl ApiRequest for ListRecycleRequest {
    type Response = ListRecycleResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, url::ParseError> {
        Ok(client.post(base_url.join("/api/v0/recycle/list")?).json(&self))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreRequest {
    pub space: Reference,
    pub key: String,
    pub destination: Reference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResponse {
    pub reference: Reference,
}

impl ApiRequest for RestoreRequest {
    type Response = RestoreResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, url::ParseError> {
        Ok(client.post(base_url.join("/api/v0/recycle/restore")?).json(&self))
    }
}

/// [`Gateway`] over the storage gateway's HTTP API
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: ApiClient,
}

impl HttpGateway {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(remote)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        self.client.base_url()
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn stat(&self, reference: &Reference) -> Result<Option<ResourceInfo>, GatewayError> {
        let request = StatRequest {
            reference: reference.clone(),
        };
        match self.client.call(request).await {
            Ok(response) => Ok(response.info),
            Err(e) if e.is_status(reqwest::StatusCode::NOT_FOUND) => Ok(None),
            Err(e) => Err(gateway_error(e)),
        }
    }

    async fn delete(&self, reference: &Reference) -> Result<(), GatewayError> {
        let request = DeleteRequest {
            reference: reference.clone(),
        };
        self.client.call(request).await.map_err(gateway_error)?;
        Ok(())
    }

    async fn list_recycle(&self, reference: &Reference) -> Result<Vec<RecycleItem>, GatewayError> {
        let request = ListRecycleRequest {
            reference: reference.clone(),
        };
        Ok(self.client.call(request).await.map_err(gateway_error)?.items)
    }

    async fn restore(
        &self,
        space: &Reference,
        key: &str,
        destination: &Reference,
    ) -> Result<Reference, GatewayError> {
        let request = RestoreRequest {
            space: space.clone(),
            key: key.to_string(),
            destination: destination.clone(),
        };
        Ok(self.client.call(request).await.map_err(gateway_error)?.reference)
    }
}

fn gateway_error(error: ApiError) -> GatewayError {
    match error {
        ApiError::HttpStatus(status, body) => GatewayError::status(status_code(status), body),
        other => GatewayError::Transport(other.to_string()),
    }
}

fn status_code(status: reqwest::StatusCode) -> StatusCode {
    use reqwest::StatusCode as Http;

    match status {
        Http::NOT_FOUND => StatusCode::NotFound,
        Http::UNAUTHORIZED | Http::FORBIDDEN => StatusCode::PermissionDenied,
        Http::CONFLICT => StatusCode::AlreadyExists,
        Http::PRECONDITION_FAILED => StatusCode::Aborted,
        Http::BAD_GATEWAY | Http::SERVICE_UNAVAILABLE | Http::GATEWAY_TIMEOUT => {
            StatusCode::Unavailable
        }
        s if s.is_server_error() => StatusCode::Internal,
        _ => StatusCode::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::reference::ResourceId;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_code(reqwest::StatusCode::NOT_FOUND), StatusCode::NotFound);
        assert_eq!(status_code(reqwest::StatusCode::FORBIDDEN), StatusCode::PermissionDenied);
        assert_eq!(status_code(reqwest::StatusCode::CONFLICT), StatusCode::AlreadyExists);
        assert_eq!(status_code(reqwest::StatusCode::INTERNAL_SERVER_ERROR), StatusCode::Internal);
        assert_eq!(status_code(reqwest::StatusCode::BAD_REQUEST), StatusCode::Unknown);

        let error = gateway_error(ApiError::HttpStatus(reqwest::StatusCode::NOT_FOUND, "gone".into()));
        assert!(error.is_not_found());
    }

    #[test]
    fn test_restore_request() {
        let base = Url::parse("http://localhost:9142/").unwrap();
        let space = Reference::space_root(ResourceId::space("space-1"));
        let request = RestoreRequest {
            space: space.clone(),
            key: "item-1".to_string(),
            destination: space.with_path("./a.txt"),
        }
        .build_request(&base, &Client::new())
        .unwrap()
        .build()
        .unwrap();

        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(request.url().as_str(), "http://localhost:9142/api/v0/recycle/restore");
    }
}
