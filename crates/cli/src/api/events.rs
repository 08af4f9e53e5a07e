use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use common::events::{Envelope, Event, EventPublisher, PublishError};

use super::{ApiClient, ApiError, ApiRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(flatten)]
    pub envelope: Envelope,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishResponse {}

impl ApiRequest for PublishRequest {
    type Response = PublishResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, url::ParseError> {
        Ok(client.post(base_url.join("/api/v0/events")?).json(&self))
    }
}

/// [`EventPublisher`] posting events to the event bus over HTTP
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: ApiClient,
}

impl HttpPublisher {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(remote)?,
        })
    }
}

#[async_trait]
impl EventPublisher for HttpPublisher {
    async fn publish(&self, event: Event) -> Result<Uuid, PublishError> {
        let name = event.name();
        let envelope = Envelope::new(event);
        let id = envelope.id;
        tracing::debug!(id = %id, event = name, remote = %self.client.base_url(), "publishing event");

        match self.client.call(PublishRequest { envelope }).await {
            Ok(_) => Ok(id),
            Err(ApiError::HttpStatus(status, body)) => Err(PublishError::Rejected {
                event: name.to_string(),
                reason: format!("{}: {}", status, body),
            }),
            Err(e) => Err(PublishError::Transport(e.to_string())),
        }
    }
}
