//! HTTP clients for the services the maintenance commands talk to:
//!  the storage gateway (trash listing and restores) and the event
//!  bus (postprocessing and trash purge triggers).

mod client;
pub mod events;
pub mod gateway;

use reqwest::{Client, RequestBuilder, Url};

pub use client::{ApiClient, ApiError};
pub use events::HttpPublisher;
pub use gateway::HttpGateway;

/// A request against one endpoint, paired with its response type
pub trait ApiRequest {
    type Response: serde::de::DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, url::ParseError>;
}
