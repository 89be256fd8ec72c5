//! HTTP collaborator.
//!
//! The engine only needs a single GET with extra headers, so the transport is
//! a small trait. [`ReqwestClient`] is the production implementation; tests
//! substitute an in-memory fake.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::error::Result;

/// A fully buffered HTTP response. Header names are lowercase.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issues one GET. Non-2xx statuses are returned, not raised.
    async fn get(&self, url: &Url, headers: &BTreeMap<String, String>) -> Result<HttpResponse>;
}

// ============================================================================
// reqwest implementation
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(settings.user_agent.as_str());
        if let Some(timeout) = settings.http_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &Url, headers: &BTreeMap<String, String>) -> Result<HttpResponse> {
        let mut request = self.client.get(url.clone());
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
