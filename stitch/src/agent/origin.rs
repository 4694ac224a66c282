//! Network boundary of the agent

use crate::error::{Result, StitchError};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use reqwest::Url;

/// Headers describing one hop only; never forwarded
const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::HOST,
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
];

#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginRequest {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| StitchError::Parse(format!("response is not UTF-8: {}", e)))
    }
}

/// Fetches from the concatenation server (or any upstream)
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse>;
}

/// Drop hop-by-hop headers before forwarding
pub fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded
}

/// [`Origin`] over HTTP
#[derive(Clone, Default)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse> {
        let response = self
            .client
            .request(request.method, request.url)
            .headers(forwardable(&request.headers))
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = forwardable(response.headers());
        let body = response.bytes().await?;

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}
