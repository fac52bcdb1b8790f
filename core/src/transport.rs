//! The wire-level collaborator behind [`crate::ApiClient`].
//!
//! The client never talks to the network itself. It hands a fully prepared
//! [`HttpRequest`] to a `Transport` and gets back an [`HttpResponse`] for any
//! status code; only failures that produced no response at all are errors.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Url};

use crate::error::TransportError;
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody, ResponseKind};

const APP_USER_AGENT: &str = concat!("apikit/", env!("CARGO_PKG_VERSION"));

/// Executes prepared requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Wrap an already configured client (proxies, TLS, timeouts).
    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = self
            .inner
            .request(to_method(request.method), url)
            .headers(header_map(&request.headers, request.response_kind)?);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            None => builder,
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Multipart { field, file }) => {
                builder.multipart(Form::new().part(field, file_part(file)?))
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn header_map(
    headers: &[(String, String)],
    kind: ResponseKind,
) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        map.append(header_name, header_value);
    }
    if !map.contains_key(ACCEPT) {
        let accept = match kind {
            ResponseKind::Json => "application/json, text/plain, */*",
            ResponseKind::Text => "text/plain, */*",
            ResponseKind::Binary => "*/*",
        };
        map.insert(ACCEPT, HeaderValue::from_static(accept));
    }
    Ok(map)
}

fn file_part(file: FilePart) -> Result<Part, TransportError> {
    let length = file.bytes.len() as u64;
    let part = Part::stream_with_length(file.bytes, length).file_name(file.file_name);
    match file.content_type {
        Some(content_type) => part
            .mime_str(&content_type)
            .map_err(|e| TransportError::Encoding(e.to_string())),
        None => Ok(part),
    }
}
