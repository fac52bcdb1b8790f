//! Configured entry point for outbound API calls.
//!
//! # Design
//! `ApiClient` is a cheap-to-clone handle around one shared configuration:
//! base URL, default headers, auth token, resource path, the two hook chains
//! and the transport. Every clone sees every mutation. A request snapshots
//! that configuration once, when it is prepared, and then runs without
//! holding the lock, so a token update only affects requests prepared after
//! it.
//!
//! Operations return `Err(ApiError)` on any failure. Callers that prefer an
//! envelope either way wrap the call in [`crate::afetch`].

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::envelope::{ApiSuccess, ResponseEnvelope};
use crate::error::{ApiError, TransportError};
use crate::http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody, ResponseKind};
use crate::interceptor::{HookChain, InterceptorId, RequestHook, ResponseHook};
use crate::transport::{ReqwestTransport, Transport};

const AUTHORIZATION: &str = "Authorization";

pub const REQUEST_SUCCESS_MESSAGE: &str = "Request successful";
pub const DOWNLOAD_SUCCESS_MESSAGE: &str = "File downloaded successfully";
pub const FILE_UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully";
pub const IMAGE_UPLOAD_SUCCESS_MESSAGE: &str = "Image uploaded successfully";

/// Shared, configured HTTP client.
#[derive(Clone)]
pub struct ApiClient {
    state: Arc<RwLock<ClientState>>,
}

struct ClientState {
    transport: Arc<dyn Transport>,
    base_url: String,
    headers: Vec<(String, String)>,
    auth_token: Option<String>,
    resource_path: String,
    request_hooks: HookChain<RequestHook>,
    response_hooks: HookChain<ResponseHook>,
}

/// A request ready to send, plus what is needed to finish it.
struct Prepared {
    transport: Arc<dyn Transport>,
    request: HttpRequest,
    response_hooks: Vec<Arc<ResponseHook>>,
}

impl ClientState {
    fn new(config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        let mut headers = Vec::new();
        merge_headers(&mut headers, config.headers);
        Self {
            transport,
            base_url: config.base_url,
            headers,
            auth_token: config.auth_token.filter(|t| !t.is_empty()),
            resource_path: config.resource_path,
            request_hooks: HookChain::new(),
            response_hooks: HookChain::new(),
        }
    }

    fn prepare(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<RequestBody>,
        params: Option<&Value>,
        response_kind: ResponseKind,
    ) -> Result<Prepared, ApiError> {
        let query = match params {
            Some(params) => query_pairs(params).map_err(|e| {
                warn!(error = %e, "invalid query parameters");
                ApiError::from(e)
            })?,
            None => Vec::new(),
        };

        let mut request = HttpRequest {
            method,
            url: combine_urls(&self.base_url, &prefix_path(&self.resource_path, url)),
            headers: self.headers.clone(),
            query,
            body,
            response_kind,
        };
        if let Some(token) = &self.auth_token {
            request.set_header(AUTHORIZATION, format!("Bearer {token}"));
        }
        for hook in self.request_hooks.snapshot() {
            hook(&mut request);
        }

        Ok(Prepared {
            transport: Arc::clone(&self.transport),
            request,
            response_hooks: self.response_hooks.snapshot(),
        })
    }
}

impl ApiClient {
    /// Client backed by a fresh [`ReqwestTransport`].
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            state: Arc::new(RwLock::new(ClientState::new(config, transport))),
        }
    }

    /// Reset the client: new transport, new configuration, no hooks.
    pub async fn initialize(&self, config: ApiConfig) -> Result<(), ApiError> {
        let transport = ReqwestTransport::new()?;
        self.initialize_with(config, Arc::new(transport)).await;
        Ok(())
    }

    /// Like [`ApiClient::initialize`] with a caller-supplied transport.
    pub async fn initialize_with(&self, config: ApiConfig, transport: Arc<dyn Transport>) {
        info!(base_url = %config.base_url, resource_path = %config.resource_path, "initializing API client");
        let fresh = ClientState::new(config, transport);
        *self.state.write().await = fresh;
    }

    pub async fn set_default_resource_path(&self, path: impl Into<String>) {
        self.state.write().await.resource_path = path.into();
    }

    /// Merge `headers` into the defaults. Existing names are overwritten,
    /// names not mentioned are kept.
    pub async fn set_headers<I, K, V>(&self, headers: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut state = self.state.write().await;
        merge_headers(
            &mut state.headers,
            headers.into_iter().map(|(k, v)| (k.into(), v.into())),
        );
    }

    /// Set the bearer token for subsequent requests; `None` clears it.
    pub async fn update_auth_token(&self, token: Option<&str>) {
        let mut state = self.state.write().await;
        match token.filter(|t| !t.is_empty()) {
            Some(token) => state.auth_token = Some(token.to_string()),
            None => {
                state.auth_token = None;
                state.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(AUTHORIZATION));
            }
        }
    }

    pub async fn add_interceptor<F>(&self, hook: F) -> InterceptorId
    where
        F: Fn(&mut HttpRequest) + Send + Sync + 'static,
    {
        let id = self.state.write().await.request_hooks.add(Arc::new(hook));
        debug!(%id, "request interceptor added");
        id
    }

    /// Returns `false` if `id` was not registered.
    pub async fn remove_interceptor(&self, id: InterceptorId) -> bool {
        self.state.write().await.request_hooks.remove(id)
    }

    pub async fn add_post_interceptor<F>(&self, hook: F) -> InterceptorId
    where
        F: Fn(&mut HttpResponse) + Send + Sync + 'static,
    {
        let id = self.state.write().await.response_hooks.add(Arc::new(hook));
        debug!(%id, "response interceptor added");
        id
    }

    /// Returns `false` if `id` was not registered.
    pub async fn remove_post_interceptor(&self, id: InterceptorId) -> bool {
        self.state.write().await.response_hooks.remove(id)
    }

    /// Fresh token for cancelling one `get`.
    pub fn cancel_token_source(&self) -> CancellationToken {
        CancellationToken::new()
    }

    pub async fn resource_path(&self) -> String {
        self.state.read().await.resource_path.clone()
    }

    pub async fn auth_token(&self) -> Option<String> {
        self.state.read().await.auth_token.clone()
    }

    pub async fn default_headers(&self) -> BTreeMap<String, String> {
        self.state.read().await.headers.iter().cloned().collect()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let prepared = self
            .prepare(HttpMethod::Get, url, None, params.as_ref(), ResponseKind::Json)
            .await?;
        let response = dispatch(prepared, cancel).await?;
        json_envelope(&response)
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        data: Option<Value>,
        params: Option<Value>,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let body = data.map(RequestBody::Json);
        let prepared = self
            .prepare(HttpMethod::Post, url, body, params.as_ref(), ResponseKind::Json)
            .await?;
        let response = dispatch(prepared, None).await?;
        json_envelope(&response)
    }

    pub async fn put<T: DeserializeOwned>(
        &self,
        url: &str,
        data: Option<Value>,
        params: Option<Value>,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let body = data.map(RequestBody::Json);
        let prepared = self
            .prepare(HttpMethod::Put, url, body, params.as_ref(), ResponseKind::Json)
            .await?;
        let response = dispatch(prepared, None).await?;
        json_envelope(&response)
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        url: &str,
        params: Option<Value>,
    ) -> Result<ResponseEnvelope<T>, ApiError> {
        let prepared = self
            .prepare(HttpMethod::Delete, url, None, params.as_ref(), ResponseKind::Json)
            .await?;
        let response = dispatch(prepared, None).await?;
        json_envelope(&response)
    }

    /// GET a binary payload.
    pub async fn download_file(
        &self,
        url: &str,
        params: Option<Value>,
    ) -> Result<ResponseEnvelope<Bytes>, ApiError> {
        let prepared = self
            .prepare(HttpMethod::Get, url, None, params.as_ref(), ResponseKind::Binary)
            .await?;
        let response = dispatch(prepared, None).await?;
        Ok(ApiSuccess::with_message(DOWNLOAD_SUCCESS_MESSAGE).create_response(Some(response.body)))
    }

    /// POST `file` as the multipart part named `file`.
    pub async fn upload_file(
        &self,
        url: &str,
        file: FilePart,
        params: Option<Value>,
    ) -> Result<ResponseEnvelope<String>, ApiError> {
        self.upload(url, "file", file, params, FILE_UPLOAD_SUCCESS_MESSAGE)
            .await
    }

    /// POST `image` as the multipart part named `image`.
    pub async fn upload_image(
        &self,
        url: &str,
        image: FilePart,
        params: Option<Value>,
    ) -> Result<ResponseEnvelope<String>, ApiError> {
        self.upload(url, "image", image, params, IMAGE_UPLOAD_SUCCESS_MESSAGE)
            .await
    }

    async fn upload(
        &self,
        url: &str,
        field: &str,
        file: FilePart,
        params: Option<Value>,
        message: &str,
    ) -> Result<ResponseEnvelope<String>, ApiError> {
        let body = RequestBody::Multipart {
            field: field.to_string(),
            file,
        };
        let prepared = self
            .prepare(HttpMethod::Post, url, Some(body), params.as_ref(), ResponseKind::Text)
            .await?;
        let response = dispatch(prepared, None).await?;
        let text = String::from_utf8_lossy(&response.body).into_owned();
        Ok(ApiSuccess::with_message(message).create_response(Some(text)))
    }

    async fn prepare(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<RequestBody>,
        params: Option<&Value>,
        response_kind: ResponseKind,
    ) -> Result<Prepared, ApiError> {
        self.state
            .read()
            .await
            .prepare(method, url, body, params, response_kind)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

/// Send a prepared request and classify the response.
async fn dispatch(
    prepared: Prepared,
    cancel: Option<&CancellationToken>,
) -> Result<HttpResponse, ApiError> {
    let Prepared {
        transport,
        request,
        response_hooks,
    } = prepared;
    let method = request.method.as_str();
    let url = request.url.clone();
    debug!(method, %url, "dispatching request");

    let outcome = match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(method, %url, "request canceled");
                return Err(ApiError::canceled());
            }
            result = transport.execute(request) => result,
        },
        None => transport.execute(request).await,
    };

    let mut response = outcome.map_err(|e| {
        warn!(method, %url, error = %e, "request failed without a response");
        ApiError::from(e)
    })?;

    for hook in &response_hooks {
        hook(&mut response);
    }

    if !response.is_success() {
        let err = ApiError::from_status(response.status, &response.body);
        warn!(method, %url, status = response.status, reason = err.message(), "request failed");
        return Err(err);
    }
    Ok(response)
}

fn json_envelope<T: DeserializeOwned>(response: &HttpResponse) -> Result<ResponseEnvelope<T>, ApiError> {
    let data = decode_body(&response.body)?;
    Ok(ApiSuccess::with_message(REQUEST_SUCCESS_MESSAGE).create_response(data))
}

/// Decode a success body. Empty bodies carry no payload; bodies that are not
/// JSON are offered to `T` as a plain string.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<Option<T>, ApiError> {
    if body.is_empty() {
        return Ok(None);
    }
    match serde_json::from_slice::<T>(body) {
        Ok(value) => Ok(Some(value)),
        Err(json_err) => std::str::from_utf8(body)
            .ok()
            .and_then(|text| serde_json::from_value(Value::String(text.to_string())).ok())
            .map(Some)
            .ok_or_else(|| {
                warn!(error = %json_err, "failed to decode response body");
                ApiError::unknown()
            }),
    }
}

/// `"<resource_path>/<url>"`, or `url` alone when the resource path is empty.
fn prefix_path(resource_path: &str, url: &str) -> String {
    if resource_path.is_empty() {
        url.to_string()
    } else {
        format!("{resource_path}/{url}")
    }
}

/// Join `path` onto `base` with exactly one slash. Absolute and
/// protocol-relative URLs win.
fn combine_urls(base: &str, path: &str) -> String {
    if base.is_empty() || is_absolute_url(path) {
        return path.to_string();
    }
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn is_absolute_url(url: &str) -> bool {
    if url.starts_with("//") {
        return true;
    }
    match url.split_once("://") {
        Some((scheme, _)) => {
            let mut chars = scheme.chars();
            chars.next().is_some_and(|c| c.is_ascii_alphabetic())
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Merge headers, replacing existing names case-insensitively.
fn merge_headers(
    target: &mut Vec<(String, String)>,
    headers: impl IntoIterator<Item = (String, String)>,
) {
    for (name, value) in headers {
        match target.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.1 = value,
            None => target.push((name, value)),
        }
    }
}

/// Flatten a JSON object into query pairs. Arrays repeat the key, nulls are
/// skipped and nested objects are sent as JSON text.
fn query_pairs(params: &Value) -> Result<Vec<(String, String)>, TransportError> {
    let Value::Object(map) = params else {
        return Err(TransportError::Encoding(
            "query parameters must be a JSON object".to_string(),
        ));
    };
    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = query_value(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = query_value(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    Ok(pairs)
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            Some(value.to_string())
        }
    }
}
