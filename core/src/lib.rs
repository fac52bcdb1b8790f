//! Convenience layer over an HTTP transport with a uniform response envelope.
//!
//! # Overview
//! [`ApiClient`] is configured once with an [`ApiConfig`] and shared by
//! clone. Its verb methods return `Result<ResponseEnvelope<T>, ApiError>`:
//! a success envelope on 2xx, an [`ApiError`] for cancellation (499), HTTP
//! failures (the response status) and everything else (500).
//!
//! [`afetch`] and [`mfetch`] are for call sites that would rather branch on
//! an envelope's status than propagate errors.
//!
//! # Design
//! - The wire work is delegated to a [`Transport`]; [`ReqwestTransport`] is
//!   the default. Requests and responses cross that boundary as plain data
//!   so hooks can rewrite them and tests can swap the transport.
//! - Configuration lives in one explicit, shared object instead of a global.
//! - Nothing is retried, cached or queued.

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod helpers;
pub mod http;
pub mod interceptor;
pub mod transport;

pub use bytes::Bytes;
pub use client::ApiClient;
pub use config::ApiConfig;
pub use envelope::{ApiSuccess, ErrorStatus, ResponseEnvelope, Status};
pub use error::{ApiError, TransportError};
pub use helpers::{afetch, mfetch};
pub use http::{FilePart, HttpMethod, HttpRequest, HttpResponse, RequestBody, ResponseKind};
pub use interceptor::InterceptorId;
pub use tokio_util::sync::CancellationToken;
pub use transport::{ReqwestTransport, Transport};
