//! gRPC transport over a shared `tonic` channel.
//!
//! # Design Decisions
//! - One lazily-connected `Channel` per backend, cloned per call; HTTP/2
//!   multiplexes concurrent calls over it
//! - The channel reconnects on its own after connection loss; a call made
//!   while the backend is down fails fast as `unavailable`

use std::error::Error as _;
use std::time::Duration;

use axum::http::uri::PathAndQuery;
use serde_json::Value;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::{Channel, Endpoint};
use tonic::Code;

use crate::backend::codec::JsonCodec;
use crate::backend::error::{BackendError, BackendErrorKind};
use crate::backend::transport::{BackendCall, BackendTransport};
use crate::http::pipeline::BoxFuture;

const INTERNAL_TOKEN_KEY: &str = "x-internal-token";
const REQUEST_ID_KEY: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct GrpcTransport {
    name: String,
    channel: Channel,
    internal_token: Option<MetadataValue<Ascii>>,
}

impl GrpcTransport {
    /// Build the channel without connecting; the first call dials.
    ///
    /// Must run inside a Tokio runtime.
    pub fn connect_lazy(
        name: &str,
        address: &str,
        connect_timeout: Duration,
        internal_token: &str,
    ) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(address.to_string())?
            .connect_timeout(connect_timeout)
            .tcp_nodelay(true)
            .connect_lazy();

        let internal_token = if internal_token.is_empty() {
            None
        } else {
            match internal_token.parse::<MetadataValue<Ascii>>() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(backend = %name, "Internal auth token is not valid metadata; not sending it");
                    None
                }
            }
        };

        tracing::debug!(backend = %name, address = %address, "Backend channel created");
        Ok(Self {
            name: name.to_string(),
            channel,
            internal_token,
        })
    }

    async fn unary(&self, call: BackendCall<'_>) -> Result<Value, BackendError> {
        let path: PathAndQuery = call
            .operation
            .parse()
            .map_err(|_| BackendError::new(BackendErrorKind::Unimplemented, format!("bad operation path {}", call.operation)))?;

        let mut request = tonic::Request::new(call.payload);
        if let Some(timeout) = call.timeout {
            request.set_timeout(timeout);
        }
        if let Some(token) = &self.internal_token {
            request.metadata_mut().insert(INTERNAL_TOKEN_KEY, token.clone());
        }
        if let Ok(id) = call.request_id.parse::<MetadataValue<Ascii>>() {
            request.metadata_mut().insert(REQUEST_ID_KEY, id);
        }

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| BackendError::unavailable(format!("{} not ready: {}", self.name, e)))?;

        let response = grpc
            .unary(request, path, JsonCodec)
            .await
            .map_err(|status| translate(&self.name, status))?;
        Ok(response.into_inner())
    }
}

/// Local transport failures (refused connection, reset stream) come back as
/// statuses carrying a source error; report those as `unavailable`.
fn translate(backend: &str, status: tonic::Status) -> BackendError {
    if status.code() == Code::Unknown && status.source().is_some() {
        return BackendError::unavailable(format!("{}: {}", backend, status.message()));
    }
    BackendError::from(status)
}

impl BackendTransport for GrpcTransport {
    fn call<'a>(&'a self, call: BackendCall<'a>) -> BoxFuture<'a, Result<Value, BackendError>> {
        Box::pin(self.unary(call))
    }
}
