//! Per-request state threaded through the pipeline.
//!
//! # Responsibilities
//! - Carry request metadata (id, client key, method, path, headers, body)
//! - Carry the matched route, deadline and cancellation token
//! - Hold verified Claims, at most once
//! - Guard the response against being written twice
//!
//! # Design Decisions
//! - One typed struct passed by `&mut` through every stage; no string-keyed
//!   extension bag
//! - The request id is assigned lazily and exactly once, so any stage
//!   (including ones that run before request identification) sees the same id

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, Method, Request, Uri};
use axum::response::Response;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::routing::RouteMatch;
use crate::security::claims::Claims;

/// Canonical request id header.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

/// Tracks whether a response has been committed for this request.
#[derive(Debug, Clone, Default)]
pub struct WriteState(Arc<AtomicBool>);

impl WriteState {
    /// Claim the right to write the response. True for exactly one caller.
    pub fn try_claim(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_written(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Attaching claims twice is a programming error surfaced to the caller.
#[derive(Debug, thiserror::Error)]
#[error("claims already attached to this request")]
pub struct ClaimsAlreadyAttached;

#[derive(Debug)]
pub struct RequestContext {
    request_id: Option<String>,
    pub client_key: String,
    pub remote_addr: SocketAddr,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    // `Body` is not `Sync`; the mutex keeps `&RequestContext` sendable.
    body: Mutex<Option<Body>>,
    pub route: Option<RouteMatch>,
    pub deadline: Option<Instant>,
    pub cancel: CancellationToken,
    claims: Option<Claims>,
    write: WriteState,
}

impl RequestContext {
    pub fn new(
        request: Request<Body>,
        remote_addr: SocketAddr,
        client_key: String,
        cancel: CancellationToken,
    ) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            request_id: None,
            client_key,
            remote_addr,
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body: Mutex::new(Some(body)),
            route: None,
            deadline: None,
            cancel,
            claims: None,
            write: WriteState::default(),
        }
    }

    /// Take the request body. Later calls get an empty body.
    pub fn take_body(&mut self) -> Body {
        let slot = match self.body.get_mut() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.take().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Name of the matched route, or "unmatched".
    pub fn route_name(&self) -> &str {
        self.route
            .as_ref()
            .map(|m| m.entry.name.as_str())
            .unwrap_or("unmatched")
    }

    /// The request id, assigning one on first use: a valid client-supplied
    /// `X-Request-ID` is reused, otherwise a UUID v4 is generated.
    pub fn ensure_request_id(&mut self) -> &str {
        if self.request_id.is_none() {
            let supplied = self
                .headers
                .get(&X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|id| is_valid_request_id(id))
                .map(str::to_string);
            self.request_id = Some(supplied.unwrap_or_else(|| Uuid::new_v4().to_string()));
        }
        self.request_id.as_deref().unwrap_or_default()
    }

    /// The request id if one has been assigned.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// Attach verified claims. Refuses a second value.
    pub fn attach_claims(&mut self, claims: Claims) -> Result<(), ClaimsAlreadyAttached> {
        if self.claims.is_some() {
            return Err(ClaimsAlreadyAttached);
        }
        self.claims = Some(claims);
        Ok(())
    }

    pub fn write_state(&self) -> &WriteState {
        &self.write
    }

    /// Commit `response` as this request's answer. If another writer already
    /// committed (the deadline stage), the response is discarded upstream.
    pub fn finish(&self, response: Response) -> Response {
        if !self.write.try_claim() {
            tracing::debug!(
                request_id = self.request_id().unwrap_or_default(),
                "Response already written; late response dropped"
            );
        }
        response
    }
}

fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'))
}
