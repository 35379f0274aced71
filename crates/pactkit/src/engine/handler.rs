//! Request handling for contract-backed servers.
//!
//! Each running server holds the parsed contract. Incoming requests are
//! matched against the interactions in document order and answered with the
//! first match's response body.

use crate::contract::{Contract, Interaction};
use crate::query::{self, DuplicatePolicy};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Oldest unmatched requests are dropped past this many.
pub const MAX_UNMATCHED_REQUESTS: usize = 1000;

/// A request that matched no interaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnmatchedRequest {
    pub request_from: String,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub timestamp: String,
}

/// Runtime state of one served contract.
pub(crate) struct ContractServer {
    pub port: u16,
    pub contract: Contract,
    query_policy: DuplicatePolicy,
    hits: Vec<AtomicU64>,
    unmatched: Mutex<VecDeque<UnmatchedRequest>>,
    pub shutdown_tx: broadcast::Sender<()>,
}

impl ContractServer {
    pub fn new(port: u16, contract: Contract, query_policy: DuplicatePolicy) -> Self {
        let hits = contract
            .interactions
            .iter()
            .map(|_| AtomicU64::new(0))
            .collect();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            port,
            contract,
            query_policy,
            hits,
            unmatched: Mutex::new(VecDeque::new()),
            shutdown_tx,
        }
    }

    /// Index of the first interaction matching the request.
    pub fn find_interaction(
        &self,
        method: &str,
        path: &str,
        raw_query: Option<&str>,
    ) -> Option<usize> {
        let query = query::parse_with(raw_query, self.query_policy);
        self.contract.interactions.iter().position(|interaction| {
            let expected = &interaction.request;
            expected.method.eq_ignore_ascii_case(method)
                && expected.path == path
                && expected.query == query
        })
    }

    /// Whether every interaction has been requested at least once.
    pub fn all_matched(&self) -> bool {
        self.hits.iter().all(|hits| hits.load(Ordering::Relaxed) > 0)
    }

    pub fn unmatched_requests(&self) -> Vec<UnmatchedRequest> {
        self.unmatched.lock().iter().cloned().collect()
    }

    fn record_hit(&self, index: usize) {
        if let Some(hits) = self.hits.get(index) {
            hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_unmatched(&self, request: UnmatchedRequest) {
        let mut unmatched = self.unmatched.lock();
        if unmatched.len() == MAX_UNMATCHED_REQUESTS {
            unmatched.pop_front();
        }
        unmatched.push_back(request);
    }
}

/// Handle a request to a contract server
pub(crate) async fn handle_contract_request(
    req: Request<Incoming>,
    server: Arc<ContractServer>,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let raw_query = req.uri().query().filter(|q| !q.is_empty()).map(str::to_string);

    match server.find_interaction(&method, &path, raw_query.as_deref()) {
        Some(index) => {
            server.record_hit(index);
            debug!(
                "Port {}: {} {} matched interaction {}",
                server.port, method, path, index
            );
            Ok(interaction_response(&server.contract.interactions[index]))
        }
        None => {
            warn!(
                "Port {}: no interaction for {} {}{}",
                server.port,
                method,
                path,
                raw_query.as_deref().map(|q| format!("?{q}")).unwrap_or_default()
            );
            let body = serde_json::json!({
                "error": "No interaction matched the request",
                "method": method,
                "path": path,
            });
            server.record_unmatched(UnmatchedRequest {
                request_from: client_addr.to_string(),
                method,
                path,
                query: raw_query,
                timestamp: chrono::Utc::now().to_rfc3339(),
            });
            Ok(build_response_with_headers(
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE.as_str(), "application/json")],
                body.to_string(),
            ))
        }
    }
}

fn interaction_response(interaction: &Interaction) -> Response<Full<Bytes>> {
    let body = &interaction.response.body;
    match body.content_type() {
        Some(content_type) => build_response_with_headers(
            StatusCode::OK,
            [(CONTENT_TYPE.as_str(), content_type)],
            body.to_bytes(),
        ),
        None => build_response_with_headers(StatusCode::OK, None::<(&str, &str)>, Bytes::new()),
    }
}

/// Build an HTTP response with headers.
///
/// Falls back to a bare 500 if the builder rejects the inputs.
fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into())).unwrap_or_else(|_| {
        let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}
