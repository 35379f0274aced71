//! Endpoint definitions.
//!
//! An [`EndpointDefinition`] describes one mocked request/response pair before
//! it is assembled into a contract. Only the raw fields are persisted; the
//! parsed query and the wrapped body are re-derived on every construction
//! path so the two representations cannot drift apart.

use crate::error::ContractError;
use crate::payload::Payload;
use crate::query::{self, QueryMap};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A mocked endpoint.
///
/// Equality and hashing only consider `path`, `query_string`, `body_text` and
/// `method`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PersistedEndpoint", into = "PersistedEndpoint")]
pub struct EndpointDefinition {
    path: String,
    query_string: Option<String>,
    query: QueryMap,
    method: String,
    body_text: String,
    body: Payload,
}

/// Stored shape of an endpoint, shared with the external store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedEndpoint {
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query_string: Option<String>,
    method: String,
    json_string: String,
}

impl From<PersistedEndpoint> for EndpointDefinition {
    fn from(raw: PersistedEndpoint) -> Self {
        EndpointDefinition::new(raw.path, raw.query_string, raw.method, raw.json_string)
    }
}

impl From<EndpointDefinition> for PersistedEndpoint {
    fn from(endpoint: EndpointDefinition) -> Self {
        PersistedEndpoint {
            path: endpoint.path,
            query_string: endpoint.query_string,
            method: endpoint.method,
            json_string: endpoint.body_text,
        }
    }
}

impl EndpointDefinition {
    /// Build an endpoint whose response body is `body_text`, forwarded verbatim.
    pub fn new(
        path: impl Into<String>,
        query_string: Option<String>,
        method: impl Into<String>,
        body_text: impl Into<String>,
    ) -> Self {
        let body_text = body_text.into();
        Self {
            path: path.into(),
            query: query::parse(query_string.as_deref()),
            query_string,
            method: method.into(),
            body: Payload::Text(body_text.clone()),
            body_text,
        }
    }

    /// Build an endpoint whose response body is a structured value.
    ///
    /// The source text used for identity is the compact JSON encoding of `body`.
    pub fn with_json<T: Serialize + ?Sized>(
        path: impl Into<String>,
        query_string: Option<String>,
        method: impl Into<String>,
        body: &T,
    ) -> Result<Self, ContractError> {
        let body = Payload::from_serialize(body)?;
        let body_text = serde_json::to_string(&body).map_err(ContractError::Encoding)?;
        Ok(Self {
            path: path.into(),
            query: query::parse(query_string.as_deref()),
            query_string,
            method: method.into(),
            body_text,
            body,
        })
    }

    /// Build an endpoint from authoring input.
    ///
    /// Path and method must be non-empty; the method is uppercased and an
    /// empty query string is treated as absent.
    pub fn authored(
        path: &str,
        method: &str,
        query_string: Option<&str>,
        body_text: &str,
    ) -> Result<Self, ContractError> {
        let path = path.trim();
        let method = method.trim().to_uppercase();
        if path.is_empty() {
            return Err(ContractError::InvalidEndpoint("path is empty".to_string()));
        }
        if method.is_empty() {
            return Err(ContractError::InvalidEndpoint("method is empty".to_string()));
        }
        let query_string = query_string
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        Ok(Self::new(path, query_string, method, body_text))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Parsed form of [`EndpointDefinition::query_string`].
    pub fn query(&self) -> &QueryMap {
        &self.query
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn body_text(&self) -> &str {
        &self.body_text
    }

    pub fn body(&self) -> &Payload {
        &self.body
    }
}

impl PartialEq for EndpointDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.query_string == other.query_string
            && self.body_text == other.body_text
            && self.method == other.method
    }
}

impl Eq for EndpointDefinition {}

impl Hash for EndpointDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.query_string.hash(state);
        self.body_text.hash(state);
        self.method.hash(state);
    }
}

impl fmt::Display for EndpointDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.query_string.as_deref() {
            Some(q) if !q.is_empty() => write!(f, "{} {}?{}", self.method, self.path, q),
            _ => write!(f, "{} {}", self.method, self.path),
        }
    }
}

/// Parse a persisted collection (a JSON array of endpoints).
pub fn load_collection(json: &str) -> Result<Vec<EndpointDefinition>, ContractError> {
    serde_json::from_str(json).map_err(ContractError::Decoding)
}

/// Serialize a collection into its persisted form.
pub fn save_collection(endpoints: &[EndpointDefinition]) -> Result<String, ContractError> {
    serde_json::to_string(endpoints).map_err(ContractError::Encoding)
}

/// Drop repeated definitions, keeping the first occurrence of each.
pub fn dedup(endpoints: Vec<EndpointDefinition>) -> Vec<EndpointDefinition> {
    let mut seen = HashSet::new();
    endpoints
        .into_iter()
        .filter(|endpoint| seen.insert(endpoint.clone()))
        .collect()
}

/// Collapse a collection to one definition per path.
///
/// The last definition for a path wins; paths keep the position of their
/// first appearance.
pub fn collapse_by_path(endpoints: Vec<EndpointDefinition>) -> Vec<EndpointDefinition> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut collapsed: Vec<EndpointDefinition> = Vec::new();
    for endpoint in endpoints {
        match slots.get(endpoint.path()) {
            Some(&index) => collapsed[index] = endpoint,
            None => {
                slots.insert(endpoint.path().to_string(), collapsed.len());
                collapsed.push(endpoint);
            }
        }
    }
    collapsed
}
