//! Endpoint storage.
//!
//! Authored endpoints live in an external store. [`JsonFileStore`] keeps them
//! as a JSON array of persisted definitions on disk.

use crate::endpoint::{self, EndpointDefinition};
use crate::error::StoreError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads and saves a collection of endpoint definitions.
pub trait EndpointStore {
    fn load(&self) -> Result<Vec<EndpointDefinition>, StoreError>;
    fn save(&self, endpoints: &[EndpointDefinition]) -> Result<(), StoreError>;
}

/// File-backed store. A missing file loads as an empty collection.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EndpointStore for JsonFileStore {
    fn load(&self) -> Result<Vec<EndpointDefinition>, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No endpoint file at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        let endpoints = endpoint::load_collection(&contents)?;
        debug!(
            "Loaded {} endpoints from {}",
            endpoints.len(),
            self.path.display()
        );
        Ok(endpoints)
    }

    fn save(&self, endpoints: &[EndpointDefinition]) -> Result<(), StoreError> {
        let contents = endpoint::save_collection(endpoints)?;
        std::fs::write(&self.path, contents)?;
        debug!(
            "Saved {} endpoints to {}",
            endpoints.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Ordered, editable list of authored endpoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointList {
    items: Vec<EndpointDefinition>,
}

impl EndpointList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from(store: &impl EndpointStore) -> Result<Self, StoreError> {
        Ok(Self {
            items: store.load()?,
        })
    }

    pub fn save_to(&self, store: &impl EndpointStore) -> Result<(), StoreError> {
        store.save(&self.items)
    }

    pub fn push(&mut self, endpoint: EndpointDefinition) {
        self.items.push(endpoint);
    }

    /// Replace the definition at `index`, returning the previous one.
    pub fn replace(
        &mut self,
        index: usize,
        endpoint: EndpointDefinition,
    ) -> Option<EndpointDefinition> {
        let slot = self.items.get_mut(index)?;
        Some(std::mem::replace(slot, endpoint))
    }

    pub fn remove(&mut self, index: usize) -> Option<EndpointDefinition> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn get(&self, index: usize) -> Option<&EndpointDefinition> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[EndpointDefinition] {
        &self.items
    }
}

impl From<Vec<EndpointDefinition>> for EndpointList {
    fn from(items: Vec<EndpointDefinition>) -> Self {
        Self { items }
    }
}
