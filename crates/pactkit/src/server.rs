//! Mock server lifecycle.
//!
//! [`MockServer`] is the entry point: it assembles endpoint definitions into a
//! contract, asks the engine to serve it and hands back a [`ServerHandle`].
//! Construct one per process (or per test) and pass it around; it holds no
//! global state.
//!
//! Start and stop are plain blocking calls. Callers sharing a `MockServer`
//! across threads must serialize their own start/stop calls per port.

use crate::config::MockServerConfig;
use crate::contract;
use crate::endpoint::EndpointDefinition;
use crate::engine::MockServerEngine;
use crate::error::MockServerError;
use crate::port::{default_port_allocator, PortAllocator};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Where a server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Idle,
    Starting,
    Running,
    Stopped,
}

/// A started mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerHandle {
    /// Scheme, bind address and port, e.g. `https://127.0.0.1:5050`.
    pub base_url: String,
    pub port: u16,
}

impl ServerHandle {
    /// Join `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

pub struct MockServer<E: MockServerEngine> {
    engine: E,
    config: MockServerConfig,
    allocator: Box<dyn PortAllocator>,
    states: Mutex<HashMap<u16, ServerState>>,
}

impl<E: MockServerEngine> MockServer<E> {
    /// Manager with the platform's default port allocator.
    pub fn new(engine: E, config: MockServerConfig) -> Self {
        Self::with_allocator(engine, config, default_port_allocator())
    }

    pub fn with_allocator(
        engine: E,
        config: MockServerConfig,
        allocator: Box<dyn PortAllocator>,
    ) -> Self {
        Self {
            engine,
            config,
            allocator,
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &MockServerConfig {
        &self.config
    }

    /// Serve `endpoints` on `port`, or on an allocated port when `None`.
    ///
    /// Nothing is left running when this returns an error.
    pub fn start(
        &self,
        port: Option<u16>,
        endpoints: &[EndpointDefinition],
    ) -> Result<ServerHandle, MockServerError> {
        let document = contract::assemble(endpoints, &self.config.contract);
        let contract_json = document.to_json()?;

        let bind_address = self.config.bind_address.as_str();
        let requested = port.unwrap_or_else(|| self.allocator.allocate(bind_address));
        let bind = format!("{bind_address}:{requested}");
        let previous = {
            let mut states = self.states.lock();
            states.retain(|_, state| *state != ServerState::Stopped);
            if requested != 0 {
                states.insert(requested, ServerState::Starting)
            } else {
                None
            }
        };
        debug!(
            "Starting mock server on {} with {} interactions",
            bind,
            document.interactions.len()
        );

        let bound = match self
            .engine
            .start_mock_server(&contract_json, &bind, self.config.tls)
        {
            Ok(bound) => bound,
            Err(e) => {
                warn!("Mock server on {} failed to start: {}", bind, e);
                if requested != 0 {
                    let mut states = self.states.lock();
                    match previous {
                        Some(state) => states.insert(requested, state),
                        None => states.remove(&requested),
                    };
                }
                return Err(e.into());
            }
        };
        if requested != 0 && bound != requested {
            self.states.lock().remove(&requested);
            debug!("Engine moved requested port {} to {}", requested, bound);
        }
        self.set_state(bound, ServerState::Running);

        let handle = ServerHandle {
            base_url: format!("{}://{}:{}", self.config.scheme(), bind_address, bound),
            port: bound,
        };
        info!("Mock server running at {}", handle.base_url);
        Ok(handle)
    }

    /// Stop the server on `port`. Stopping twice, or stopping a port that
    /// never started, is a no-op here; the engine decides what that means.
    pub fn stop(&self, port: u16) {
        self.engine.stop_mock_server(port);
        let previous = self.states.lock().insert(port, ServerState::Stopped);
        match previous {
            Some(ServerState::Running) => info!("Mock server on port {} stopped", port),
            _ => debug!("Stop requested for port {} with no running server", port),
        }
    }

    /// Lifecycle state of `port`.
    ///
    /// `Stopped` is reported until the next `start`, which forgets stopped
    /// ports; after that they read as `Idle` again.
    pub fn state(&self, port: u16) -> ServerState {
        self.states
            .lock()
            .get(&port)
            .copied()
            .unwrap_or(ServerState::Idle)
    }

    fn set_state(&self, port: u16, state: ServerState) {
        self.states.lock().insert(port, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::port::EngineAssignedPortAllocator;
    use serde_json::json;

    /// Engine double that records calls and echoes ports.
    #[derive(Default)]
    struct RecordingEngine {
        started: Mutex<Vec<(String, String, bool)>>,
        stopped: Mutex<Vec<u16>>,
        serving: Mutex<Vec<u16>>,
        assign: Option<u16>,
        fail: bool,
    }

    impl MockServerEngine for RecordingEngine {
        fn start_mock_server(
            &self,
            contract_json: &str,
            bind_address: &str,
            tls: bool,
        ) -> Result<u16, EngineError> {
            if self.fail {
                return Err(EngineError::Bind {
                    addr: bind_address.to_string(),
                    reason: "Address already in use".to_string(),
                });
            }
            self.started
                .lock()
                .push((contract_json.to_string(), bind_address.to_string(), tls));
            let requested: u16 = bind_address
                .rsplit(':')
                .next()
                .and_then(|p| p.parse().ok())
                .unwrap_or(0);
            let bound = match requested {
                0 => self.assign.unwrap_or(49152),
                p => self.assign.unwrap_or(p),
            };
            let mut serving = self.serving.lock();
            if serving.contains(&bound) {
                return Err(EngineError::Bind {
                    addr: bind_address.to_string(),
                    reason: "port is already served by this engine".to_string(),
                });
            }
            serving.push(bound);
            Ok(bound)
        }

        fn stop_mock_server(&self, port: u16) {
            self.stopped.lock().push(port);
            self.serving.lock().retain(|p| *p != port);
        }
    }

    fn test_endpoints() -> Vec<EndpointDefinition> {
        let body = json!({"name": "Test", "age": 30});
        vec![EndpointDefinition::with_json("/test", Some(String::new()), "GET", &body).unwrap()]
    }

    fn manager(engine: RecordingEngine) -> MockServer<RecordingEngine> {
        MockServer::with_allocator(
            engine,
            MockServerConfig::default(),
            Box::new(EngineAssignedPortAllocator),
        )
    }

    #[test]
    fn test_start_on_explicit_port() {
        let server = manager(RecordingEngine::default());
        let handle = server.start(Some(5050), &test_endpoints()).unwrap();

        assert_eq!(handle.port, 5050);
        assert_eq!(handle.base_url, "https://127.0.0.1:5050");
        assert_eq!(handle.url("/test"), "https://127.0.0.1:5050/test");
        assert_eq!(server.state(5050), ServerState::Running);

        let started = server.engine().started.lock();
        let (contract_json, bind, tls) = &started[0];
        assert_eq!(bind, "127.0.0.1:5050");
        assert!(*tls);
        let document: serde_json::Value = serde_json::from_str(contract_json).unwrap();
        assert_eq!(
            document["interactions"][0]["response"]["body"],
            json!({"name": "Test", "age": 30})
        );
        assert_eq!(document["interactions"][0]["request"]["query"], json!({}));
    }

    #[test]
    fn test_start_without_port_uses_allocator_and_engine_port() {
        let server = manager(RecordingEngine {
            assign: Some(61000),
            ..Default::default()
        });
        let handle = server.start(None, &test_endpoints()).unwrap();

        assert_eq!(server.engine().started.lock()[0].1, "127.0.0.1:0");
        assert_eq!(handle.port, 61000);
        assert_eq!(handle.base_url, "https://127.0.0.1:61000");
        assert_eq!(server.state(61000), ServerState::Running);
        assert_eq!(server.state(0), ServerState::Idle);
    }

    #[test]
    fn test_engine_failure_leaves_idle() {
        let server = manager(RecordingEngine {
            fail: true,
            ..Default::default()
        });
        let err = server.start(Some(5050), &test_endpoints()).unwrap_err();
        assert!(matches!(
            err,
            MockServerError::EngineStart(EngineError::Bind { .. })
        ));
        assert_eq!(server.state(5050), ServerState::Idle);
    }

    #[test]
    fn test_rejected_restart_keeps_running_state() {
        let server = manager(RecordingEngine::default());
        let handle = server.start(Some(5052), &test_endpoints()).unwrap();

        let err = server.start(Some(5052), &test_endpoints()).unwrap_err();
        assert!(matches!(
            err,
            MockServerError::EngineStart(EngineError::Bind { .. })
        ));
        assert_eq!(server.state(handle.port), ServerState::Running);
        assert_eq!(*server.engine().serving.lock(), vec![5052]);
    }

    #[test]
    fn test_restart_after_stop() {
        let server = manager(RecordingEngine::default());
        server.start(Some(5053), &test_endpoints()).unwrap();
        server.stop(5053);
        assert_eq!(server.state(5053), ServerState::Stopped);

        server.start(Some(5053), &test_endpoints()).unwrap();
        assert_eq!(server.state(5053), ServerState::Running);
    }

    #[test]
    fn test_start_forgets_stopped_ports() {
        let server = manager(RecordingEngine::default());
        server.start(Some(5054), &test_endpoints()).unwrap();
        server.stop(5054);
        server.stop(6000);

        server.start(Some(5055), &test_endpoints()).unwrap();
        assert_eq!(server.state(5054), ServerState::Idle);
        assert_eq!(server.state(6000), ServerState::Idle);
        assert_eq!(server.states.lock().len(), 1);
    }

    #[test]
    fn test_stop_twice_is_fine() {
        let server = manager(RecordingEngine::default());
        let handle = server.start(Some(5051), &test_endpoints()).unwrap();

        server.stop(handle.port);
        assert_eq!(server.state(handle.port), ServerState::Stopped);
        server.stop(handle.port);
        assert_eq!(server.state(handle.port), ServerState::Stopped);
        assert_eq!(*server.engine().stopped.lock(), vec![5051, 5051]);
    }

    #[test]
    fn test_plain_scheme_and_custom_names() {
        let mut config = MockServerConfig {
            tls: false,
            ..Default::default()
        };
        config.contract.consumer = "ios-app".into();
        let server = MockServer::with_allocator(
            RecordingEngine::default(),
            config,
            Box::new(EngineAssignedPortAllocator),
        );
        let handle = server.start(Some(7000), &[]).unwrap();
        assert_eq!(handle.base_url, "http://127.0.0.1:7000");

        let started = server.engine().started.lock();
        assert!(!started[0].2);
        let document: serde_json::Value = serde_json::from_str(&started[0].0).unwrap();
        assert_eq!(document["consumer"]["name"], "ios-app");
        assert_eq!(document["interactions"], json!([]));
    }

    #[test]
    fn test_handle_serializes_camel_case() {
        let handle = ServerHandle {
            base_url: "https://127.0.0.1:1".into(),
            port: 1,
        };
        assert_eq!(
            serde_json::to_value(&handle).unwrap(),
            json!({"baseUrl": "https://127.0.0.1:1", "port": 1})
        );
        assert_eq!(handle.url("x"), "https://127.0.0.1:1/x");
    }
}
