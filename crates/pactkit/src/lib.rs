//! PactKit: mocked endpoints in, Pact contract and running mock server out.
//!
//! ```no_run
//! use pactkit::{EndpointDefinition, LocalEngine, MockServer, MockServerConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MockServerConfig { tls: false, ..Default::default() };
//! let server = MockServer::new(LocalEngine::from_config(&config)?, config);
//! let endpoints = vec![EndpointDefinition::new(
//!     "/v0/cms/widget/some-id",
//!     Some("type=slider&id=123".to_string()),
//!     "GET",
//!     r#"{"title": "Widget"}"#,
//! )];
//! let handle = server.start(None, &endpoints)?;
//! println!("serving at {}", handle.base_url);
//! server.stop(handle.port);
//! # Ok(())
//! # }
//! ```

// ===== Contract model =====
pub mod contract;
pub mod endpoint;
pub mod payload;
pub mod query;
pub mod store;

// ===== Serving =====
pub mod config;
pub mod engine;
pub mod error;
pub mod port;
pub mod server;

pub use config::{MockServerConfig, TlsConfig};
pub use contract::{assemble, Contract, ContractSettings};
pub use endpoint::EndpointDefinition;
pub use engine::{LocalEngine, MockServerEngine};
pub use error::{ContractError, EngineError, MockServerError, StoreError};
pub use payload::Payload;
pub use query::{DuplicatePolicy, QueryMap};
pub use server::{MockServer, ServerHandle, ServerState};
