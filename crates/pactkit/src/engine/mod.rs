//! Mock server engines.
//!
//! An engine takes a serialized contract document, binds a port and answers
//! requests from the document's interactions until it is told to stop. The
//! lifecycle manager only talks to engines through [`MockServerEngine`].
//!
//! ## Module Structure
//!
//! - `local`: [`LocalEngine`], an in-process engine on tokio and hyper
//! - `handler`: request matching and response building for `LocalEngine`
//! - `tls`: certificate loading for `LocalEngine`

mod handler;
mod local;
mod tls;

use crate::error::EngineError;

pub use handler::{UnmatchedRequest, MAX_UNMATCHED_REQUESTS};
pub use local::LocalEngine;
pub use tls::create_tls_acceptor;

/// Narrow interface to a mock server engine.
///
/// Both calls block. Callers must serialize their own start/stop calls for a
/// given port; engines do not guard against concurrent starts on one port.
pub trait MockServerEngine: Send + Sync {
    /// Start serving `contract_json` on `bind_address` (`host:port`, port `0`
    /// lets the engine choose). Returns the concrete bound port.
    fn start_mock_server(
        &self,
        contract_json: &str,
        bind_address: &str,
        tls: bool,
    ) -> Result<u16, EngineError>;

    /// Stop the server on `port`. Unknown ports are ignored.
    fn stop_mock_server(&self, port: u16);
}

impl<E: MockServerEngine + ?Sized> MockServerEngine for std::sync::Arc<E> {
    fn start_mock_server(
        &self,
        contract_json: &str,
        bind_address: &str,
        tls: bool,
    ) -> Result<u16, EngineError> {
        (**self).start_mock_server(contract_json, bind_address, tls)
    }

    fn stop_mock_server(&self, port: u16) {
        (**self).stop_mock_server(port)
    }
}

/// Interpret the raw return code of a native Pact mock server.
///
/// Positive values are ports; zero and the negative codes of the Pact FFI
/// are rejections.
pub fn port_from_code(code: i32) -> Result<u16, EngineError> {
    let reason = match code {
        -1 => "a null pointer was passed to the engine",
        -2 => "the contract JSON could not be parsed",
        -3 => "the mock server could not be started",
        -4 => "the engine panicked",
        -5 => "the bind address is not valid",
        -6 => "the TLS configuration could not be created",
        0 => "the engine returned port 0",
        c if c < 0 => "unknown engine error",
        c => {
            return u16::try_from(c).map_err(|_| EngineError::Rejected {
                code,
                reason: "port out of range".to_string(),
            })
        }
    };
    Err(EngineError::Rejected {
        code,
        reason: reason.to_string(),
    })
}
