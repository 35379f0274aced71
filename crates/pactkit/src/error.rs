//! Error types for contract assembly, the engine boundary and the lifecycle manager.

/// Errors raised while building or reading contract material.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("Failed to encode value: {0}")]
    Encoding(#[source] serde_json::Error),
    #[error("Failed to decode document: {0}")]
    Decoding(#[source] serde_json::Error),
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors reported by a mock server engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
    #[error("Invalid contract document: {0}")]
    InvalidContract(String),
    #[error("TLS was requested but no certificate is configured")]
    TlsUnavailable,
    #[error("TLS configuration error: {0}")]
    Tls(String),
    #[error("Engine rejected start (code {code}): {reason}")]
    Rejected { code: i32, reason: String },
    #[error("Engine runtime error: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Errors surfaced by [`crate::server::MockServer::start`].
#[derive(Debug, thiserror::Error)]
pub enum MockServerError {
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("Mock server failed to start: {0}")]
    EngineStart(#[from] EngineError),
}

/// Errors raised by an endpoint store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Endpoint store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Format(#[from] ContractError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_wraps_as_start_failure() {
        let err: MockServerError = EngineError::Bind {
            addr: "127.0.0.1:5050".to_string(),
            reason: "Address already in use".to_string(),
        }
        .into();
        assert!(matches!(err, MockServerError::EngineStart(_)));
        assert_eq!(
            err.to_string(),
            "Mock server failed to start: Failed to bind 127.0.0.1:5050: Address already in use"
        );
    }

    #[test]
    fn test_contract_error_is_transparent() {
        let err: MockServerError = ContractError::InvalidEndpoint("empty path".into()).into();
        assert_eq!(err.to_string(), "Invalid endpoint: empty path");
    }
}
