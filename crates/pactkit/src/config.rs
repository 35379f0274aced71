//! Configuration for the mock server lifecycle and the in-process engine.

use crate::contract::ContractSettings;
use crate::query::DuplicatePolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";

/// TLS material for the in-process engine
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to TLS certificate file (PEM format)
    pub cert_path: String,
    /// Path to TLS private key file (PEM format)
    pub key_path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MockServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Passed to the engine on every start; also selects the handle scheme.
    #[serde(default = "default_tls")]
    pub tls: bool,
    #[serde(default)]
    pub contract: ContractSettings,
    /// Certificate used by the in-process engine when `tls` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_files: Option<TlsConfig>,
    /// How the in-process engine reads repeated parameters in incoming requests
    #[serde(default = "default_query_duplicates")]
    pub query_duplicates: DuplicatePolicy,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_string()
}

fn default_tls() -> bool {
    true
}

// Requests keep every occurrence so `id=1&id=2` never passes for `id=2`.
fn default_query_duplicates() -> DuplicatePolicy {
    DuplicatePolicy::Accumulate
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            tls: default_tls(),
            contract: ContractSettings::default(),
            tls_files: None,
            query_duplicates: default_query_duplicates(),
        }
    }
}

impl MockServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: MockServerConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.bind_address.trim().is_empty() {
            anyhow::bail!("bind_address must not be empty");
        }
        if self.contract.consumer.is_empty() || self.contract.provider.is_empty() {
            anyhow::bail!("contract consumer and provider names must not be empty");
        }
        if let Some(ref tls) = self.tls_files {
            if tls.cert_path.is_empty() || tls.key_path.is_empty() {
                anyhow::bail!("tls_files requires both cert_path and key_path");
            }
        }
        Ok(())
    }

    /// Additional checks when the in-process engine serves this configuration.
    pub fn validate_for_local_engine(&self) -> Result<(), anyhow::Error> {
        self.validate()?;
        if self.tls && self.tls_files.is_none() {
            anyhow::bail!(
                "TLS is enabled but no certificate is configured. \
                 Provide 'tls_files.cert_path' and 'tls_files.key_path' or set 'tls: false'"
            );
        }
        Ok(())
    }

    /// URL scheme matching the `tls` flag.
    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = MockServerConfig::default();
        assert_eq!(config.bind_address, "127.0.0.1");
        assert!(config.tls);
        assert_eq!(config.scheme(), "https");
        assert_eq!(config.contract.consumer, "mock-consumer");
        assert_eq!(config.query_duplicates, DuplicatePolicy::Accumulate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config: MockServerConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, MockServerConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
bind_address: 0.0.0.0
tls: false
query_duplicates: last-wins
contract:
  consumer: ios-app
  metadata:
    pact_specification: "3.0.0"
"#
        )
        .unwrap();

        let config = MockServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.scheme(), "http");
        assert_eq!(config.query_duplicates, DuplicatePolicy::LastWins);
        assert_eq!(config.contract.consumer, "ios-app");
        assert_eq!(config.contract.provider, "mock-provider");
    }

    #[test]
    fn test_validate_rejects_empty_bind_address() {
        let config = MockServerConfig {
            bind_address: " ".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_engine_needs_certificate_for_tls() {
        let config = MockServerConfig::default();
        let err = config.validate_for_local_engine().unwrap_err();
        assert!(err.to_string().contains("no certificate"));

        let plain = MockServerConfig {
            tls: false,
            ..Default::default()
        };
        assert!(plain.validate_for_local_engine().is_ok());

        let with_cert = MockServerConfig {
            tls_files: Some(TlsConfig {
                cert_path: "cert.pem".into(),
                key_path: "key.pem".into(),
            }),
            ..Default::default()
        };
        assert!(with_cert.validate_for_local_engine().is_ok());
    }
}
