//! Pact contract documents.
//!
//! [`assemble`] turns an ordered collection of endpoint definitions into a
//! [`Contract`]: consumer, provider, one interaction per endpoint, and a fixed
//! metadata block. Key names and nesting follow the Pact v3 document format.

use crate::endpoint::EndpointDefinition;
use crate::error::ContractError;
use crate::payload::Payload;
use crate::query::QueryMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CONSUMER: &str = "mock-consumer";
pub const DEFAULT_PROVIDER: &str = "mock-provider";
pub const DEFAULT_PACT_SPECIFICATION: &str = "3.0.0";
pub const DEFAULT_MOCKSERVER_VERSION: &str = "0.9.4";
pub const DEFAULT_MODELS_VERSION: &str = "0.4.5";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub consumer: Participant,
    pub provider: Participant,
    pub interactions: Vec<Interaction>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub request: Request,
    pub response: Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: QueryMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub body: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub pact_rust: EngineVersions,
    pub pact_specification: SpecificationVersion,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineVersions {
    pub mockserver: String,
    pub models: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificationVersion {
    pub version: String,
}

/// Participant names and version metadata injected into every contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSettings {
    #[serde(default = "default_consumer")]
    pub consumer: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub metadata: MetadataSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSettings {
    #[serde(default = "default_pact_specification")]
    pub pact_specification: String,
    #[serde(default = "default_mockserver_version")]
    pub mockserver: String,
    #[serde(default = "default_models_version")]
    pub models: String,
}

fn default_consumer() -> String {
    DEFAULT_CONSUMER.to_string()
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_pact_specification() -> String {
    DEFAULT_PACT_SPECIFICATION.to_string()
}

fn default_mockserver_version() -> String {
    DEFAULT_MOCKSERVER_VERSION.to_string()
}

fn default_models_version() -> String {
    DEFAULT_MODELS_VERSION.to_string()
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            consumer: default_consumer(),
            provider: default_provider(),
            metadata: MetadataSettings::default(),
        }
    }
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            pact_specification: default_pact_specification(),
            mockserver: default_mockserver_version(),
            models: default_models_version(),
        }
    }
}

impl From<&MetadataSettings> for Metadata {
    fn from(settings: &MetadataSettings) -> Self {
        Metadata {
            pact_rust: EngineVersions {
                mockserver: settings.mockserver.clone(),
                models: settings.models.clone(),
            },
            pact_specification: SpecificationVersion {
                version: settings.pact_specification.clone(),
            },
        }
    }
}

impl From<&EndpointDefinition> for Interaction {
    fn from(endpoint: &EndpointDefinition) -> Self {
        Interaction {
            request: Request {
                method: endpoint.method().to_string(),
                path: endpoint.path().to_string(),
                query: endpoint.query().clone(),
            },
            response: Response {
                body: endpoint.body().clone(),
            },
        }
    }
}

/// Build a contract with one interaction per endpoint, in iteration order.
///
/// Methods are not validated here; the engine rejects what it cannot serve.
pub fn assemble<'a, I>(endpoints: I, settings: &ContractSettings) -> Contract
where
    I: IntoIterator<Item = &'a EndpointDefinition>,
{
    let interactions: Vec<Interaction> = endpoints.into_iter().map(Interaction::from).collect();
    debug!(
        "Assembled contract {} -> {} with {} interactions",
        settings.consumer,
        settings.provider,
        interactions.len()
    );

    Contract {
        consumer: Participant {
            name: settings.consumer.clone(),
        },
        provider: Participant {
            name: settings.provider.clone(),
        },
        interactions,
        metadata: Metadata::from(&settings.metadata),
    }
}

impl Contract {
    pub fn to_json(&self) -> Result<String, ContractError> {
        serde_json::to_string(self).map_err(ContractError::Encoding)
    }

    pub fn to_json_pretty(&self) -> Result<String, ContractError> {
        serde_json::to_string_pretty(self).map_err(ContractError::Encoding)
    }

    pub fn from_json(json: &str) -> Result<Self, ContractError> {
        serde_json::from_str(json).map_err(ContractError::Decoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn endpoints() -> Vec<EndpointDefinition> {
        vec![
            EndpointDefinition::new("/z", Some("type=slider&id=123".into()), "GET", "first"),
            EndpointDefinition::with_json("/a", None, "POST", &json!({"ok": true})).unwrap(),
            EndpointDefinition::new("/m", Some("bad&x=1".into()), "BREW", "third"),
        ]
    }

    #[test]
    fn test_document_shape() {
        let input = vec![EndpointDefinition::with_json(
            "/test",
            Some("id=1".into()),
            "GET",
            &json!({"name": "Test", "age": 30}),
        )
        .unwrap()];
        let contract = assemble(&input, &ContractSettings::default());

        assert_json_eq!(
            serde_json::to_value(&contract).unwrap(),
            json!({
                "consumer": {"name": "mock-consumer"},
                "provider": {"name": "mock-provider"},
                "interactions": [{
                    "request": {"method": "GET", "path": "/test", "query": {"id": ["1"]}},
                    "response": {"body": {"name": "Test", "age": 30}}
                }],
                "metadata": {
                    "pactRust": {"mockserver": "0.9.4", "models": "0.4.5"},
                    "pactSpecification": {"version": "3.0.0"}
                }
            })
        );
    }

    #[test]
    fn test_one_interaction_per_endpoint_in_order() {
        let input = endpoints();
        let contract = assemble(&input, &ContractSettings::default());

        assert_eq!(contract.interactions.len(), input.len());
        for (interaction, endpoint) in contract.interactions.iter().zip(&input) {
            assert_eq!(interaction.request.path, endpoint.path());
            assert_eq!(interaction.request.method, endpoint.method());
            assert_eq!(
                interaction.request.query,
                query::parse(endpoint.query_string())
            );
        }
    }

    #[test]
    fn test_empty_query_is_an_empty_object() {
        let input = vec![EndpointDefinition::new("/a", None, "GET", "")];
        let value = serde_json::to_value(assemble(&input, &ContractSettings::default())).unwrap();
        assert_eq!(value["interactions"][0]["request"]["query"], json!({}));
    }

    #[test]
    fn test_settings_override_constants() {
        let settings = ContractSettings {
            consumer: "ios-app".into(),
            provider: "cms".into(),
            metadata: MetadataSettings {
                pact_specification: "4.0".into(),
                ..Default::default()
            },
        };
        let contract = assemble(std::iter::empty(), &settings);
        assert_eq!(contract.consumer.name, "ios-app");
        assert_eq!(contract.provider.name, "cms");
        assert_eq!(contract.metadata.pact_specification.version, "4.0");
        assert_eq!(contract.metadata.pact_rust.mockserver, DEFAULT_MOCKSERVER_VERSION);
        assert!(contract.interactions.is_empty());
    }

    #[test]
    fn test_json_text_round_trip() {
        let contract = assemble(&endpoints(), &ContractSettings::default());
        let text = contract.to_json().unwrap();
        assert_eq!(Contract::from_json(&text).unwrap(), contract);

        let pretty = contract.to_json_pretty().unwrap();
        assert!(pretty.contains('\n'));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            Contract::from_json(r#"{"consumer": {}}"#),
            Err(ContractError::Decoding(_))
        ));
    }

    #[test]
    fn test_settings_yaml_defaults() {
        let settings: ContractSettings = serde_yaml::from_str("consumer: app").unwrap();
        assert_eq!(settings.consumer, "app");
        assert_eq!(settings.provider, DEFAULT_PROVIDER);
        assert_eq!(settings.metadata, MetadataSettings::default());
    }
}
