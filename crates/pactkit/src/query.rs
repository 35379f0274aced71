//! Query string codec.
//!
//! Raw query strings such as `type=slider&id=123` are parsed into a
//! [`QueryMap`] of parameter name to values. Parsing is lenient: tokens that
//! are not a single `name=value` pair are dropped. Values are taken literally,
//! no percent-decoding is applied.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameter name to ordered list of values.
pub type QueryMap = BTreeMap<String, Vec<String>>;

/// What happens when a parameter name appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The last occurrence replaces earlier ones.
    #[default]
    LastWins,
    /// Every occurrence is appended in order.
    Accumulate,
}

/// Parse a raw query string with [`DuplicatePolicy::LastWins`].
///
/// `None` and `""` both yield an empty map.
pub fn parse(raw: Option<&str>) -> QueryMap {
    parse_with(raw, DuplicatePolicy::LastWins)
}

/// Parse a raw query string with an explicit duplicate policy.
pub fn parse_with(raw: Option<&str>, policy: DuplicatePolicy) -> QueryMap {
    let mut query = QueryMap::new();
    let Some(raw) = raw else {
        return query;
    };

    for (name, value) in raw.split('&').filter_map(split_pair) {
        match policy {
            DuplicatePolicy::LastWins => {
                query.insert(name.to_string(), vec![value.to_string()]);
            }
            DuplicatePolicy::Accumulate => {
                query
                    .entry(name.to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
    }
    query
}

/// Encode a map back into raw form, one `name=value` pair per value.
pub fn encode(query: &QueryMap) -> String {
    query
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |value| format!("{name}={value}")))
        .collect::<Vec<_>>()
        .join("&")
}

// Exactly one '=' with text on both sides.
fn split_pair(token: &str) -> Option<(&str, &str)> {
    let (name, value) = token.split_once('=')?;
    if name.is_empty() || value.is_empty() || value.contains('=') {
        return None;
    }
    Some((name, value))
}
