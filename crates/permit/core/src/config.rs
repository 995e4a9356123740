use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// How policies targeting types of the same depth are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualDepthOrder {
    /// Keep registration order.
    #[default]
    RegistrationOrder,
    /// Refuse a second policy for an intent type that already has one.
    Reject,
}

/// Permission engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermitConfig {
    /// Tiebreak for policies of equal depth.
    pub equal_depth_order: EqualDepthOrder,
    /// Accessor prefixes stripped when deriving property names.
    pub property_prefixes: Vec<String>,
    /// Register the map and JSON property extractors.
    pub builtin_extractors: bool,
    /// Log denials at `info` rather than `debug`.
    pub log_denials: bool,
}

impl Default for PermitConfig {
    fn default() -> Self {
        Self {
            equal_depth_order: EqualDepthOrder::RegistrationOrder,
            property_prefixes: vec!["get".to_string(), "is".to_string()],
            builtin_extractors: true,
            log_denials: true,
        }
    }
}

impl PermitConfig {
    /// Configuration refusing ambiguous policy orderings.
    pub fn strict() -> Self {
        Self {
            equal_depth_order: EqualDepthOrder::Reject,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = PermitConfig::default();
        assert_eq!(c.equal_depth_order, EqualDepthOrder::RegistrationOrder);
        assert_eq!(c.property_prefixes, vec!["get", "is"]);
        assert!(c.builtin_extractors);
        assert!(c.log_denials);
    }

    #[test]
    fn strict_config() {
        let c = PermitConfig::strict();
        assert_eq!(c.equal_depth_order, EqualDepthOrder::Reject);
        assert!(c.builtin_extractors);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let c = PermitConfig::from_json(r#"{"equal_depth_order": "reject", "log_denials": false}"#).unwrap();
        assert_eq!(c.equal_depth_order, EqualDepthOrder::Reject);
        assert!(!c.log_denials);
        assert_eq!(c.property_prefixes, vec!["get", "is"]);
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        let err = PermitConfig::from_json(r#"{"equal_depth_order": "random"}"#).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidConfig(_)));
    }

    #[test]
    fn config_serde() {
        let c = PermitConfig::strict();
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(PermitConfig::from_json(&json).unwrap(), c);
    }
}
