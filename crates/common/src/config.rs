use serde::{Deserialize, Serialize};

/// Engine/session configuration shared across planner layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Database used to resolve unqualified table references.
    pub default_database: String,
    /// Whether the analyzer pushes used-column lists and single-table filter
    /// predicates into scans that advertise the capability.
    #[serde(default = "default_true")]
    pub pushdown_enabled: bool,
    /// Whether `Distinct` over a sorted input is downgraded to
    /// `OrderedDistinct`.
    #[serde(default = "default_true")]
    pub distinct_optimization: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_database: "repo".to_string(),
            pushdown_enabled: true,
            distinct_optimization: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::EngineConfig;

    #[test]
    fn optimizations_default_on() {
        let config = EngineConfig::default();
        assert!(config.pushdown_enabled);
        assert!(config.distinct_optimization);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"default_database":"repo"}"#).expect("parse config");
        assert_eq!(config.default_database, "repo");
        assert!(config.pushdown_enabled);
        assert!(config.distinct_optimization);
    }
}
