use std::time::Duration;

use r2r::ParameterValue;

/// Names and values used by one probe trial.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub node_name: String,
    pub namespace: String,
    pub param_name: String,
    pub logger: String,
    pub default_value: ParameterValue,
    pub set_value: ParameterValue,
    /// How long a single `spin_once` may block.
    pub spin_period: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            node_name: "my_node".to_string(),
            namespace: "".to_string(),
            param_name: "timing_test_param".to_string(),
            logger: "minimal_param".to_string(),
            default_value: ParameterValue::Bool(false),
            set_value: ParameterValue::Bool(true),
            spin_period: Duration::from_millis(10),
        }
    }
}

impl ProbeConfig {
    /// Fully qualified node name, e.g. `/my_node`.
    pub fn node_path(&self) -> String {
        let ns = self.namespace.trim_end_matches('/');
        if ns.is_empty() {
            format!("/{}", self.node_name)
        } else if ns.starts_with('/') {
            format!("{}/{}", ns, self.node_name)
        } else {
            format!("/{}/{}", ns, self.node_name)
        }
    }

    pub fn set_parameters_service(&self) -> String {
        format!("{}/set_parameters", self.node_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_names_match_demo() {
        let config = ProbeConfig::default();
        assert_eq!(config.node_path(), "/my_node");
        assert_eq!(config.set_parameters_service(), "/my_node/set_parameters");
        assert_eq!(config.param_name, "timing_test_param");
    }

    #[test]
    fn namespaced_node_path() {
        let mut config = ProbeConfig::default();
        config.namespace = "robot/".to_string();
        assert_eq!(config.node_path(), "/robot/my_node");
        config.namespace = "/robot".to_string();
        assert_eq!(config.node_path(), "/robot/my_node");
    }
}
