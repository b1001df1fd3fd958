// -----------------------------------------------------------------------------
// GraphConfig
// -----------------------------------------------------------------------------
/// Behavior switches of a computation graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct GraphConfig {
    /// Reject a second backward pass on the graph until gradients are reset.
    ///
    /// When this is `false`, a repeated backward pass silently accumulates
    /// gradients on top of the previous ones.
    pub strict_backward: bool,

    /// Number of digits after the decimal point used in Graphviz output.
    pub graphviz_precision: usize,
}

impl Default for GraphConfig {
    #[inline]
    fn default() -> Self {
        Self {
            strict_backward: false,
            graphviz_precision: 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = GraphConfig::default();

        assert!(!config.strict_backward);
        assert_eq!(config.graphviz_precision, 4);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: GraphConfig = serde_json::from_str(r#"{"strict_backward": true}"#).unwrap();

        assert_eq!(
            config,
            GraphConfig {
                strict_backward: true,
                graphviz_precision: 4,
            }
        );
    }

    #[test]
    fn test_serialize() {
        let config = GraphConfig {
            strict_backward: true,
            graphviz_precision: 2,
        };

        let json = serde_json::to_value(&config).unwrap();

        assert_eq!(
            json,
            serde_json::json!({"strict_backward": true, "graphviz_precision": 2})
        );
    }
}
