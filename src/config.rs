use crate::error::{LayoutError, Result};
use crate::ir::PlanNode;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How CTE subtrees are arranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CteMode {
    /// CTE subtrees stay in the plan tree and are pushed apart as groups.
    Inline,
    /// CTE subtrees are lifted into their own trees and stacked in layers.
    #[default]
    Forest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlapConfig {
    pub min_gap: f32,
    /// Upper bound on resolver passes. One pass may leave residual overlaps.
    pub max_passes: usize,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            min_gap: 40.0,
            max_passes: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForestConfig {
    pub origin_x: f32,
    pub origin_y: f32,
    /// Horizontal gap between CTE trees of the same layer.
    pub tree_gap: f32,
    /// Vertical gap between the main tree and the first layer, and between layers.
    pub layer_gap: f32,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            tree_gap: 80.0,
            layer_gap: 120.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    pub horizontal_gap: f32,
    /// Distance between consecutive depths.
    pub vertical_gap: f32,
    /// Leaf separation multiplier when neighbouring leaves have different parents.
    pub cousin_separation: f32,
    pub cte_mode: CteMode,
    /// Height overrides keyed by operator name.
    pub operator_heights: BTreeMap<String, f32>,
    pub validate_input: bool,
    pub overlap: OverlapConfig,
    pub forest: ForestConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 180.0,
            node_height: 60.0,
            horizontal_gap: 20.0,
            vertical_gap: 100.0,
            cousin_separation: 1.2,
            cte_mode: CteMode::Forest,
            operator_heights: BTreeMap::new(),
            validate_input: true,
            overlap: OverlapConfig::default(),
            forest: ForestConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("nodeWidth", self.node_width),
            ("nodeHeight", self.node_height),
            ("verticalGap", self.vertical_gap),
            ("cousinSeparation", self.cousin_separation),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let non_negative = [
            ("horizontalGap", self.horizontal_gap),
            ("overlap.minGap", self.overlap.min_gap),
            ("forest.treeGap", self.forest.tree_gap),
            ("forest.layerGap", self.forest.layer_gap),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        if !self.forest.origin_x.is_finite() || !self.forest.origin_y.is_finite() {
            return Err(LayoutError::InvalidConfig(
                "forest origin must be finite".to_string(),
            ));
        }
        for (operator, height) in &self.operator_heights {
            if !height.is_finite() || *height <= 0.0 {
                return Err(LayoutError::InvalidConfig(format!(
                    "operator height for {operator} must be positive, got {height}"
                )));
            }
        }
        Ok(())
    }
}

/// Size of a node's box, independent of any rendering backend.
pub trait NodeSizer {
    fn size(&self, node: &PlanNode) -> (f32, f32);
}

impl NodeSizer for LayoutConfig {
    fn size(&self, node: &PlanNode) -> (f32, f32) {
        let height = self
            .operator_heights
            .get(&node.operator_name)
            .copied()
            .unwrap_or(self.node_height);
        (self.node_width, height)
    }
}

impl<F> NodeSizer for F
where
    F: Fn(&PlanNode) -> (f32, f32),
{
    fn size(&self, node: &PlanNode) -> (f32, f32) {
        self(node)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
}

/// Reads a JSON5 (or plain JSON) config file; `None` yields the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: Config = json5::from_str(&contents)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.layout.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_node_width() {
        let config = LayoutConfig {
            node_width: 0.0,
            ..LayoutConfig::default()
        };
        assert!(matches!(config.validate(), Err(LayoutError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_negative_gap() {
        let mut config = LayoutConfig::default();
        config.forest.layer_gap = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sizer_uses_operator_heights() {
        let mut config = LayoutConfig::default();
        config
            .operator_heights
            .insert("Hash Join".to_string(), 90.0);
        assert_eq!(config.size(&PlanNode::new("a", "Hash Join")), (180.0, 90.0));
        assert_eq!(config.size(&PlanNode::new("b", "Seq Scan")), (180.0, 60.0));
    }

    #[test]
    fn closures_are_sizers() {
        let sizer =
            |node: &PlanNode| -> (f32, f32) { (node.operator_name.len() as f32 * 10.0, 30.0) };
        assert_eq!(sizer.size(&PlanNode::new("a", "Sort")), (40.0, 30.0));
    }

    #[test]
    fn loads_partial_json5_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "{{ // comments are fine\n layout: {{ nodeWidth: 120, cteMode: 'inline', forest: {{ layerGap: 60 }} }} }}"
        )
        .unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.layout.node_width, 120.0);
        assert_eq!(config.layout.cte_mode, CteMode::Inline);
        assert_eq!(config.layout.forest.layer_gap, 60.0);
        assert_eq!(config.layout.forest.tree_gap, 80.0);
        assert_eq!(config.layout.node_height, 60.0);
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "layout": {{ "verticalGap": 0 }} }}"#).unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn missing_path_gives_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.layout.cte_mode, CteMode::Forest);
    }
}
