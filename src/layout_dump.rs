use crate::layout::{GroupBox, LayoutDiagnostics, PlanLayout, ReferenceLink};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDump {
    pub mode: String,
    pub width: f32,
    pub height: f32,
    pub nodes: Vec<NodeDump>,
    pub links: Vec<LinkDump>,
    pub trees: Vec<TreeDump>,
    pub groups: Vec<GroupBox>,
    pub reference_links: Vec<ReferenceLink>,
    pub layers: Vec<Vec<String>>,
    pub diagnostics: LayoutDiagnostics,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDump {
    pub id: String,
    /// CTE name of the owning tree, `None` for the main tree.
    pub tree: Option<String>,
    pub operator: String,
    pub subplan: Option<String>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metrics: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct LinkDump {
    pub parent: String,
    pub child: String,
    pub points: Vec<[f32; 2]>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDump {
    pub cte_name: Option<String>,
    pub layer: Option<usize>,
    pub root: Option<String>,
    pub node_count: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutDump {
    pub fn from_layout(layout: &PlanLayout) -> Self {
        let mut nodes = Vec::new();
        let mut links = Vec::new();
        let mut trees = Vec::new();
        for placed in &layout.trees {
            let tree_nodes = &placed.layout.nodes;
            for node in tree_nodes {
                nodes.push(NodeDump {
                    id: node.id.clone(),
                    tree: placed.cte_name.clone(),
                    operator: node.operator_name.clone(),
                    subplan: node.subplan_name.clone(),
                    depth: node.depth,
                    x: node.x,
                    y: node.y,
                    width: node.width,
                    height: node.height,
                    metrics: node
                        .metrics
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect(),
                });
                if let Some(parent) = node.parent.and_then(|idx| tree_nodes.get(idx)) {
                    links.push(LinkDump {
                        parent: parent.id.clone(),
                        child: node.id.clone(),
                        points: vec![[parent.x, parent.y], [node.x, node.y]],
                    });
                }
            }
            trees.push(TreeDump {
                cte_name: placed.cte_name.clone(),
                layer: placed.layer,
                root: placed.layout.root().map(|root| root.id.clone()),
                node_count: tree_nodes.len(),
                x: placed.bounds.min_x,
                y: placed.bounds.min_y,
                width: placed.bounds.width(),
                height: placed.bounds.height(),
            });
        }

        LayoutDump {
            mode: format!("{:?}", layout.mode),
            width: layout.width,
            height: layout.height,
            nodes,
            links,
            trees,
            groups: layout.groups.clone(),
            reference_links: layout.reference_links.clone(),
            layers: layout.layers.clone(),
            diagnostics: layout.diagnostics.clone(),
        }
    }
}

pub fn layout_dump_json(layout: &PlanLayout) -> anyhow::Result<String> {
    let dump = LayoutDump::from_layout(layout);
    Ok(serde_json::to_string_pretty(&dump)?)
}

pub fn write_layout_dump(path: &Path, layout: &PlanLayout) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = LayoutDump::from_layout(layout);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::ir::{CteMetadata, PlanNode};
    use crate::layout::compute_plan_layout;

    #[test]
    fn dump_lists_nodes_links_and_references() {
        let plan = PlanNode::new("root", "Hash Join").with_children([
            PlanNode::new("scan", "CTE Scan").with_metric("rows", serde_json::json!(42)),
            PlanNode::new("cte", "Aggregate").with_child(PlanNode::new("leaf", "Seq Scan")),
        ]);
        let mut meta = CteMetadata::new();
        meta.define("totals", "cte");
        meta.reference("scan", "totals", "cte");
        let layout = compute_plan_layout(&plan, &meta, &LayoutConfig::default()).unwrap();

        let dump = LayoutDump::from_layout(&layout);
        assert_eq!(dump.mode, "Forest");
        assert_eq!(dump.nodes.len(), 4);
        assert_eq!(dump.links.len(), 2);
        assert_eq!(dump.trees.len(), 2);
        assert_eq!(dump.trees[1].cte_name.as_deref(), Some("totals"));
        assert_eq!(dump.trees[1].root.as_deref(), Some("cte"));

        let json: serde_json::Value =
            serde_json::from_str(&layout_dump_json(&layout).unwrap()).unwrap();
        assert_eq!(json["referenceLinks"][0]["status"], "resolved");
        assert_eq!(json["referenceLinks"][0]["reference"]["targetCTENodeId"], "cte");
        assert_eq!(json["nodes"][1]["metrics"]["rows"], 42);
        assert_eq!(json["layers"][0][0], "totals");
    }
}
