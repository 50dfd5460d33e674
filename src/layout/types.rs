use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::CteMode;
use crate::ir::CteReference;

use super::bounds::BoundingBox;

/// A plan node with an assigned center position.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: String,
    pub operator_name: String,
    pub subplan_name: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, serde_json::Value>,
    pub depth: usize,
    /// Index of the parent in the owning `TreeLayout::nodes`.
    pub parent: Option<usize>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PositionedNode {
    pub fn center(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeLink {
    pub parent: String,
    pub child: String,
}

/// Positions for one tree. `nodes` is in preorder, so `nodes[0]` is the root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeLayout {
    pub nodes: Vec<PositionedNode>,
    pub links: Vec<TreeLink>,
}

impl TreeLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&PositionedNode> {
        self.nodes.first()
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn translate(&mut self, dx: f32, dy: f32) {
        for node in &mut self.nodes {
            node.x += dx;
            node.y += dy;
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        super::bounds::node_bounds(&self.nodes)
    }
}

/// A named subset of one tree's nodes, moved as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGroup {
    pub name: String,
    /// Indices into the shared `TreeLayout::nodes`.
    pub members: Vec<usize>,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeparationReport {
    pub passes: usize,
    pub shifts: usize,
    /// Group pairs still intersecting after the last pass.
    pub residual_overlaps: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ReferenceLink {
    #[serde(rename_all = "camelCase")]
    Resolved {
        reference: CteReference,
        source: (f32, f32),
        target: (f32, f32),
    },
    #[serde(rename_all = "camelCase")]
    Unresolved {
        reference: CteReference,
        missing_source: bool,
        missing_target: bool,
    },
}

impl ReferenceLink {
    pub fn reference(&self) -> &CteReference {
        match self {
            ReferenceLink::Resolved { reference, .. }
            | ReferenceLink::Unresolved { reference, .. } => reference,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ReferenceLink::Resolved { .. })
    }
}

/// One tree of the final layout, already moved into the shared coordinate space.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTree {
    /// `None` for the main execution tree.
    pub cte_name: Option<String>,
    pub layer: Option<usize>,
    pub layout: TreeLayout,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupBox {
    pub name: String,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDiagnostics {
    pub unresolved_definitions: Vec<String>,
    pub unresolved_references: usize,
    pub cycle_fallback: Vec<String>,
    pub residual_overlaps: Vec<(String, String)>,
    pub separation_passes: usize,
}

impl LayoutDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.unresolved_definitions.is_empty()
            && self.unresolved_references == 0
            && self.cycle_fallback.is_empty()
            && self.residual_overlaps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanLayout {
    pub mode: CteMode,
    pub trees: Vec<PlacedTree>,
    pub groups: Vec<GroupBox>,
    pub reference_links: Vec<ReferenceLink>,
    pub layers: Vec<Vec<String>>,
    pub bounds: BoundingBox,
    pub width: f32,
    pub height: f32,
    pub diagnostics: LayoutDiagnostics,
}

impl PlanLayout {
    pub fn nodes(&self) -> impl Iterator<Item = &PositionedNode> {
        self.trees.iter().flat_map(|tree| tree.layout.nodes.iter())
    }

    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes().find(|node| node.id == id)
    }

    pub fn links(&self) -> impl Iterator<Item = &TreeLink> {
        self.trees.iter().flat_map(|tree| tree.layout.links.iter())
    }

    /// Node id to center, across every tree.
    pub fn positions(&self) -> BTreeMap<String, (f32, f32)> {
        self.nodes()
            .map(|node| (node.id.clone(), node.center()))
            .collect()
    }

    pub fn tree(&self, cte_name: Option<&str>) -> Option<&PlacedTree> {
        self.trees
            .iter()
            .find(|tree| tree.cte_name.as_deref() == cte_name)
    }
}
