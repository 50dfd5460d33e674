use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// One operator of a query execution plan. A node owns its children.
///
/// Traversals, `Clone` and `Drop` use explicit stacks, so plan depth is not
/// bounded by the thread's stack size.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    pub id: String,
    pub operator_name: String,
    /// Cost/timing/row annotations. Carried through to the layout untouched.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subplan_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(id: impl Into<String>, operator_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operator_name: operator_name.into(),
            metrics: BTreeMap::new(),
            subplan_name: None,
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = PlanNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_subplan(mut self, name: impl Into<String>) -> Self {
        self.subplan_name = Some(name.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first search for `id`, including `self`.
    pub fn find(&self, id: &str) -> Option<&PlanNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Visits every node in preorder.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PlanNode)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(node.children.iter().rev());
        }
    }

    /// Node ids in preorder.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.walk(&mut |node| ids.push(node.id.as_str()));
        ids
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0usize;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Removes, at every level below `self`, each child whose id is in `ids`.
    pub fn prune_children(&mut self, ids: &HashSet<&str>) {
        let mut stack: Vec<&mut PlanNode> = vec![self];
        while let Some(node) = stack.pop() {
            node.children.retain(|child| !ids.contains(child.id.as_str()));
            stack.extend(node.children.iter_mut());
        }
    }

    fn shallow_clone(&self) -> PlanNode {
        PlanNode {
            id: self.id.clone(),
            operator_name: self.operator_name.clone(),
            metrics: self.metrics.clone(),
            subplan_name: self.subplan_name.clone(),
            children: Vec::new(),
        }
    }

    /// Fails on the first id that occurs twice.
    pub fn validate_unique_ids(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut duplicate: Option<&str> = None;
        self.walk(&mut |node| {
            if duplicate.is_none() && !seen.insert(node.id.as_str()) {
                duplicate = Some(node.id.as_str());
            }
        });
        match duplicate {
            Some(id) => Err(LayoutError::DuplicateNodeId(id.to_string())),
            None => Ok(()),
        }
    }
}

impl Clone for PlanNode {
    fn clone(&self) -> Self {
        // Descendants in preorder, each with its child count.
        let mut order: Vec<(PlanNode, usize)> = Vec::new();
        let mut stack: Vec<&PlanNode> = self.children.iter().rev().collect();
        while let Some(node) = stack.pop() {
            order.push((node.shallow_clone(), node.children.len()));
            stack.extend(node.children.iter().rev());
        }

        // Rebuilt back to front, a node's children sit on top of `built`,
        // last child first.
        let mut built: Vec<PlanNode> = Vec::with_capacity(order.len());
        while let Some((mut node, count)) = order.pop() {
            let start = built.len().saturating_sub(count);
            node.children = built.drain(start..).rev().collect();
            built.push(node);
        }

        let mut root = self.shallow_clone();
        root.children = built.into_iter().rev().collect();
        root
    }
}

impl Drop for PlanNode {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CteDefinition {
    pub cte_name: String,
    pub root_node_id: String,
}

/// A node that scans a CTE, and the root of the CTE it reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CteReference {
    pub node_id: String,
    pub cte_name: String,
    #[serde(rename = "targetCTENodeId", alias = "targetCteNodeId")]
    pub target_cte_node_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CteMetadata {
    /// Definition order is the iteration order for every CTE pass.
    #[serde(default)]
    pub definitions: Vec<CteDefinition>,
    #[serde(default)]
    pub references: Vec<CteReference>,
}

impl CteMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, cte_name: &str, root_node_id: &str) {
        self.definitions.push(CteDefinition {
            cte_name: cte_name.to_string(),
            root_node_id: root_node_id.to_string(),
        });
    }

    pub fn reference(&mut self, node_id: &str, cte_name: &str, target_cte_node_id: &str) {
        self.references.push(CteReference {
            node_id: node_id.to_string(),
            cte_name: cte_name.to_string(),
            target_cte_node_id: target_cte_node_id.to_string(),
        });
    }

    pub fn definition(&self, cte_name: &str) -> Option<&CteDefinition> {
        self.definitions
            .iter()
            .find(|definition| definition.cte_name == cte_name)
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty() && self.references.is_empty()
    }

    pub fn validate_unique_names(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for definition in &self.definitions {
            if !seen.insert(definition.cte_name.as_str()) {
                return Err(LayoutError::DuplicateCteName(definition.cte_name.clone()));
            }
        }
        Ok(())
    }
}

/// The document the CLI reads: a plan plus its CTE metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutRequest {
    pub plan: PlanNode,
    #[serde(default, alias = "cteMetadata")]
    pub cte: CteMetadata,
}
