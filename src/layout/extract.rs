use super::*;

#[derive(Debug, Clone, PartialEq)]
pub struct CteTree {
    pub cte_name: String,
    pub tree: PlanNode,
}

/// A plan split into its main tree and one standalone tree per CTE.
#[derive(Debug, Clone, PartialEq)]
pub struct ForestLayout {
    /// `None` when a CTE definition claimed the plan root itself.
    pub main_tree: Option<PlanNode>,
    pub cte_trees: Vec<CteTree>,
    pub cte_references: Vec<CteReference>,
    /// CTEs whose root id was missing from the plan or already claimed.
    pub unresolved_definitions: Vec<String>,
}

/// Lifts every defined CTE subtree out of `tree`.
///
/// Works on a copy; `tree` is left as it was. Each node ends up in exactly
/// one output tree: a CTE root nested inside another CTE's subtree is cut
/// from the enclosing CTE tree too.
pub fn extract_cte_trees(tree: &PlanNode, metadata: &CteMetadata) -> ForestLayout {
    let mut main = tree.clone();

    let mut claimed: HashSet<&str> = HashSet::new();
    let mut cte_trees: Vec<CteTree> = Vec::new();
    let mut unresolved_definitions: Vec<String> = Vec::new();
    for definition in &metadata.definitions {
        let root_id = definition.root_node_id.as_str();
        let found = if claimed.contains(root_id) {
            None
        } else {
            main.find(root_id)
        };
        let Some(root) = found else {
            warn!(
                cte = %definition.cte_name,
                root = %definition.root_node_id,
                "CTE root missing from plan or already claimed, skipping"
            );
            unresolved_definitions.push(definition.cte_name.clone());
            continue;
        };
        claimed.insert(root_id);
        cte_trees.push(CteTree {
            cte_name: definition.cte_name.clone(),
            tree: root.clone(),
        });
    }

    for cte in &mut cte_trees {
        cte.tree.prune_children(&claimed);
    }
    let main_tree = if claimed.contains(main.id.as_str()) {
        None
    } else {
        main.prune_children(&claimed);
        Some(main)
    };

    debug!(
        ctes = cte_trees.len(),
        unresolved = unresolved_definitions.len(),
        main_nodes = main_tree.as_ref().map(PlanNode::node_count).unwrap_or(0),
        "extracted CTE trees"
    );

    ForestLayout {
        main_tree,
        cte_trees,
        cte_references: metadata.references.clone(),
        unresolved_definitions,
    }
}
