use super::*;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CteLayering {
    /// Layer 0 depends on no other CTE; layer k only on layers before k.
    pub layers: Vec<Vec<String>>,
    /// CTEs dumped into the last layer because they sit on or behind a cycle.
    pub cycle_fallback: Vec<String>,
}

/// Orders CTEs into dependency layers with Kahn's algorithm.
///
/// CTE `a` depends on CTE `b` when a node of `a`'s tree scans `b`. Names keep
/// definition order inside each layer. When no CTE is free but some remain,
/// all remaining names form one final layer.
pub fn cte_dependency_layers(cte_trees: &[CteTree], references: &[CteReference]) -> CteLayering {
    let index: HashMap<&str, usize> = cte_trees
        .iter()
        .enumerate()
        .map(|(idx, cte)| (cte.cte_name.as_str(), idx))
        .collect();

    let mut owner: HashMap<&str, usize> = HashMap::new();
    for (idx, cte) in cte_trees.iter().enumerate() {
        cte.tree.walk(&mut |node| {
            owner.insert(node.id.as_str(), idx);
        });
    }

    let mut depends_on: Vec<Vec<usize>> = vec![Vec::new(); cte_trees.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); cte_trees.len()];
    for reference in references {
        let Some(&from) = owner.get(reference.node_id.as_str()) else {
            continue;
        };
        let Some(&to) = index.get(reference.cte_name.as_str()) else {
            continue;
        };
        if from == to || depends_on[from].contains(&to) {
            continue;
        }
        depends_on[from].push(to);
        dependents[to].push(from);
    }

    let mut pending: Vec<usize> = depends_on.iter().map(Vec::len).collect();
    let mut placed = vec![false; cte_trees.len()];
    let mut remaining = cte_trees.len();
    let mut layering = CteLayering::default();

    while remaining > 0 {
        let mut layer: Vec<usize> = (0..cte_trees.len())
            .filter(|idx| !placed[*idx] && pending[*idx] == 0)
            .collect();
        if layer.is_empty() {
            layer = (0..cte_trees.len()).filter(|idx| !placed[*idx]).collect();
            layering.cycle_fallback = layer
                .iter()
                .map(|idx| cte_trees[*idx].cte_name.clone())
                .collect();
            warn!(
                ctes = ?layering.cycle_fallback,
                "CTE dependency cycle, placing remaining CTEs in one layer"
            );
        }
        for idx in &layer {
            placed[*idx] = true;
            for dependent in &dependents[*idx] {
                pending[*dependent] = pending[*dependent].saturating_sub(1);
            }
        }
        remaining -= layer.len();
        layering.layers.push(
            layer
                .into_iter()
                .map(|idx| cte_trees[idx].cte_name.clone())
                .collect(),
        );
    }

    debug!(layers = layering.layers.len(), "ordered CTE layers");
    layering
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cte(name: &str, ids: &[&str]) -> CteTree {
        let mut tree = PlanNode::new(ids[0], "Subquery Scan");
        for id in &ids[1..] {
            tree.children.push(PlanNode::new(*id, "CTE Scan"));
        }
        CteTree {
            cte_name: name.to_string(),
            tree,
        }
    }

    fn reference(node_id: &str, cte_name: &str) -> CteReference {
        CteReference {
            node_id: node_id.to_string(),
            cte_name: cte_name.to_string(),
            target_cte_node_id: String::new(),
        }
    }

    fn names(layers: &[Vec<String>]) -> Vec<Vec<&str>> {
        layers
            .iter()
            .map(|layer| layer.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn independent_ctes_share_layer_zero() {
        let trees = vec![cte("a", &["a0"]), cte("b", &["b0"])];
        let layering = cte_dependency_layers(&trees, &[]);
        assert_eq!(names(&layering.layers), vec![vec!["a", "b"]]);
        assert!(layering.cycle_fallback.is_empty());
    }

    #[test]
    fn dependencies_come_first() {
        // a scans b, b scans c; d is free.
        let trees = vec![
            cte("a", &["a0", "a1"]),
            cte("b", &["b0", "b1"]),
            cte("c", &["c0"]),
            cte("d", &["d0"]),
        ];
        let refs = vec![reference("a1", "b"), reference("b1", "c")];
        let layering = cte_dependency_layers(&trees, &refs);
        assert_eq!(
            names(&layering.layers),
            vec![vec!["c", "d"], vec!["b"], vec!["a"]]
        );
    }

    #[test]
    fn main_tree_and_unknown_references_are_ignored() {
        let trees = vec![cte("a", &["a0", "a1"]), cte("b", &["b0"])];
        let refs = vec![
            reference("main-scan", "a"),
            reference("a1", "missing"),
            reference("a1", "a"),
        ];
        let layering = cte_dependency_layers(&trees, &refs);
        assert_eq!(names(&layering.layers), vec![vec!["a", "b"]]);
    }

    #[test]
    fn cycles_terminate_with_everything_placed() {
        let trees = vec![
            cte("a", &["a0", "a1"]),
            cte("b", &["b0", "b1"]),
            cte("c", &["c0"]),
        ];
        let refs = vec![reference("a1", "b"), reference("b1", "a")];
        let layering = cte_dependency_layers(&trees, &refs);
        assert_eq!(names(&layering.layers), vec![vec!["c"], vec!["a", "b"]]);
        assert_eq!(layering.cycle_fallback, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn duplicate_references_count_once() {
        let trees = vec![cte("a", &["a0", "a1", "a2"]), cte("b", &["b0"])];
        let refs = vec![reference("a1", "b"), reference("a2", "b")];
        let layering = cte_dependency_layers(&trees, &refs);
        assert_eq!(names(&layering.layers), vec![vec!["b"], vec!["a"]]);
    }
}
