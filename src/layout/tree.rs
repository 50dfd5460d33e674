use super::*;

/// Tidy top-down layout of one tree.
///
/// Leaves take consecutive slots left to right, `step` apart for siblings and
/// `step * cousin_separation` apart when their parents differ, where `step`
/// is the widest node plus `horizontal_gap`. Every parent is centered on the
/// mean of its children and `y = depth * vertical_gap`. Since a parent's x
/// stays within the span of its own leaves, nodes at one depth keep their
/// left-to-right order and never come closer than `step`.
pub fn layout_tree(
    root: Option<&PlanNode>,
    sizer: &dyn NodeSizer,
    config: &LayoutConfig,
) -> TreeLayout {
    let Some(root) = root else {
        return TreeLayout::default();
    };

    let mut nodes: Vec<PositionedNode> = Vec::new();
    let mut children: Vec<Vec<usize>> = Vec::new();
    flatten(root, sizer, &mut nodes, &mut children);

    let widest = nodes
        .iter()
        .map(|node| node.width)
        .fold(config.node_width, f32::max);
    let step = widest + config.horizontal_gap;

    let mut previous_leaf: Option<usize> = None;
    for idx in 0..nodes.len() {
        if !children[idx].is_empty() {
            continue;
        }
        let x = match previous_leaf {
            Some(prev) => {
                let separation = if nodes[prev].parent == nodes[idx].parent {
                    1.0
                } else {
                    config.cousin_separation.max(1.0)
                };
                nodes[prev].x + step * separation
            }
            None => 0.0,
        };
        nodes[idx].x = x;
        previous_leaf = Some(idx);
    }

    // Children always follow their parent in preorder.
    for idx in (0..nodes.len()).rev() {
        let kids = &children[idx];
        if kids.is_empty() {
            continue;
        }
        let sum: f32 = kids.iter().map(|child| nodes[*child].x).sum();
        nodes[idx].x = sum / kids.len() as f32;
    }

    for node in &mut nodes {
        node.y = node.depth as f32 * config.vertical_gap;
    }

    let links = nodes
        .iter()
        .filter_map(|node| {
            node.parent.map(|parent| TreeLink {
                parent: nodes[parent].id.clone(),
                child: node.id.clone(),
            })
        })
        .collect();

    TreeLayout { nodes, links }
}

/// Preorder flattening with an explicit stack; `children[i]` lists the
/// indices of node `i`'s children in order.
fn flatten(
    root: &PlanNode,
    sizer: &dyn NodeSizer,
    nodes: &mut Vec<PositionedNode>,
    children: &mut Vec<Vec<usize>>,
) {
    let mut stack: Vec<(&PlanNode, Option<usize>, usize)> = vec![(root, None, 0)];
    while let Some((node, parent, depth)) = stack.pop() {
        let idx = nodes.len();
        let (width, height) = sizer.size(node);
        nodes.push(PositionedNode {
            id: node.id.clone(),
            operator_name: node.operator_name.clone(),
            subplan_name: node.subplan_name.clone(),
            metrics: node.metrics.clone(),
            depth,
            parent,
            x: 0.0,
            y: 0.0,
            width,
            height,
        });
        children.push(Vec::with_capacity(node.children.len()));
        if let Some(parent) = parent {
            children[parent].push(idx);
        }
        for child in node.children.iter().rev() {
            stack.push((child, Some(idx), depth + 1));
        }
    }
}
