mod bounds;
mod dependency;
mod extract;
mod forest;
mod overlap;
mod references;
mod tree;
pub(crate) mod types;
pub use bounds::*;
pub use dependency::*;
pub use extract::*;
pub use forest::*;
pub use overlap::*;
pub use references::*;
pub use tree::*;
pub use types::*;

use crate::config::{CteMode, ForestConfig, LayoutConfig, NodeSizer};
use crate::error::Result;
use crate::ir::{CteMetadata, CteReference, PlanNode};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Lays out `plan` with node sizes taken from `config`.
pub fn compute_plan_layout(
    plan: &PlanNode,
    metadata: &CteMetadata,
    config: &LayoutConfig,
) -> Result<PlanLayout> {
    compute_plan_layout_with_sizer(plan, metadata, config, config)
}

/// Lays out `plan`, sizing nodes with `sizer`.
///
/// Fails only on malformed input (duplicate ids or CTE names, bad spacing
/// constants). Missing CTE roots, dangling references and dependency cycles
/// are reported in `PlanLayout::diagnostics`.
pub fn compute_plan_layout_with_sizer(
    plan: &PlanNode,
    metadata: &CteMetadata,
    config: &LayoutConfig,
    sizer: &dyn NodeSizer,
) -> Result<PlanLayout> {
    config.validate()?;
    if config.validate_input {
        plan.validate_unique_ids()?;
        metadata.validate_unique_names()?;
    }
    let layout = match config.cte_mode {
        CteMode::Inline => compute_inline_layout(plan, metadata, config, sizer),
        CteMode::Forest => compute_forest_layout(plan, metadata, config, sizer),
    };
    debug!(
        mode = ?layout.mode,
        trees = layout.trees.len(),
        width = layout.width,
        height = layout.height,
        "computed plan layout"
    );
    Ok(layout)
}

fn compute_inline_layout(
    plan: &PlanNode,
    metadata: &CteMetadata,
    config: &LayoutConfig,
    sizer: &dyn NodeSizer,
) -> PlanLayout {
    let mut tree = layout_tree(Some(plan), sizer, config);
    let mut groups = group_by_subplan(&tree);
    let report = separate_groups(
        &mut tree,
        &mut groups,
        config.overlap.min_gap,
        config.overlap.max_passes,
    );

    let positions: BTreeMap<String, (f32, f32)> = tree
        .nodes
        .iter()
        .map(|node| (node.id.clone(), node.center()))
        .collect();
    let reference_links = resolve_reference_links(&positions, &metadata.references);

    let unresolved_definitions = metadata
        .definitions
        .iter()
        .filter(|definition| !positions.contains_key(&definition.root_node_id))
        .map(|definition| definition.cte_name.clone())
        .collect();

    let bounds = tree.bounds();
    let group_boxes = groups
        .iter()
        .filter(|group| !group.members.is_empty())
        .map(|group| GroupBox {
            name: group.name.clone(),
            bounds: group.bounds,
        })
        .collect();

    PlanLayout {
        mode: CteMode::Inline,
        trees: vec![PlacedTree {
            cte_name: None,
            layer: None,
            layout: tree,
            bounds,
        }],
        groups: group_boxes,
        diagnostics: LayoutDiagnostics {
            unresolved_definitions,
            unresolved_references: count_unresolved(&reference_links),
            cycle_fallback: Vec::new(),
            residual_overlaps: report.residual_overlaps,
            separation_passes: report.passes,
        },
        reference_links,
        layers: Vec::new(),
        bounds,
        width: bounds.width(),
        height: bounds.height(),
    }
}

fn compute_forest_layout(
    plan: &PlanNode,
    metadata: &CteMetadata,
    config: &LayoutConfig,
    sizer: &dyn NodeSizer,
) -> PlanLayout {
    let forest = extract_cte_trees(plan, metadata);

    let mut main = layout_tree(forest.main_tree.as_ref(), sizer, config);
    let mut cte_layouts: BTreeMap<String, TreeLayout> = forest
        .cte_trees
        .iter()
        .map(|cte| {
            (
                cte.cte_name.clone(),
                layout_tree(Some(&cte.tree), sizer, config),
            )
        })
        .collect();

    let layering = cte_dependency_layers(&forest.cte_trees, &forest.cte_references);
    let placement = compose_forest(&main, &layering.layers, &cte_layouts, &config.forest);
    placement.apply(&mut main, &mut cte_layouts);

    let mut trees: Vec<PlacedTree> = Vec::with_capacity(cte_layouts.len() + 1);
    if !main.is_empty() {
        let bounds = main.bounds();
        trees.push(PlacedTree {
            cte_name: None,
            layer: None,
            layout: main,
            bounds,
        });
    }
    for layer in &layering.layers {
        for name in layer {
            let Some(layout) = cte_layouts.remove(name) else {
                continue;
            };
            let bounds = layout.bounds();
            trees.push(PlacedTree {
                cte_name: Some(name.clone()),
                layer: placement.cte_offsets.get(name).map(|offset| offset.layer),
                layout,
                bounds,
            });
        }
    }

    let positions: BTreeMap<String, (f32, f32)> = trees
        .iter()
        .flat_map(|tree| tree.layout.nodes.iter())
        .map(|node| (node.id.clone(), node.center()))
        .collect();
    let reference_links = resolve_reference_links(&positions, &forest.cte_references);

    let groups = trees
        .iter()
        .map(|tree| GroupBox {
            name: tree
                .cte_name
                .clone()
                .unwrap_or_else(|| MAIN_GROUP.to_string()),
            bounds: tree.bounds,
        })
        .collect();

    let bounds = placement.total_bounds;
    PlanLayout {
        mode: CteMode::Forest,
        trees,
        groups,
        diagnostics: LayoutDiagnostics {
            unresolved_definitions: forest.unresolved_definitions,
            unresolved_references: count_unresolved(&reference_links),
            cycle_fallback: layering.cycle_fallback,
            residual_overlaps: Vec::new(),
            separation_passes: 0,
        },
        reference_links,
        layers: layering.layers,
        bounds,
        width: bounds.width(),
        height: bounds.height(),
    }
}

fn count_unresolved(links: &[ReferenceLink]) -> usize {
    links.iter().filter(|link| !link.is_resolved()).count()
}
