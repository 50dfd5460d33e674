use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CteOffset {
    pub x: f32,
    pub y: f32,
    pub layer: usize,
}

/// Translations that move each tree into the shared coordinate space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForestPlacement {
    pub main_offset: (f32, f32),
    pub cte_offsets: BTreeMap<String, CteOffset>,
    /// Union of every tree's bounds after translation.
    pub total_bounds: BoundingBox,
}

impl ForestPlacement {
    /// Applies the offsets to the layouts they were computed from.
    pub fn apply(&self, main: &mut TreeLayout, cte_layouts: &mut BTreeMap<String, TreeLayout>) {
        main.translate(self.main_offset.0, self.main_offset.1);
        for (name, offset) in &self.cte_offsets {
            if let Some(layout) = cte_layouts.get_mut(name) {
                layout.translate(offset.x, offset.y);
            }
        }
    }
}

/// Stacks CTE trees below the main tree, one row per dependency layer.
///
/// The main tree's top-left corner goes to the configured origin. Each layer
/// starts `layer_gap` below the previous row; within a layer trees are placed
/// left to right from `origin_x`, `tree_gap` apart. A row is as tall as its
/// tallest tree. Names without a laid-out tree are skipped.
pub fn compose_forest(
    main: &TreeLayout,
    layers: &[Vec<String>],
    cte_layouts: &BTreeMap<String, TreeLayout>,
    config: &ForestConfig,
) -> ForestPlacement {
    let mut placement = ForestPlacement::default();
    let mut total: Option<BoundingBox> = None;

    let mut layer_y = config.origin_y;
    if !main.is_empty() {
        let bounds = main.bounds();
        let dx = config.origin_x - bounds.min_x;
        let dy = config.origin_y - bounds.min_y;
        placement.main_offset = (dx, dy);
        total = Some(bounds.translated(dx, dy));
        layer_y = config.origin_y + bounds.height() + config.layer_gap;
    }

    for (layer_idx, layer) in layers.iter().enumerate() {
        let mut cursor_x = config.origin_x;
        let mut tallest: Option<f32> = None;
        for name in layer {
            let Some(layout) = cte_layouts.get(name) else {
                continue;
            };
            if layout.is_empty() {
                continue;
            }
            let bounds = layout.bounds();
            let dx = cursor_x - bounds.min_x;
            let dy = layer_y - bounds.min_y;
            placement.cte_offsets.insert(
                name.clone(),
                CteOffset {
                    x: dx,
                    y: dy,
                    layer: layer_idx,
                },
            );
            let moved = bounds.translated(dx, dy);
            total = Some(match total {
                Some(current) => current.union(&moved),
                None => moved,
            });
            cursor_x += bounds.width() + config.tree_gap;
            tallest = Some(tallest.unwrap_or(0.0).max(bounds.height()));
        }
        if let Some(height) = tallest {
            layer_y += height + config.layer_gap;
        }
    }

    placement.total_bounds = total.unwrap_or_default();
    debug!(
        ctes = placement.cte_offsets.len(),
        width = placement.total_bounds.width(),
        height = placement.total_bounds.height(),
        "composed forest"
    );
    placement
}

#[cfg(test)]
mod tests {
    use super::*;

    fn laid_out(tree: &PlanNode) -> TreeLayout {
        let config = LayoutConfig {
            node_width: 100.0,
            node_height: 40.0,
            horizontal_gap: 20.0,
            vertical_gap: 80.0,
            ..LayoutConfig::default()
        };
        layout_tree(Some(tree), &config, &config)
    }

    fn forest_config() -> ForestConfig {
        ForestConfig {
            origin_x: 10.0,
            origin_y: 10.0,
            tree_gap: 30.0,
            layer_gap: 50.0,
        }
    }

    fn leaf(id: &str) -> PlanNode {
        PlanNode::new(id, "Seq Scan")
    }

    #[test]
    fn main_tree_goes_to_the_origin() {
        let main = laid_out(&PlanNode::new("m", "Append").with_children([leaf("m1"), leaf("m2")]));
        let placement = compose_forest(&main, &[], &BTreeMap::new(), &forest_config());
        let moved = main.bounds().translated(placement.main_offset.0, placement.main_offset.1);
        assert_eq!((moved.min_x, moved.min_y), (10.0, 10.0));
        assert_eq!(placement.total_bounds, moved);
    }

    #[test]
    fn layers_stack_below_the_main_tree() {
        // Main tree: 2 levels -> height 80 + 40.
        let main = laid_out(&PlanNode::new("m", "Append").with_child(leaf("m1")));
        let mut ctes = BTreeMap::new();
        ctes.insert("a".to_string(), laid_out(&leaf("a0")));
        ctes.insert(
            "b".to_string(),
            laid_out(&PlanNode::new("b0", "Sort").with_child(leaf("b1"))),
        );
        ctes.insert("c".to_string(), laid_out(&leaf("c0")));
        let layers = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string()],
        ];
        let config = forest_config();
        let placement = compose_forest(&main, &layers, &ctes, &config);

        let a = placement.cte_offsets["a"];
        let b = placement.cte_offsets["b"];
        let c = placement.cte_offsets["c"];
        let a_box = ctes["a"].bounds().translated(a.x, a.y);
        let b_box = ctes["b"].bounds().translated(b.x, b.y);
        let c_box = ctes["c"].bounds().translated(c.x, c.y);

        // First layer starts layer_gap under the 120-tall main tree.
        assert_eq!((a_box.min_x, a_box.min_y), (10.0, 180.0));
        assert_eq!((b_box.min_x, b_box.min_y), (140.0, 180.0));
        // Second layer starts under the tallest tree of the first (b, 120).
        assert_eq!((c_box.min_x, c_box.min_y), (10.0, 350.0));
        assert_eq!((a.layer, b.layer, c.layer), (0, 0, 1));
        assert_eq!(placement.total_bounds.max_y, 390.0);
        assert!(!a_box.intersects(&b_box));
        assert!(!b_box.intersects(&c_box));
    }

    #[test]
    fn apply_translates_layouts() {
        let mut main = laid_out(&leaf("m"));
        let mut ctes = BTreeMap::new();
        ctes.insert("a".to_string(), laid_out(&leaf("a0")));
        let layers = vec![vec!["a".to_string()]];
        let placement = compose_forest(&main, &layers, &ctes, &forest_config());
        placement.apply(&mut main, &mut ctes);
        assert_eq!(main.bounds().min_x, 10.0);
        assert_eq!(ctes["a"].bounds().min_y, 10.0 + 40.0 + 50.0);
    }

    #[test]
    fn empty_main_tree_starts_layers_at_origin() {
        let mut ctes = BTreeMap::new();
        ctes.insert("a".to_string(), laid_out(&leaf("a0")));
        let layers = vec![vec!["a".to_string(), "ghost".to_string()], vec![]];
        let placement =
            compose_forest(&TreeLayout::default(), &layers, &ctes, &forest_config());
        assert_eq!(placement.main_offset, (0.0, 0.0));
        assert_eq!(placement.cte_offsets.len(), 1);
        let a = placement.cte_offsets["a"];
        assert_eq!(ctes["a"].bounds().translated(a.x, a.y).min_y, 10.0);
        assert_eq!(placement.total_bounds.min_y, 10.0);
    }
}
