use serde::Serialize;

use super::types::PositionedNode;

/// Axis-aligned box. The zero box is what an empty node set produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl BoundingBox {
    pub fn new(min_x: f32, max_x: f32, min_y: f32, max_y: f32) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Box of size `width` x `height` centered on `(x, y)`.
    pub fn around(x: f32, y: f32, width: f32, height: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Self::new(x - half_w, x + half_w, y - half_h, y + half_h)
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.max_x.max(other.max_x),
            self.min_y.min(other.min_y),
            self.max_y.max(other.max_y),
        )
    }

    pub fn translated(&self, dx: f32, dy: f32) -> BoundingBox {
        BoundingBox::new(
            self.min_x + dx,
            self.max_x + dx,
            self.min_y + dy,
            self.max_y + dy,
        )
    }

    /// Overlap extent along x; zero or negative when the spans are disjoint.
    pub fn overlap_x(&self, other: &BoundingBox) -> f32 {
        self.max_x.min(other.max_x) - self.min_x.max(other.min_x)
    }

    pub fn overlap_y(&self, other: &BoundingBox) -> f32 {
        self.max_y.min(other.max_y) - self.min_y.max(other.min_y)
    }

    /// Strict intersection: boxes that only touch do not intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.overlap_x(other) > 0.0 && self.overlap_y(other) > 0.0
    }
}

/// Union of every node's own `width` x `height` box. Empty input gives the
/// zero box, so callers must skip empty sets before comparing boxes.
pub fn node_bounds<'a>(nodes: impl IntoIterator<Item = &'a PositionedNode>) -> BoundingBox {
    let mut bounds: Option<BoundingBox> = None;
    for node in nodes {
        let rect = BoundingBox::around(node.x, node.y, node.width, node.height);
        bounds = Some(match bounds {
            Some(current) => current.union(&rect),
            None => rect,
        });
    }
    bounds.unwrap_or_default()
}

/// Same as [`node_bounds`] for a subset of `nodes` given by index.
pub fn member_bounds(nodes: &[PositionedNode], members: &[usize]) -> BoundingBox {
    node_bounds(members.iter().filter_map(|idx| nodes.get(*idx)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, x: f32, y: f32) -> PositionedNode {
        PositionedNode {
            id: id.to_string(),
            operator_name: "Scan".to_string(),
            subplan_name: None,
            metrics: Default::default(),
            depth: 0,
            parent: None,
            x,
            y,
            width: 100.0,
            height: 40.0,
        }
    }

    #[test]
    fn pads_points_into_boxes() {
        let nodes = vec![node("a", 0.0, 0.0), node("b", 200.0, 80.0)];
        let bounds = node_bounds(&nodes);
        assert_eq!(bounds, BoundingBox::new(-50.0, 250.0, -20.0, 100.0));
        assert_eq!(bounds.width(), 300.0);
        assert_eq!(bounds.height(), 120.0);
    }

    #[test]
    fn empty_input_is_the_zero_box() {
        let nodes: Vec<PositionedNode> = Vec::new();
        let bounds = node_bounds(&nodes);
        assert_eq!(bounds, BoundingBox::default());
        assert_eq!(bounds.width(), 0.0);
    }

    #[test]
    fn member_bounds_ignores_other_nodes() {
        let nodes = vec![node("a", 0.0, 0.0), node("b", 500.0, 0.0)];
        assert_eq!(member_bounds(&nodes, &[1]).min_x, 450.0);
    }

    #[test]
    fn touching_boxes_do_not_intersect() {
        let a = BoundingBox::new(0.0, 10.0, 0.0, 10.0);
        let b = BoundingBox::new(10.0, 20.0, 0.0, 10.0);
        let c = BoundingBox::new(5.0, 15.0, 8.0, 12.0);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert_eq!(a.overlap_x(&c), 5.0);
        assert_eq!(a.overlap_y(&c), 2.0);
    }
}
