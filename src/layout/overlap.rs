use super::*;

/// Name of the group holding nodes without a `subplan_name`.
pub const MAIN_GROUP: &str = "(main)";

/// Splits a laid-out tree into one group per `subplan_name`, plus the main
/// group for untagged nodes, in order of first appearance.
pub fn group_by_subplan(layout: &TreeLayout) -> Vec<NodeGroup> {
    let mut groups: Vec<NodeGroup> = Vec::new();
    for (idx, node) in layout.nodes.iter().enumerate() {
        let name = node.subplan_name.as_deref().unwrap_or(MAIN_GROUP);
        match groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.members.push(idx),
            None => groups.push(NodeGroup {
                name: name.to_string(),
                members: vec![idx],
                bounds: BoundingBox::default(),
            }),
        }
    }
    for group in &mut groups {
        group.bounds = member_bounds(&layout.nodes, &group.members);
    }
    groups
}

/// Pushes intersecting groups apart, moving their nodes in `layout`.
///
/// Each pass visits pairs `(i, j)`, `i < j`, in index order. For an
/// intersecting pair the later group (larger `min_x`, then larger `min_y`,
/// then larger index) moves along the axis with the smaller overlap, away
/// from the other group, until `min_gap` separates them. That is
/// `overlap + min_gap` unless one box spans the other on that axis. The moved
/// group's cached bounds are updated before the next pair is checked. A shift can create a new overlap with an earlier group, so passes
/// repeat until a pass finds nothing or `max_passes` is spent. Whatever still
/// intersects is returned in the report.
pub fn separate_groups(
    layout: &mut TreeLayout,
    groups: &mut [NodeGroup],
    min_gap: f32,
    max_passes: usize,
) -> SeparationReport {
    let mut report = SeparationReport::default();
    for _ in 0..max_passes.max(1) {
        report.passes += 1;
        let shifted = separation_pass(layout, groups, min_gap);
        report.shifts += shifted;
        if shifted == 0 {
            break;
        }
    }
    report.residual_overlaps = overlapping_pairs(groups);
    if !report.residual_overlaps.is_empty() {
        warn!(
            pairs = report.residual_overlaps.len(),
            passes = report.passes,
            "group overlaps remain after separation"
        );
    }
    debug!(
        groups = groups.len(),
        passes = report.passes,
        shifts = report.shifts,
        "separated subplan groups"
    );
    report
}

fn separation_pass(layout: &mut TreeLayout, groups: &mut [NodeGroup], min_gap: f32) -> usize {
    let mut shifts = 0usize;
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            if groups[i].members.is_empty() || groups[j].members.is_empty() {
                continue;
            }
            let a = groups[i].bounds;
            let b = groups[j].bounds;
            if !a.intersects(&b) {
                continue;
            }
            let (later, moving, other) = if is_later(&b, &a) {
                (j, b, a)
            } else {
                (i, a, b)
            };
            let (dx, dy) = if a.overlap_x(&b) <= a.overlap_y(&b) {
                (clearance(moving.min_x, moving.max_x, other.min_x, other.max_x, min_gap), 0.0)
            } else {
                (0.0, clearance(moving.min_y, moving.max_y, other.min_y, other.max_y, min_gap))
            };
            let group = &mut groups[later];
            for idx in &group.members {
                if let Some(node) = layout.nodes.get_mut(*idx) {
                    node.x += dx;
                    node.y += dy;
                }
            }
            group.bounds = group.bounds.translated(dx, dy);
            shifts += 1;
        }
    }
    shifts
}

/// Signed shift that moves the span `[min, max]` clear of `[other_min,
/// other_max]` plus `gap`: forward when it starts at or after the other span,
/// backward otherwise. Equals `overlap + gap` unless one span contains the other.
fn clearance(min: f32, max: f32, other_min: f32, other_max: f32, gap: f32) -> f32 {
    if min >= other_min {
        other_max - min + gap
    } else {
        -(max - other_min + gap)
    }
}

/// Whether `b` (the higher-index group) is the one to move. Ties keep index order.
fn is_later(b: &BoundingBox, a: &BoundingBox) -> bool {
    if b.min_x != a.min_x {
        return b.min_x > a.min_x;
    }
    b.min_y >= a.min_y
}

/// Every intersecting pair of non-empty groups, by name.
pub fn overlapping_pairs(groups: &[NodeGroup]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            if groups[i].members.is_empty() || groups[j].members.is_empty() {
                continue;
            }
            if groups[i].bounds.intersects(&groups[j].bounds) {
                pairs.push((groups[i].name.clone(), groups[j].name.clone()));
            }
        }
    }
    pairs
}
