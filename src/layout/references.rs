use super::*;

/// Pairs each CTE reference with the positions of its scanning node and the
/// CTE root. Missing endpoints yield `ReferenceLink::Unresolved`; nothing is
/// dropped and the output keeps the input order.
pub fn resolve_reference_links(
    positions: &BTreeMap<String, (f32, f32)>,
    references: &[CteReference],
) -> Vec<ReferenceLink> {
    let links: Vec<ReferenceLink> = references
        .iter()
        .map(|reference| {
            let source = positions.get(&reference.node_id).copied();
            let target = positions.get(&reference.target_cte_node_id).copied();
            match (source, target) {
                (Some(source), Some(target)) => ReferenceLink::Resolved {
                    reference: reference.clone(),
                    source,
                    target,
                },
                _ => ReferenceLink::Unresolved {
                    reference: reference.clone(),
                    missing_source: source.is_none(),
                    missing_target: target.is_none(),
                },
            }
        })
        .collect();

    let unresolved = links.iter().filter(|link| !link.is_resolved()).count();
    if unresolved > 0 {
        warn!(unresolved, total = links.len(), "unresolved CTE references");
    }
    links
}
