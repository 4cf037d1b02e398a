use tracing::debug;

use super::normalize::{normalize, RepresentativeOrder};
use crate::event::{Event, EventNode};
use crate::TARGET_PIPELINE;

/// Groups events by distance, greedily and in input order.
///
/// Each event is compared against the existing anchors in list order and is
/// attached as a direct child of the first anchor within `closeness_km`. An
/// event matching no anchor becomes a new anchor at the end of the list.
/// Distance is always measured to the anchor itself, never to its children,
/// so the result depends on input order (first fit, not nearest fit).
///
/// # Arguments
/// * `events` - Flat list of events
/// * `closeness_km` - Maximum great-circle distance to an anchor, inclusive
///
/// # Returns
/// * `Vec<EventNode>` - One node per anchor, in the order anchors were created
pub fn combine(events: Vec<Event>, closeness_km: f64) -> Vec<EventNode> {
    let total = events.len();
    let mut anchors: Vec<(Event, Vec<Event>)> = Vec::new();

    'events: for event in events {
        for (anchor, children) in anchors.iter_mut() {
            if anchor.distance_to(&event) <= closeness_km {
                children.push(event);
                continue 'events;
            }
        }
        anchors.push((event, Vec::new()));
    }

    debug!(target: TARGET_PIPELINE, "Combined {} events into {} nodes (closeness {} km)", total, anchors.len(), closeness_km);

    anchors
        .into_iter()
        .map(|(anchor, children)| EventNode::with_children(anchor, children))
        .collect()
}

/// [`combine`] followed by representative selection.
pub fn combine_ordered(
    events: Vec<Event>,
    closeness_km: f64,
    order: RepresentativeOrder,
) -> Vec<EventNode> {
    normalize(combine(events, closeness_km), order)
}

/// Turns every member of every node into an independent top-level event.
///
/// Each representative is followed by its former children. Nothing is added
/// or dropped.
pub fn flatten(nodes: Vec<EventNode>) -> Vec<Event> {
    let mut flat = Vec::with_capacity(nodes.iter().map(|n| n.cluster_count() + 1).sum());
    for node in nodes {
        let (representative, children) = node.into_parts();
        flat.push(representative);
        flat.extend(children);
    }
    flat
}
