//! Time-and-distance relation between events.
//!
//! This is the aftershock/notification grouping policy. It is deliberately
//! separate from [`super::combine`], which only looks at distance.

use chrono::Duration;

use crate::event::{Event, EventNode};

/// True when the events are at most `max_time_delta` apart in time and at
/// most `max_distance_km` apart on the ground.
pub fn is_related(a: &Event, b: &Event, max_time_delta: Duration, max_distance_km: f64) -> bool {
    let time_delta = a.time.signed_duration_since(b.time).abs();
    if time_delta > max_time_delta {
        return false;
    }
    a.distance_to(b) <= max_distance_km
}

/// Groups events by [`is_related`].
///
/// Each event joins the first group whose representative it is related to. If
/// that group already holds the code, the event is dropped rather than placed
/// elsewhere. Unrelated events start a new group unless their code already
/// represents one.
pub fn group_related(
    events: Vec<Event>,
    max_time_delta: Duration,
    max_distance_km: f64,
) -> Vec<EventNode> {
    let mut groups: Vec<(Event, Vec<Event>)> = Vec::new();

    'events: for event in events {
        for (representative, children) in groups.iter_mut() {
            if is_related(representative, &event, max_time_delta, max_distance_km) {
                let present = representative.key() == event.key()
                    || children.iter().any(|c| c.key() == event.key());
                if !present {
                    children.push(event);
                }
                continue 'events;
            }
        }
        if groups.iter().any(|(r, _)| r.key() == event.key()) {
            continue;
        }
        groups.push((event, Vec::new()));
    }

    groups
        .into_iter()
        .map(|(representative, children)| EventNode::with_children(representative, children))
        .collect()
}
