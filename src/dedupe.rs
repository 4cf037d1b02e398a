//! Duplicate removal and order-insensitive list comparison, keyed by event code.

use std::collections::HashMap;
use tracing::debug;

use crate::event::{Event, Keyed};
use crate::TARGET_PIPELINE;

/// Removes events sharing a code.
///
/// When a code repeats, the last record seen wins and takes the list position
/// where that code first appeared. Codes are compared after trimming. The
/// result never contains a code twice and is never longer than the input.
pub fn dedupe(events: Vec<Event>) -> Vec<Event> {
    let total = events.len();
    let mut slots: Vec<Event> = Vec::with_capacity(total);
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(total);

    for event in events {
        match positions.get(event.key()) {
            Some(&index) => slots[index] = event,
            None => {
                positions.insert(event.key().to_string(), slots.len());
                slots.push(event);
            }
        }
    }

    if slots.len() < total {
        debug!(target: TARGET_PIPELINE, "Dropped {} duplicate events", total - slots.len());
    }
    slots
}

/// True when both lists hold the same codes, ignoring order. Neither list is
/// modified. Lists of different length are never the same.
pub fn same_set<T: Keyed>(left: &[T], right: &[T]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    let mut left_codes: Vec<&str> = left.iter().map(Keyed::code).collect();
    let mut right_codes: Vec<&str> = right.iter().map(Keyed::code).collect();
    left_codes.sort_unstable();
    right_codes.sort_unstable();
    left_codes == right_codes
}
