//! One pass of the event pipeline over cycle-local data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clustering::{combine_ordered, RepresentativeOrder, DEFAULT_CLOSENESS_KM};
use crate::dedupe::dedupe;
use crate::event::{Event, EventNode};
use crate::feed::DEFAULT_MIN_MAGNITUDE;
use crate::region::{filter_list, Region};
use crate::TARGET_PIPELINE;

/// Tunables applied to every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Events below this magnitude are dropped right after parsing.
    pub min_magnitude: f64,
    pub closeness_km: f64,
    pub order: RepresentativeOrder,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            min_magnitude: DEFAULT_MIN_MAGNITUDE,
            closeness_km: DEFAULT_CLOSENESS_KM,
            order: RepresentativeOrder::default(),
        }
    }
}

/// Dedup, region filter, then combine. Filtering happens before combining so
/// an excluded event can never anchor or join a cluster.
pub fn run_pipeline(
    events: Vec<Event>,
    regions: &[Region],
    options: &PipelineOptions,
    now: DateTime<Utc>,
) -> Vec<EventNode> {
    let unique = dedupe(events);
    let kept = filter_list(unique, regions, now);
    let nodes = combine_ordered(kept, options.closeness_km, options.order);
    debug!(target: TARGET_PIPELINE, "Pipeline produced {} nodes", nodes.len());
    nodes
}
