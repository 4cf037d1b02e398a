//! Earthquake event types.
//!
//! [`Event`] is a single reported quake. [`EventNode`] is what gets published:
//! either a lone event or a representative with its directly attached related
//! events. Children are plain `Event`s, so a child can never carry children of
//! its own and the one-level nesting invariant holds by construction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Anything identified by a feed code. Used for set comparisons and dedup.
pub trait Keyed {
    fn code(&self) -> &str;
}

/// One reported seismic occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Feed-assigned code, unique within a published list.
    pub code: String,
    /// Parse order within a cycle. Debug aid only.
    pub sequence: usize,
    pub place: String,
    pub magnitude: f64,
    pub time: DateTime<Utc>,
    pub tsunami: bool,
    pub latitude: f64,
    pub longitude: f64,
    /// Depth in kilometers.
    pub depth: f64,
    pub status: String,
    pub updated: Option<DateTime<Utc>>,
    /// ShakeMap intensity.
    pub mmi: Option<f64>,
    /// Number of "did you feel it" reports.
    pub felt: Option<i32>,
    pub significance: i32,
    pub title: Option<String>,
    /// Set for events injected by hand rather than fetched.
    pub debug: bool,
}

impl Event {
    /// Creates an event with the given identity, location, magnitude and time.
    /// Remaining fields take neutral defaults.
    pub fn new(
        code: impl Into<String>,
        latitude: f64,
        longitude: f64,
        magnitude: f64,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.into(),
            sequence: 0,
            place: String::new(),
            magnitude,
            time,
            tsunami: false,
            latitude,
            longitude,
            depth: 0.0,
            status: String::new(),
            updated: None,
            mmi: None,
            felt: None,
            significance: 0,
            title: None,
            debug: false,
        }
    }

    pub fn with_place(mut self, place: &str) -> Self {
        self.place = place.trim().to_string();
        self
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Great-circle distance to another event in kilometers.
    pub fn distance_to(&self, other: &Event) -> f64 {
        self.location().distance_to(&other.location())
    }

    /// Time elapsed since the quake. Negative for timestamps in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.time)
    }

    /// Fractional age in days.
    pub fn age_in_days(&self, now: DateTime<Utc>) -> f64 {
        self.age(now).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
    }

    /// Code with surrounding whitespace removed; the dedup key.
    pub fn key(&self) -> &str {
        self.code.trim()
    }
}

impl Keyed for Event {
    fn code(&self) -> &str {
        self.key()
    }
}

/// A published entry: a single event or a cluster of related events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventNode {
    Leaf(Event),
    Cluster {
        representative: Event,
        children: Vec<Event>,
    },
}

impl From<Event> for EventNode {
    fn from(event: Event) -> Self {
        EventNode::Leaf(event)
    }
}

impl EventNode {
    /// Builds a node, collapsing to a leaf when there are no children.
    pub fn with_children(representative: Event, children: Vec<Event>) -> Self {
        if children.is_empty() {
            EventNode::Leaf(representative)
        } else {
            EventNode::Cluster {
                representative,
                children,
            }
        }
    }

    /// The event standing for this node.
    pub fn representative(&self) -> &Event {
        match self {
            EventNode::Leaf(event) => event,
            EventNode::Cluster { representative, .. } => representative,
        }
    }

    pub fn children(&self) -> &[Event] {
        match self {
            EventNode::Leaf(_) => &[],
            EventNode::Cluster { children, .. } => children,
        }
    }

    pub fn is_cluster(&self) -> bool {
        !self.children().is_empty()
    }

    /// Number of related (child) events.
    pub fn cluster_count(&self) -> usize {
        self.children().len()
    }

    /// Representative followed by every child.
    pub fn members(&self) -> impl Iterator<Item = &Event> {
        std::iter::once(self.representative()).chain(self.children().iter())
    }

    /// Splits the node into its representative and children.
    pub fn into_parts(self) -> (Event, Vec<Event>) {
        match self {
            EventNode::Leaf(event) => (event, Vec::new()),
            EventNode::Cluster {
                representative,
                children,
            } => (representative, children),
        }
    }

    /// Member with the greatest magnitude; the representative when there are
    /// no children or when no child is strictly greater.
    pub fn greatest_magnitude_event(&self) -> &Event {
        let mut greatest = self.representative();
        for child in self.children() {
            if child.magnitude > greatest.magnitude {
                greatest = child;
            }
        }
        greatest
    }

    pub fn greatest_magnitude(&self) -> f64 {
        self.greatest_magnitude_event().magnitude
    }

    /// True if the representative or any child has `code`.
    pub fn contains(&self, code: &str) -> bool {
        let code = code.trim();
        self.members().any(|event| event.key() == code)
    }
}

impl Keyed for EventNode {
    fn code(&self) -> &str {
        self.representative().key()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Fixed reference instant used across tests.
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    pub fn quake(code: &str, latitude: f64, longitude: f64, magnitude: f64) -> Event {
        Event::new(code, latitude, longitude, magnitude, now() - Duration::hours(1))
    }

    pub fn quake_aged(code: &str, latitude: f64, longitude: f64, magnitude: f64, days: i64) -> Event {
        Event::new(code, latitude, longitude, magnitude, now() - Duration::days(days))
    }
}
