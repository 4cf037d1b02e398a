//! Region definitions and fallback resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::event::Event;
use crate::geo::GeoRect;
use crate::TARGET_PIPELINE;

/// Name given to the synthesized fallback region.
pub const FALLBACK_REGION_NAME: &str = "World Fallback";

/// A user-defined geographic, magnitude and age rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    /// Display color as a hex string. Not used by filtering.
    pub color: String,
    pub border_width: f64,
    pub bounds: GeoRect,
    pub min_magnitude: f64,
    pub max_magnitude: f64,
    /// Maximum age in whole days.
    pub max_age_days: u32,
    pub notification: String,
    pub sound: String,
    pub is_fallback: bool,
    pub is_enabled: bool,
    pub notify_on_new: bool,
}

impl Region {
    /// Creates an enabled, non-fallback region over `bounds` accepting
    /// magnitudes 5.0 through 10.0 up to 5 days old.
    pub fn new(name: impl Into<String>, bounds: GeoRect) -> Self {
        Self {
            name: name.into(),
            color: "#FF0000".to_string(),
            border_width: 0.0,
            bounds,
            min_magnitude: 5.0,
            max_magnitude: 10.0,
            max_age_days: 5,
            notification: "None".to_string(),
            sound: "None".to_string(),
            is_fallback: false,
            is_enabled: true,
            notify_on_new: false,
        }
    }

    /// The world-covering fallback used when configuration supplies none.
    pub fn default_fallback() -> Self {
        Self {
            color: "#00000000".to_string(),
            is_fallback: true,
            ..Self::new(FALLBACK_REGION_NAME, GeoRect::world())
        }
    }

    pub fn with_magnitudes(mut self, min_magnitude: f64, max_magnitude: f64) -> Self {
        self.min_magnitude = min_magnitude;
        self.max_magnitude = max_magnitude;
        self
    }

    pub fn with_max_age(mut self, days: u32) -> Self {
        self.max_age_days = days;
        self
    }

    pub fn as_fallback(mut self) -> Self {
        self.is_fallback = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.is_enabled = false;
        self
    }

    /// True if the event lies inside the rectangle, bounds inclusive.
    pub fn contains(&self, event: &Event) -> bool {
        self.bounds.contains(&event.location())
    }

    /// Magnitude and age test, ignoring location.
    pub fn accepts(&self, event: &Event, now: DateTime<Utc>) -> bool {
        if event.magnitude < self.min_magnitude || event.magnitude > self.max_magnitude {
            return false;
        }
        event.age_in_days(now).floor() <= f64::from(self.max_age_days)
    }
}

/// Regions prepared for one filter pass, with the fallback resolved.
///
/// The first region flagged as fallback is the designated fallback and any
/// other flagged region is matched as an ordinary region. A set with no
/// flagged region gets a synthesized [`Region::default_fallback`]; this
/// includes the empty set.
#[derive(Debug, Clone)]
pub struct RegionSet {
    regions: Vec<Region>,
    fallback_index: Option<usize>,
    fallback: Region,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        let fallback_index = regions.iter().position(|r| r.is_fallback);
        let fallback = match fallback_index {
            Some(index) => regions[index].clone(),
            None => {
                debug!(target: TARGET_PIPELINE, "No fallback region configured, using default");
                Region::default_fallback()
            }
        };
        let flagged = regions.iter().filter(|r| r.is_fallback).count();
        if flagged > 1 {
            debug!(target: TARGET_PIPELINE, "{} regions flagged as fallback, using {:?}", flagged, fallback.name);
        }
        Self {
            regions,
            fallback_index,
            fallback,
        }
    }

    /// Regions in list order.
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn fallback(&self) -> &Region {
        &self.fallback
    }

    /// Index of the configured fallback, or `None` when synthesized.
    pub fn fallback_index(&self) -> Option<usize> {
        self.fallback_index
    }

    /// Enabled regions checked in the main pass, with their list indexes.
    pub fn candidates(&self) -> impl Iterator<Item = (usize, &Region)> {
        self.regions
            .iter()
            .enumerate()
            .filter(move |(index, region)| region.is_enabled && Some(*index) != self.fallback_index)
    }
}

impl From<Vec<Region>> for RegionSet {
    fn from(regions: Vec<Region>) -> Self {
        RegionSet::new(regions)
    }
}
