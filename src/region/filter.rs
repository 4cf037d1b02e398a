use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::{Region, RegionSet};
use crate::event::Event;
use crate::TARGET_PIPELINE;

/// Outcome of evaluating one event against a [`RegionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionMatch {
    /// Accepted by the region at this list index.
    Region(usize),
    /// Not inside any enabled region and accepted by the fallback.
    Fallback,
    Excluded,
}

impl RegionMatch {
    pub fn passes(&self) -> bool {
        !matches!(self, RegionMatch::Excluded)
    }
}

impl RegionSet {
    /// Evaluates an event against the enabled regions in list order.
    ///
    /// The first enabled, non-fallback region whose rectangle contains the
    /// event and whose magnitude and age tests pass accepts it. If at least one
    /// such region contains the event but none accepts it, the event is
    /// excluded: a containing region governs its area. Only events outside all
    /// candidate regions reach the fallback, whose rectangle and enabled flag
    /// are not checked.
    pub fn evaluate(&self, event: &Event, now: DateTime<Utc>) -> RegionMatch {
        let mut governed = false;
        for (index, region) in self.candidates() {
            if !region.contains(event) {
                continue;
            }
            if region.accepts(event, now) {
                return RegionMatch::Region(index);
            }
            governed = true;
        }
        if governed {
            return RegionMatch::Excluded;
        }

        if self.fallback().accepts(event, now) {
            RegionMatch::Fallback
        } else {
            RegionMatch::Excluded
        }
    }

    /// Keeps the events that pass, preserving order.
    pub fn filter(&self, events: Vec<Event>, now: DateTime<Utc>) -> Vec<Event> {
        let total = events.len();
        let kept: Vec<Event> = events
            .into_iter()
            .filter(|event| self.evaluate(event, now).passes())
            .collect();
        debug!(target: TARGET_PIPELINE, "Region filter kept {} of {} events ({} regions)", kept.len(), total, self.regions().len());
        kept
    }
}

/// Filters `events` against `regions`, synthesizing the default fallback
/// when the list has none.
///
/// # Arguments
/// * `events` - Deduplicated events, before clustering
/// * `regions` - Region configuration in priority order
/// * `now` - Reference instant for age tests
///
/// # Returns
/// * `Vec<Event>` - Events passing, in input order
pub fn filter_list(events: Vec<Event>, regions: &[Region], now: DateTime<Utc>) -> Vec<Event> {
    RegionSet::new(regions.to_vec()).filter(events, now)
}

/// Name of the first non-fallback region whose rectangle contains the event.
pub fn region_name_for<'a>(event: &Event, regions: &'a [Region]) -> Option<&'a str> {
    regions
        .iter()
        .filter(|region| !region.is_fallback)
        .find(|region| region.contains(event))
        .map(|region| region.name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::{now, quake_aged};
    use crate::geo::{GeoPoint, GeoRect};

    fn around_tokyo() -> GeoRect {
        GeoRect::new(GeoPoint::new(40.0, 135.0), GeoPoint::new(30.0, 145.0))
    }

    fn codes(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.code.as_str()).collect()
    }

    #[test]
    fn test_default_fallback_when_no_regions() {
        let events = vec![
            quake_aged("strong", 10.0, 10.0, 6.0, 1),
            quake_aged("weak", 10.0, 10.0, 3.0, 1),
        ];
        let kept = filter_list(events, &[], now());
        assert_eq!(codes(&kept), vec!["strong"]);
    }

    #[test]
    fn test_default_fallback_age_limit() {
        let events = vec![
            quake_aged("fresh", 0.0, 0.0, 6.0, 5),
            quake_aged("stale", 0.0, 0.0, 6.0, 6),
        ];
        assert_eq!(codes(&filter_list(events, &[], now())), vec!["fresh"]);
    }

    #[test]
    fn test_containing_region_governs_before_fallback() {
        let regions = vec![
            Region::new("A", around_tokyo()).with_magnitudes(7.0, 10.0),
            Region::default_fallback(),
        ];
        let set = RegionSet::new(regions.clone());
        let big = quake_aged("big", 35.0, 139.0, 7.5, 1);
        let medium = quake_aged("medium", 35.0, 139.0, 6.0, 1);
        let elsewhere = quake_aged("elsewhere", -10.0, 20.0, 6.0, 1);

        assert_eq!(set.evaluate(&big, now()), RegionMatch::Region(0));
        assert_eq!(set.evaluate(&medium, now()), RegionMatch::Excluded);
        assert_eq!(set.evaluate(&elsewhere, now()), RegionMatch::Fallback);

        let kept = filter_list(vec![big, medium, elsewhere], &regions, now());
        assert_eq!(codes(&kept), vec!["big", "elsewhere"]);
    }

    #[test]
    fn test_first_accepting_region_reported() {
        let set = RegionSet::new(vec![
            Region::new("strict", around_tokyo()).with_magnitudes(8.0, 10.0),
            Region::new("loose", around_tokyo()).with_magnitudes(4.0, 10.0),
        ]);
        let event = quake_aged("q", 35.0, 139.0, 5.0, 0);
        assert_eq!(set.evaluate(&event, now()), RegionMatch::Region(1));
    }

    #[test]
    fn test_disabled_region_ignored() {
        let regions = vec![
            Region::new("A", around_tokyo())
                .with_magnitudes(7.0, 10.0)
                .disabled(),
        ];
        // falls through to the synthesized fallback
        let kept = filter_list(vec![quake_aged("q", 35.0, 139.0, 6.0, 1)], &regions, now());
        assert_eq!(codes(&kept), vec!["q"]);
    }

    #[test]
    fn test_disabled_fallback_still_applies() {
        let regions = vec![Region::default_fallback().with_magnitudes(6.5, 10.0).disabled()];
        let events = vec![
            quake_aged("strong", 0.0, 0.0, 7.0, 1),
            quake_aged("weak", 0.0, 0.0, 6.0, 1),
        ];
        // still the designated fallback, so no default is synthesized
        assert_eq!(codes(&filter_list(events, &regions, now())), vec!["strong"]);
    }

    #[test]
    fn test_region_across_antimeridian() {
        let aleutians = GeoRect::new(GeoPoint::new(60.0, 170.0), GeoPoint::new(45.0, -170.0));
        let regions = vec![
            Region::new("Aleutians", aleutians).with_magnitudes(7.0, 10.0),
            Region::default_fallback(),
        ];
        let set = RegionSet::new(regions.clone());
        let inside = quake_aged("inside", 52.0, 175.0, 7.5, 1);
        let inside_west = quake_aged("inside_west", 52.0, -175.0, 6.0, 1);
        let elsewhere = quake_aged("elsewhere", 50.0, 0.0, 6.0, 1);

        assert_eq!(set.evaluate(&inside, now()), RegionMatch::Region(0));
        assert_eq!(set.evaluate(&inside_west, now()), RegionMatch::Excluded);
        assert_eq!(set.evaluate(&elsewhere, now()), RegionMatch::Fallback);

        let kept = filter_list(vec![inside, inside_west, elsewhere], &regions, now());
        assert_eq!(codes(&kept), vec!["inside", "elsewhere"]);
    }

    #[test]
    fn test_second_fallback_matched_as_region() {
        let regions = vec![
            Region::default_fallback().with_magnitudes(8.0, 10.0),
            Region::new("extra", around_tokyo())
                .with_magnitudes(4.0, 10.0)
                .as_fallback(),
        ];
        let set = RegionSet::new(regions);
        let inside = quake_aged("inside", 35.0, 139.0, 5.0, 1);
        let outside = quake_aged("outside", 0.0, 0.0, 5.0, 1);
        assert_eq!(set.evaluate(&inside, now()), RegionMatch::Region(1));
        assert_eq!(set.evaluate(&outside, now()), RegionMatch::Excluded);
    }

    #[test]
    fn test_fallback_rectangle_not_checked() {
        let mut fallback = Region::default_fallback();
        fallback.bounds = GeoRect::new(GeoPoint::new(1.0, 1.0), GeoPoint::new(0.0, 2.0));
        let kept = filter_list(vec![quake_aged("q", -50.0, -50.0, 6.0, 1)], &[fallback], now());
        assert_eq!(codes(&kept), vec!["q"]);
    }

    #[test]
    fn test_region_name_for() {
        let regions = vec![
            Region::default_fallback(),
            Region::new("Japan", around_tokyo()),
        ];
        assert_eq!(
            region_name_for(&quake_aged("q", 35.0, 139.0, 5.0, 0), &regions),
            Some("Japan")
        );
        assert_eq!(
            region_name_for(&quake_aged("q", 0.0, 0.0, 5.0, 0), &regions),
            None
        );
    }
}
