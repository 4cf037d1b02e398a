//! Hand-made events for exercising the pipeline without the network.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::event::Event;
use crate::geo::GeoPoint;

const MAX_PLACEMENT_ATTEMPTS: usize = 64;
const KM_PER_DEGREE: f64 = 111.195;
const MIN_MAGNITUDE: f64 = 5.0;
const MAX_MAGNITUDE: f64 = 9.5;

static NEXT_DEBUG_ID: AtomicU64 = AtomicU64::new(1);

fn debug_code(prefix: &str) -> String {
    format!("{}-{}", prefix, NEXT_DEBUG_ID.fetch_add(1, Ordering::Relaxed))
}

/// A debug event with a fresh unique code.
pub fn debug_quake(latitude: f64, longitude: f64, magnitude: f64, now: DateTime<Utc>) -> Event {
    let mut event = Event::new(debug_code("debug"), latitude, longitude, magnitude, now)
        .with_place("Injected");
    event.title = Some(format!("M {:.1} - Injected", magnitude));
    event.status = "debug".to_string();
    event.debug = true;
    event
}

pub fn random_location<R: Rng>(rng: &mut R) -> GeoPoint {
    GeoPoint::new(rng.random_range(-80.0..=80.0), rng.random_range(-180.0..180.0))
}

/// Random point within `range_km` of `base`, by rejection sampling in the
/// surrounding lat/lon box. Gives up and returns `base` after a bounded number
/// of attempts.
pub fn random_location_near<R: Rng>(rng: &mut R, base: GeoPoint, range_km: f64) -> GeoPoint {
    if range_km <= 0.0 {
        return base;
    }
    let lat_span = (range_km / KM_PER_DEGREE).min(180.0);
    let lon_span = (lat_span / base.latitude.to_radians().cos().abs().max(0.01)).min(180.0);

    for _ in 0..MAX_PLACEMENT_ATTEMPTS {
        let latitude = (base.latitude + rng.random_range(-lat_span..=lat_span)).clamp(-90.0, 90.0);
        let mut longitude = base.longitude + rng.random_range(-lon_span..=lon_span);
        if longitude > 180.0 {
            longitude -= 360.0;
        } else if longitude < -180.0 {
            longitude += 360.0;
        }
        let candidate = GeoPoint::new(latitude, longitude);
        if base.distance_to(&candidate) <= range_km {
            return candidate;
        }
    }
    base
}

/// A random base quake, then `count - far_count` quakes within `range_km` of
/// it and `far_count` quakes anywhere. `far_count` is capped at `count`.
pub fn random_cluster<R: Rng>(
    rng: &mut R,
    count: usize,
    far_count: usize,
    range_km: f64,
    now: DateTime<Utc>,
) -> Vec<Event> {
    let far_count = far_count.min(count);
    let base_point = random_location(rng);
    let mut events = Vec::with_capacity(count + 1);

    let mut base = debug_quake(
        base_point.latitude,
        base_point.longitude,
        rng.random_range(MIN_MAGNITUDE..=MAX_MAGNITUDE),
        now,
    );
    base.code = debug_code("cluster-base");
    events.push(base);

    for _ in 0..far_count {
        let point = random_location(rng);
        let mut event = debug_quake(point.latitude, point.longitude, rng.random_range(MIN_MAGNITUDE..=MAX_MAGNITUDE), now);
        event.code = debug_code("cluster-far");
        events.push(event);
    }
    for _ in far_count..count {
        let point = random_location_near(rng, base_point, range_km);
        let mut event = debug_quake(point.latitude, point.longitude, rng.random_range(MIN_MAGNITUDE..=MAX_MAGNITUDE), now);
        event.code = debug_code("cluster-close");
        events.push(event);
    }
    events
}
