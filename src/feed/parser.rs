//! Feed document and feature parsing.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::types::{
    FeatureCollection, FeatureError, FeatureGeometry, FeatureProperties, FetchError,
    ParsedEvents, RawFeature,
};
use crate::event::Event;
use crate::TARGET_WEB_REQUEST;

/// Parses the top-level FeatureCollection.
///
/// Only the document shape is checked here; each feature is validated later
/// by [`parse_feature`], so one bad feature never fails the document.
pub fn parse_document(body: &str) -> Result<Vec<RawFeature>, FetchError> {
    let collection: FeatureCollection =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    let features: Vec<RawFeature> = collection
        .features
        .into_iter()
        .map(|mut feature| RawFeature {
            geometry: feature
                .get_mut("geometry")
                .map(serde_json::Value::take)
                .unwrap_or_default(),
            properties: feature
                .get_mut("properties")
                .map(serde_json::Value::take)
                .unwrap_or_default(),
        })
        .collect();

    debug!(target: TARGET_WEB_REQUEST, "Feed document holds {} features", features.len());
    Ok(features)
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>, FeatureError> {
    DateTime::from_timestamp_millis(millis).ok_or(FeatureError::Timestamp(millis))
}

/// Converts one raw feature into an event.
///
/// Geometry coordinates are `[longitude, latitude, depth]`; times are
/// milliseconds since the Unix epoch.
pub fn parse_feature(raw: &RawFeature, sequence: usize) -> Result<Event, FeatureError> {
    let properties: FeatureProperties = serde_json::from_value(raw.properties.clone())
        .map_err(|e| FeatureError::Properties(e.to_string()))?;
    let geometry: FeatureGeometry = serde_json::from_value(raw.geometry.clone())
        .map_err(|e| FeatureError::Geometry(e.to_string()))?;
    if geometry.coordinates.len() < 3 {
        return Err(FeatureError::Coordinates(geometry.coordinates.len()));
    }

    let time = timestamp(properties.time)?;
    let updated = timestamp(properties.updated)?;

    let mut event = Event::new(
        properties.code.trim(),
        geometry.coordinates[1],
        geometry.coordinates[0],
        properties.mag,
        time,
    )
    .with_place(&properties.place);
    event.sequence = sequence;
    event.depth = geometry.coordinates[2];
    event.tsunami = properties.tsunami != 0;
    event.status = properties.status;
    event.updated = Some(updated);
    event.mmi = properties.mmi;
    event.felt = properties.felt;
    event.significance = properties.sig;
    event.title = properties.title;
    Ok(event)
}

/// Parses every feature, skipping malformed ones and dropping events below
/// `min_magnitude`. Sequence numbers follow feed order among kept events.
///
/// # Arguments
/// * `features` - Raw features from one fetch
/// * `min_magnitude` - Global minimum magnitude, inclusive
///
/// # Returns
/// * `ParsedEvents` - Kept events plus skip counts
pub fn to_events(features: &[RawFeature], min_magnitude: f64) -> ParsedEvents {
    let mut parsed = ParsedEvents::default();
    for (index, raw) in features.iter().enumerate() {
        match parse_feature(raw, parsed.events.len()) {
            Ok(event) if event.magnitude < min_magnitude => parsed.below_minimum += 1,
            Ok(event) => parsed.events.push(event),
            Err(err) => {
                warn!(target: TARGET_WEB_REQUEST, "Skipping feature {}: {}", index, err);
                parsed.skipped += 1;
            }
        }
    }
    debug!(
        target: TARGET_WEB_REQUEST,
        "Parsed {} events ({} skipped, {} below magnitude {})",
        parsed.events.len(),
        parsed.skipped,
        parsed.below_minimum,
        min_magnitude
    );
    parsed
}
