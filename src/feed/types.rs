//! Type definitions for the feed module.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Duration;

use crate::event::Event;

/// Why a fetch produced no features. A failed fetch never changes what is
/// already published.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("invalid feed URL {0:?}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error("feed responded with status {0}")]
    Status(u16),
    #[error("malformed feed document: {0}")]
    Malformed(String),
}

/// Why a single feature was skipped.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FeatureError {
    #[error("missing or invalid properties: {0}")]
    Properties(String),
    #[error("expected [lon, lat, depth] coordinates, found {0} values")]
    Coordinates(usize),
    #[error("missing or invalid geometry: {0}")]
    Geometry(String),
    #[error("timestamp {0} out of range")]
    Timestamp(i64),
}

/// One feature of the feed's FeatureCollection, not yet validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFeature {
    #[serde(default)]
    pub geometry: Value,
    #[serde(default)]
    pub properties: Value,
}

/// Top-level feed document.
#[derive(Debug, Deserialize)]
pub(crate) struct FeatureCollection {
    pub features: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeatureGeometry {
    pub coordinates: Vec<f64>,
}

/// Properties every usable feature must carry.
#[derive(Debug, Deserialize)]
pub(crate) struct FeatureProperties {
    pub mag: f64,
    pub place: String,
    pub time: i64,
    pub tsunami: i64,
    pub code: String,
    pub status: String,
    pub updated: i64,
    #[serde(default)]
    pub mmi: Option<f64>,
    #[serde(default)]
    pub felt: Option<i32>,
    pub sig: i32,
    #[serde(default)]
    pub title: Option<String>,
}

/// Events parsed from one fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedEvents {
    pub events: Vec<Event>,
    /// Malformed features dropped.
    pub skipped: usize,
    /// Well-formed features below the minimum magnitude.
    pub below_minimum: usize,
}

// Constants
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FEED_URL: &str =
    "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/all_month.geojson";
pub const DEFAULT_MIN_MAGNITUDE: f64 = 4.0;
