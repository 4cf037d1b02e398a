//! Feed fetching and parsing.
//!
//! A fetch returns the raw features of one GeoJSON FeatureCollection. Parsing
//! into events is a separate step so malformed features are skipped one by one.

mod client;
mod parser;
mod stats;
mod types;

pub use self::types::*;

pub use self::client::{create_http_client, parse_feed_url, FeedSource, UsgsClient};
pub use self::parser::{parse_document, parse_feature, to_events};
pub use self::stats::{FeedStats, MAGNITUDE_BUCKETS};

#[cfg(test)]
pub(crate) use self::parser::samples;
