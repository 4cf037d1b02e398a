//! Persisted region format: one region per line, 13 tab-separated fields.
//!
//! ```text
//! name  color  border_width  upper_left  lower_right  min_mag  max_mag  age
//! notification  sound  is_fallback  is_enabled  notify_on_new
//! ```
//!
//! Corners are written as `latitude,longitude`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use super::types::Region;
use crate::geo::{GeoPoint, GeoRect};
use crate::TARGET_PIPELINE;

const FIELD_COUNT: usize = 13;

#[derive(Debug, Error, PartialEq)]
pub enum RegionDecodeError {
    #[error("expected 13 tab-separated fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field}: {value:?}")]
    Field { field: &'static str, value: String },
}

fn field<T: FromStr>(name: &'static str, raw: &str) -> Result<T, RegionDecodeError> {
    raw.trim().parse::<T>().map_err(|_| RegionDecodeError::Field {
        field: name,
        value: raw.to_string(),
    })
}

impl Region {
    /// Decodes one persisted line. Empty fields are ignored when splitting.
    pub fn decode(line: &str) -> Result<Region, RegionDecodeError> {
        let parts: Vec<&str> = line
            .trim_end_matches(['\r', '\n'])
            .split('\t')
            .filter(|part| !part.is_empty())
            .collect();
        if parts.len() != FIELD_COUNT {
            return Err(RegionDecodeError::FieldCount(parts.len()));
        }

        let upper_left: GeoPoint = field("upper_left", parts[3])?;
        let lower_right: GeoPoint = field("lower_right", parts[4])?;
        let age: i64 = field("age", parts[7])?;

        Ok(Region {
            name: parts[0].to_string(),
            color: parts[1].to_string(),
            border_width: field("border_width", parts[2])?,
            bounds: GeoRect::new(upper_left, lower_right),
            min_magnitude: field("min_magnitude", parts[5])?,
            max_magnitude: field("max_magnitude", parts[6])?,
            max_age_days: u32::try_from(age.unsigned_abs()).map_err(|_| {
                RegionDecodeError::Field {
                    field: "age",
                    value: parts[7].to_string(),
                }
            })?,
            notification: parts[8].to_string(),
            sound: parts[9].to_string(),
            is_fallback: field("is_fallback", parts[10])?,
            is_enabled: field("is_enabled", parts[11])?,
            notify_on_new: field("notify_on_new", parts[12])?,
        })
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.name,
            self.color,
            self.border_width,
            self.bounds.upper_left,
            self.bounds.lower_right,
            self.min_magnitude,
            self.max_magnitude,
            self.max_age_days,
            self.notification,
            self.sound,
            self.is_fallback,
            self.is_enabled,
            self.notify_on_new
        )
    }
}

/// Decodes every non-blank line, dropping (and logging) lines that fail.
pub fn decode_regions(text: &str) -> Vec<Region> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(number, line)| match Region::decode(line) {
            Ok(region) => Some(region),
            Err(err) => {
                warn!(target: TARGET_PIPELINE, "Dropping region on line {}: {}", number + 1, err);
                None
            }
        })
        .collect()
}

/// Encodes regions one per line.
pub fn encode_regions(regions: &[Region]) -> String {
    let mut text = String::new();
    for region in regions {
        text.push_str(&region.to_string());
        text.push('\n');
    }
    text
}
