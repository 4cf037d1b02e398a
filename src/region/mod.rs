//! Region configuration and the priority-ordered region filter.
//!
//! Regions are evaluated in list order against deduplicated events, before
//! clustering, so excluded events never anchor a cluster.

mod codec;
mod filter;
mod provider;
mod types;

pub use self::codec::{decode_regions, encode_regions, RegionDecodeError};
pub use self::filter::{filter_list, region_name_for, RegionMatch};
pub use self::provider::{RegionFile, RegionProvider};
pub use self::types::{Region, RegionSet, FALLBACK_REGION_NAME};
