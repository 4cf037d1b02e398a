// Module declarations
pub mod combine;
pub mod normalize;
pub mod related;

pub use combine::{combine, combine_ordered, flatten};
pub use normalize::{normalize, RepresentativeOrder};
pub use related::{group_related, is_related};

/// Maximum distance in kilometers for an event to join an existing cluster
pub const DEFAULT_CLOSENESS_KM: f64 = 100.0;

/// Maximum time between two events for them to be considered related (aftershock grouping)
pub const DEFAULT_RELATED_TIME_DELTA_DAYS: i64 = 5;

/// Maximum distance in kilometers for two events to be considered related (aftershock grouping)
pub const DEFAULT_RELATED_DISTANCE_KM: f64 = 300.0;
