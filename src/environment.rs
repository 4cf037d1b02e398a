use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::time::Duration;
use tracing::warn;

use crate::clustering::{RepresentativeOrder, DEFAULT_CLOSENESS_KM};
use crate::feed::{DEFAULT_FEED_URL, DEFAULT_MIN_MAGNITUDE, REQUEST_TIMEOUT};
use crate::geo::GeoPoint;
use crate::orchestrator::PipelineOptions;

pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(600);

/// Retrieves an environment variable and splits it into a vector of strings based on a delimiter.
///
/// # Arguments
/// - `var`: The name of the environment variable.
/// - `delimiter`: The character to split the environment variable's value by.
///
/// # Returns
/// - `Vec<String>`: Trimmed, non-empty parts
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses an environment variable, falling back to `default` when it is unset
/// or does not parse.
pub fn get_env_var_or<T>(var: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value {:?} for {}, using default {:?}", raw, var, default);
                default
            }
        },
        _ => default,
    }
}

/// A debug quake given as `lat,lon,mag`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InjectSpec {
    pub location: GeoPoint,
    pub magnitude: f64,
}

impl FromStr for InjectSpec {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (point, magnitude) = raw
            .rsplit_once(',')
            .ok_or_else(|| format!("expected lat,lon,mag, got {:?}", raw))?;
        let location = point.parse::<GeoPoint>().map_err(|e| e.to_string())?;
        let magnitude = magnitude
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid magnitude {:?}", magnitude))?;
        Ok(Self {
            location,
            magnitude,
        })
    }
}

/// Runtime configuration collected from `QUAKE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed_url: String,
    pub fetch_interval: Duration,
    pub request_timeout: Duration,
    pub pipeline: PipelineOptions,
    pub regions_path: Option<PathBuf>,
    pub inject: Vec<InjectSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            fetch_interval: DEFAULT_FETCH_INTERVAL,
            request_timeout: REQUEST_TIMEOUT,
            pipeline: PipelineOptions::default(),
            regions_path: None,
            inject: Vec::new(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let feed_url = env::var("QUAKE_FEED_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FEED_URL.to_string());

        let fetch_interval = Duration::from_secs(get_env_var_or(
            "QUAKE_FETCH_INTERVAL_SECS",
            DEFAULT_FETCH_INTERVAL.as_secs(),
        ));
        let request_timeout = Duration::from_secs(get_env_var_or(
            "QUAKE_REQUEST_TIMEOUT_SECS",
            REQUEST_TIMEOUT.as_secs(),
        ));

        let pipeline = PipelineOptions {
            min_magnitude: get_env_var_or("QUAKE_MIN_MAGNITUDE", DEFAULT_MIN_MAGNITUDE),
            closeness_km: get_env_var_or("QUAKE_CLOSENESS_KM", DEFAULT_CLOSENESS_KM),
            order: get_env_var_or("QUAKE_REPRESENTATIVE", RepresentativeOrder::default()),
        };

        let regions_path = env::var("QUAKE_REGIONS_PATH")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let inject = get_env_var_as_vec("QUAKE_INJECT", ';')
            .iter()
            .filter_map(|raw| match raw.parse::<InjectSpec>() {
                Ok(spec) => Some(spec),
                Err(err) => {
                    warn!("Ignoring QUAKE_INJECT entry: {}", err);
                    None
                }
            })
            .collect();

        Self {
            feed_url,
            fetch_interval: fetch_interval.max(Duration::from_secs(1)),
            request_timeout: request_timeout.max(Duration::from_secs(1)),
            pipeline,
            regions_path,
            inject,
        }
    }
}
