//! Running statistics across fetches.

use serde::Serialize;
use tokio::time::Duration;

use super::types::{FetchError, ParsedEvents};

/// Number of integer magnitude buckets, 0 through 10.
pub const MAGNITUDE_BUCKETS: usize = 11;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedStats {
    pub calls: u64,
    pub total_duration: Duration,
    pub response_errors: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub malformed_documents: u64,
    pub skipped_features: u64,
    /// Events kept after parsing and the magnitude threshold.
    pub retrieved: u64,
    /// Kept events per truncated magnitude.
    pub magnitude_distribution: [u64; MAGNITUDE_BUCKETS],
}

impl FeedStats {
    pub fn record_call(&mut self, elapsed: Duration) {
        self.calls += 1;
        self.total_duration += elapsed;
    }

    pub fn record_error(&mut self, error: &FetchError) {
        match error {
            FetchError::Status(_) => self.response_errors += 1,
            FetchError::Timeout(_) => self.timeouts += 1,
            FetchError::InvalidUrl(_) | FetchError::Transport(_) => self.transport_errors += 1,
            FetchError::Malformed(_) => self.malformed_documents += 1,
        }
    }

    pub fn record_parsed(&mut self, parsed: &ParsedEvents) {
        self.skipped_features += parsed.skipped as u64;
        self.retrieved += parsed.events.len() as u64;
        for event in &parsed.events {
            if event.magnitude < 0.0 {
                continue;
            }
            let bucket = event.magnitude.trunc() as usize;
            if bucket < MAGNITUDE_BUCKETS {
                self.magnitude_distribution[bucket] += 1;
            }
        }
    }

    pub fn errors(&self) -> u64 {
        self.response_errors + self.timeouts + self.transport_errors + self.malformed_documents
    }

    pub fn average_duration(&self) -> Option<Duration> {
        if self.calls == 0 {
            return None;
        }
        let calls = u32::try_from(self.calls).unwrap_or(u32::MAX);
        Some(self.total_duration / calls)
    }
}
