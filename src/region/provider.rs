use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::codec::decode_regions;
use super::types::Region;
use crate::TARGET_PIPELINE;

/// Source of region configuration, read fresh at every filter pass.
pub trait RegionProvider: Send + Sync {
    fn regions(&self) -> Vec<Region>;
}

impl RegionProvider for Vec<Region> {
    fn regions(&self) -> Vec<Region> {
        self.clone()
    }
}

impl<P: RegionProvider + ?Sized> RegionProvider for Box<P> {
    fn regions(&self) -> Vec<Region> {
        (**self).regions()
    }
}

/// Regions persisted one per line in a text file.
#[derive(Debug, Clone)]
pub struct RegionFile {
    path: PathBuf,
}

impl RegionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the file. Undecodable lines are dropped.
    pub fn load(&self) -> Result<Vec<Region>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read region file {}", self.path.display()))?;
        Ok(decode_regions(&text))
    }
}

impl RegionProvider for RegionFile {
    /// A missing or unreadable file yields no regions, which leaves only the
    /// default fallback.
    fn regions(&self) -> Vec<Region> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => decode_regions(&text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(target: TARGET_PIPELINE, "Region file {} not found", self.path.display());
                Vec::new()
            }
            Err(err) => {
                warn!(target: TARGET_PIPELINE, "Failed to read region file {}: {}", self.path.display(), err);
                Vec::new()
            }
        }
    }
}
