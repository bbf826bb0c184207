//! Writer configuration.
//!
//! ```json
//! { "kag_size": 512, "partition_frames": 250, "index_placement": "following_partition" }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::label::{labels, Label};

/// Where explicit index segments are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPlacement {
    /// Everything in the footer partition.
    #[default]
    Footer,
    /// Each closed body partition's segment at the head of the next body
    /// partition (the last one in the footer).
    FollowingPartition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationalPattern {
    #[default]
    Op1a,
}

impl OperationalPattern {
    pub fn label(self) -> Label {
        match self {
            OperationalPattern::Op1a => labels::OP1A,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Key alignment grid; 1 disables fill.
    pub kag_size: u32,
    /// Frames per body partition; `None` keeps every frame in one.
    pub partition_frames: Option<u32>,
    pub index_placement: IndexPlacement,
    pub operational_pattern: OperationalPattern,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            kag_size: 1,
            partition_frames: None,
            index_placement: IndexPlacement::Footer,
            operational_pattern: OperationalPattern::Op1a,
        }
    }
}

impl WriterConfig {
    pub fn with_kag(mut self, kag_size: u32) -> Self {
        self.kag_size = kag_size;
        self
    }

    pub fn with_partition_frames(mut self, frames: u32, placement: IndexPlacement) -> Self {
        self.partition_frames = Some(frames);
        self.index_placement = placement;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.kag_size == 0 {
            return Err(Error::state("KAG size must be at least 1"));
        }
        if self.partition_frames == Some(0) {
            return Err(Error::state("partition_frames must be at least 1"));
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| Error::state(format!("invalid writer config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}
