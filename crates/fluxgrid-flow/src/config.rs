//! Optimizer configuration.
//!
//! All knobs have defaults, so a zeroed-out config file (or none at all)
//! yields a working optimizer. The optional `config-loader` feature adds
//! JSON deserialization for drivers that read settings from disk.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::threshold::BandBoosts;

/// Tuning knobs for the flow optimizer. Fixed at construction; changing
/// behavior mid-run means building a new optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Connections processed per batch. A value of 0 is coerced to 1.
    pub batch_size: usize,
    /// How long a cached result stays valid, in milliseconds.
    pub cache_ttl_ms: u64,
    /// Optional cap on batches per cycle. When the cap cuts a cycle short
    /// the partial result is returned but never cached.
    pub max_batches_per_cycle: Option<usize>,
    /// Priority boosts applied per threshold band.
    pub band_boosts: BandBoosts,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            cache_ttl_ms: 500,
            max_batches_per_cycle: None,
            band_boosts: BandBoosts::default(),
        }
    }
}

impl FlowConfig {
    /// Batch size with the zero case coerced away.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Parse a config from JSON. Missing fields take their defaults;
    /// unknown resource or band names fail the parse rather than being
    /// silently dropped.
    #[cfg(feature = "config-loader")]
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
