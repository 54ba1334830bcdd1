//! Engine configuration.
//!
//! All settings have defaults; a configuration can also be read from JSON where
//! any omitted field keeps its default:
//!
//! ```json
//! {
//!   "ingest": { "policy": "skip_and_warn", "min_contig_len": 1000 },
//!   "counting": { "max_k": 16, "dense_max_k": 10, "alphabet": "nucleotide" },
//!   "sampling": { "max_ambiguous": 100 }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::alphabet::{Alphabet, MAX_SUPPORTED_K};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid k = {k}: must be between 1 and {max}")]
    InvalidK { k: usize, max: usize },

    #[error("Dense tables above k = {max} are not allowed (dense_max_k = {dense_max_k})")]
    DenseLimit { dense_max_k: usize, max: usize },

    #[error("No k values requested")]
    NoKValues,

    #[error("Invalid sample length {0}: must be positive")]
    InvalidSampleLength(usize),

    #[error("No contig is at least {length} bases long")]
    NoEligibleContig { length: usize },

    #[error("Invalid thread count {0}: must be positive")]
    InvalidThreads(usize),

    #[error("Invalid setting: {0}")]
    Invalid(String),

    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What to do when one input file fails to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole load on the first failing file
    #[default]
    Abort,
    /// Log a warning, keep the file index with no contigs, and continue
    SkipAndWarn,
}

/// Ingestion settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub policy: FailurePolicy,

    /// Records shorter than this are not stored. Contig indices count retained records.
    pub min_contig_len: usize,

    /// Worker threads for parsing; `None` uses the global rayon pool
    pub threads: Option<usize>,
}

/// Default largest k that may be requested
pub const DEFAULT_MAX_K: usize = MAX_SUPPORTED_K;

/// Default largest k held in a dense table (4^10 counters = 8 MiB)
pub const DEFAULT_DENSE_MAX_K: usize = 10;

/// Counting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountConfig {
    /// Largest k accepted by `count`
    pub max_k: usize,

    /// Tables for k above this are stored sparsely
    pub dense_max_k: usize,

    /// Worker threads for counting; `None` uses the global rayon pool
    pub threads: Option<usize>,

    /// Symbols k-mers are counted over
    pub alphabet: Alphabet,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            max_k: DEFAULT_MAX_K,
            dense_max_k: DEFAULT_DENSE_MAX_K,
            threads: None,
            alphabet: Alphabet::Nucleotide,
        }
    }
}

impl CountConfig {
    /// Check a requested set of k values before any scan begins.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoKValues` for an empty set,
    /// `ConfigError::InvalidK` for zero or anything above `max_k`, and any error
    /// from [`CountConfig::validate`].
    pub fn check_ks(&self, ks: &[usize]) -> Result<(), ConfigError> {
        self.validate()?;
        if ks.is_empty() {
            return Err(ConfigError::NoKValues);
        }
        let max = self.max_k.min(MAX_SUPPORTED_K);
        match ks.iter().find(|&&k| k == 0 || k > max) {
            Some(&k) => Err(ConfigError::InvalidK { k, max }),
            None => Ok(()),
        }
    }

    pub fn is_dense(&self, k: usize) -> bool {
        k <= self.dense_max_k
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidK` if `max_k` is out of range and
    /// `ConfigError::DenseLimit` if `dense_max_k` would allow a dense table
    /// larger than the alphabet's [`max_dense_k`](Alphabet::max_dense_k).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_k == 0 || self.max_k > MAX_SUPPORTED_K {
            return Err(ConfigError::InvalidK {
                k: self.max_k,
                max: MAX_SUPPORTED_K,
            });
        }
        let max = self.alphabet.max_dense_k();
        if self.dense_max_k > max {
            return Err(ConfigError::DenseLimit {
                dense_max_k: self.dense_max_k,
                max,
            });
        }
        if self.threads == Some(0) {
            return Err(ConfigError::InvalidThreads(0));
        }
        Ok(())
    }
}

/// Default number of redraws allowed per sample under an ambiguity filter
pub const DEFAULT_MAX_ATTEMPTS_PER_SAMPLE: usize = 100;

/// Sampling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    /// Redraw windows holding more ambiguous symbols than this
    pub max_ambiguous: Option<usize>,

    pub max_attempts_per_sample: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            max_ambiguous: None,
            max_attempts_per_sample: DEFAULT_MAX_ATTEMPTS_PER_SAMPLE,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ingest: IngestConfig,
    pub counting: CountConfig,
    pub sampling: SampleConfig,
}

impl EngineConfig {
    /// Load configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, `ConfigError::Parse`
    /// for invalid JSON, or any error from [`EngineConfig::validate`].
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for invalid JSON or any error from
    /// [`EngineConfig::validate`].
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings for internal consistency
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidThreads` for a zero thread count,
    /// `ConfigError::InvalidK` or `ConfigError::DenseLimit` for counting limits
    /// out of range, or `ConfigError::Invalid` for a zero attempt budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.threads == Some(0) {
            return Err(ConfigError::InvalidThreads(0));
        }
        self.counting.validate()?;
        if self.sampling.max_attempts_per_sample == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts_per_sample must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Build a dedicated rayon pool when a thread count is configured.
pub(crate) fn thread_pool(threads: Option<usize>) -> Result<Option<rayon::ThreadPool>, ConfigError> {
    match threads {
        None => Ok(None),
        Some(0) => Err(ConfigError::InvalidThreads(0)),
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map(Some)
            .map_err(|e| ConfigError::Invalid(format!("failed to build thread pool: {e}"))),
    }
}

/// Run `op` on the configured pool, or on the current one.
pub(crate) fn run_in_pool<R, F>(threads: Option<usize>, op: F) -> Result<R, ConfigError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    Ok(match thread_pool(threads)? {
        Some(pool) => pool.install(op),
        None => op(),
    })
}
