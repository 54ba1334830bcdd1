//! Engine lifecycle.
//!
//! ```text
//! Empty --load--> Loading --ok--> Ready
//!                         \-err-> Failed
//! ```
//!
//! `Ready` and `Failed` are terminal. A failed engine is never repaired: build a
//! new one. A ready engine hands out a shared, immutable store that any number of
//! threads may count or sample from concurrently.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::counting::counter::{ContigCounts, KmerCounter, KmerCounts};
use crate::counting::CountError;
use crate::sampling::sampler::{ProfileBatch, SampleBatch, Sampler};
use crate::sampling::SampleError;
use crate::store::contig_store::ContigStore;
use crate::store::loader::{load_with_config, LoadError};

/// Observable engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Empty,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug)]
enum State {
    Empty,
    Loading,
    Ready(Arc<ContigStore>),
    Failed(String),
}

/// Owns the configuration and, once loaded, the contig store
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    state: State,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: State::Empty,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        match self.state {
            State::Empty => EngineState::Empty,
            State::Loading => EngineState::Loading,
            State::Ready(_) => EngineState::Ready,
            State::Failed(_) => EngineState::Failed,
        }
    }

    /// The store, if the engine is ready
    pub fn store(&self) -> Option<&Arc<ContigStore>> {
        match &self.state {
            State::Ready(store) => Some(store),
            _ => None,
        }
    }

    /// Error text of the load that failed, if any
    pub fn failure(&self) -> Option<&str> {
        match &self.state {
            State::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Ingest `paths`. Only valid on an empty engine.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidState` if the engine is not empty, or the
    /// ingestion error that moved it to `Failed`.
    pub fn load<P: AsRef<Path> + Sync>(
        &mut self,
        paths: &[P],
    ) -> Result<Arc<ContigStore>, LoadError> {
        if !matches!(self.state, State::Empty) {
            return Err(LoadError::InvalidState(format!(
                "load requires an empty engine, found {:?}",
                self.state()
            )));
        }

        self.state = State::Loading;
        debug!(files = paths.len(), "engine loading");

        let loaded = self
            .config
            .validate()
            .map_err(LoadError::from)
            .and_then(|()| load_with_config(paths, &self.config.ingest));

        match loaded {
            Ok(store) => {
                let store = Arc::new(store);
                self.state = State::Ready(Arc::clone(&store));
                Ok(store)
            }
            Err(e) => {
                warn!(error = %e, "engine load failed");
                self.state = State::Failed(e.to_string());
                Err(e)
            }
        }
    }

    fn ready_store(&self) -> Result<&ContigStore, crate::config::ConfigError> {
        self.store().map(AsRef::as_ref).ok_or_else(|| {
            crate::config::ConfigError::Invalid(format!(
                "engine is not ready (state {:?})",
                self.state()
            ))
        })
    }

    /// Count k-mers with the engine's counting configuration.
    ///
    /// # Errors
    ///
    /// Returns `CountError::Config` if the engine is not ready or a k is invalid.
    pub fn count(&self, ks: &[usize]) -> Result<KmerCounts, CountError> {
        let store = self.ready_store()?;
        KmerCounter::new(ks, self.config.counting.clone())?.count(store)
    }

    /// Per-contig profiles with the engine's counting configuration.
    ///
    /// # Errors
    ///
    /// Returns `CountError::Config` if the engine is not ready or a k is invalid.
    pub fn count_per_contig(&self, ks: &[usize]) -> Result<Vec<ContigCounts>, CountError> {
        let store = self.ready_store()?;
        KmerCounter::new(ks, self.config.counting.clone())?.count_per_contig(store)
    }

    /// Draw samples with the engine's sampling configuration.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::Config` if the engine is not ready or the length is
    /// invalid for the loaded corpus.
    pub fn sample(
        &self,
        batch_size: usize,
        length: usize,
        seed: Option<u64>,
    ) -> Result<SampleBatch, SampleError> {
        self.ready_store()?
            .sample_with_config(batch_size, length, seed, &self.config.sampling)
    }

    /// Draw samples and profile each one, using both the sampling and the
    /// counting configuration.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::Config` if the engine is not ready or an argument is
    /// invalid.
    pub fn sample_profiles(
        &self,
        batch_size: usize,
        length: usize,
        seed: Option<u64>,
        ks: &[usize],
    ) -> Result<ProfileBatch, SampleError> {
        let store = self.ready_store()?;
        Sampler::new(store, length, self.config.sampling.clone())?.sample_profiles(
            batch_size,
            seed,
            ks,
            &self.config.counting,
        )
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
