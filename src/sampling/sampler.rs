use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ConfigError, CountConfig, SampleConfig};
use crate::core::records::Sample;
use crate::counting::counter::{KmerCounter, KmerCounts};
use crate::sampling::SampleError;
use crate::store::contig_store::{ContigStore, Location};

/// Samples drawn by one call, with the seed that reproduces them
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleBatch {
    pub seed: u64,
    pub samples: Vec<Sample>,
}

/// A sample together with its k-mer counts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleProfile {
    pub sample: Sample,
    pub counts: KmerCounts,
}

/// Profiles drawn by one call, with the seed that reproduces them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileBatch {
    pub seed: u64,
    pub profiles: Vec<SampleProfile>,
}

/// Draws fixed-length windows uniformly over every valid start position in the
/// corpus.
///
/// A contig of length `n` offers `max(0, n - length + 1)` starts. The sampler
/// keeps a running total of those counts per eligible contig; a uniform draw
/// below the grand total picks a start, which is turned into a corpus-wide offset
/// and resolved with [`ContigStore::locate`]. Long contigs are therefore chosen in
/// proportion to the windows they hold, not once per contig.
#[derive(Debug)]
pub struct Sampler<'a> {
    store: &'a ContigStore,
    length: usize,
    config: SampleConfig,
    /// Corpus offset of each eligible contig's first base
    starts: Vec<usize>,
    /// Running total of valid window starts, one entry per eligible contig
    cumulative: Vec<u64>,
}

impl<'a> Sampler<'a> {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidSampleLength` for a zero length and
    /// `ConfigError::NoEligibleContig` if no contig holds a full window.
    pub fn new(
        store: &'a ContigStore,
        length: usize,
        config: SampleConfig,
    ) -> Result<Self, ConfigError> {
        if length == 0 {
            return Err(ConfigError::InvalidSampleLength(length));
        }

        let mut starts = Vec::new();
        let mut cumulative = Vec::new();
        let mut running = 0u64;
        let mut offset = 0usize;
        for contig in store.contigs() {
            let windows = contig.window_starts(length);
            if windows > 0 {
                running += windows as u64;
                starts.push(offset);
                cumulative.push(running);
            }
            offset += contig.len();
        }

        if cumulative.is_empty() {
            return Err(ConfigError::NoEligibleContig { length });
        }

        Ok(Self {
            store,
            length,
            config,
            starts,
            cumulative,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Number of valid window starts across the corpus
    pub fn valid_starts(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Draw one window start.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::Index` only if the store's offset index is inconsistent.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> Result<Location, SampleError> {
        let draw = rng.gen_range(0..self.valid_starts());
        let slot = self.cumulative.partition_point(|&end| end <= draw);
        let before = if slot == 0 { 0 } else { self.cumulative[slot - 1] };
        let global = self.starts[slot] + (draw - before) as usize;
        Ok(self.store.locate(global)?)
    }

    fn ambiguous_ok(&self, loc: &Location) -> Result<bool, SampleError> {
        let Some(limit) = self.config.max_ambiguous else {
            return Ok(true);
        };
        let contig = self.store.contig(loc.file_idx, loc.contig_idx)?;
        let ambiguous = contig
            .sequence
            .ambiguous_in(loc.local_offset, loc.local_offset + self.length);
        Ok(ambiguous <= limit)
    }

    /// Draw window positions from a seeded stream. Sequential, so the result does
    /// not depend on thread scheduling.
    fn draw_locations(&self, batch_size: usize, rng: &mut StdRng) -> Result<Vec<Location>, SampleError> {
        let mut locations = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let mut accepted = None;
            for _ in 0..self.config.max_attempts_per_sample {
                let loc = self.draw(rng)?;
                if self.ambiguous_ok(&loc)? {
                    accepted = Some(loc);
                    break;
                }
            }
            match accepted {
                Some(loc) => locations.push(loc),
                None => {
                    return Err(SampleError::Exhausted {
                        attempts: self.config.max_attempts_per_sample,
                    })
                }
            }
        }
        Ok(locations)
    }

    fn extract(&self, loc: &Location) -> Result<Sample, SampleError> {
        let bases = self
            .store
            .slice(loc.file_idx, loc.contig_idx, loc.local_offset, self.length)?;
        Ok(Sample {
            file_idx: loc.file_idx,
            contig_idx: loc.contig_idx,
            offset: loc.local_offset,
            length: self.length,
            bases,
        })
    }

    /// Draw `batch_size` windows.
    ///
    /// With `Some(seed)` the output is fully determined by the seed, the store and
    /// the arguments. With `None` a seed is taken from OS entropy and returned in
    /// the batch so the draw can be repeated.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::Exhausted` if an ambiguity filter rejects every
    /// attempt for some sample.
    pub fn sample(&self, batch_size: usize, seed: Option<u64>) -> Result<SampleBatch, SampleError> {
        let seed = seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let locations = self.draw_locations(batch_size, &mut rng)?;

        let samples = locations
            .par_iter()
            .map(|loc| self.extract(loc))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(seed, batch_size, length = self.length, "drew samples");
        Ok(SampleBatch { seed, samples })
    }

    /// Draw `batch_size` windows and count k-mers in each under `counting`.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::Config` for an invalid k or counting config, and any
    /// error from [`Sampler::sample`].
    pub fn sample_profiles(
        &self,
        batch_size: usize,
        seed: Option<u64>,
        ks: &[usize],
        counting: &CountConfig,
    ) -> Result<ProfileBatch, SampleError> {
        let counter = KmerCounter::new(ks, counting.clone())?;
        let batch = self.sample(batch_size, seed)?;

        let profiles = batch
            .samples
            .into_par_iter()
            .map(|sample| {
                let counts = counter.count_sequence(&sample.bases);
                SampleProfile { sample, counts }
            })
            .collect();

        Ok(ProfileBatch {
            seed: batch.seed,
            profiles,
        })
    }
}

impl ContigStore {
    /// Draw `batch_size` windows of `length` bases with the default sampling settings.
    ///
    /// # Errors
    ///
    /// Returns `SampleError::Config` if `length` is zero or no contig is at least
    /// `length` bases long.
    pub fn sample(
        &self,
        batch_size: usize,
        length: usize,
        seed: Option<u64>,
    ) -> Result<SampleBatch, SampleError> {
        self.sample_with_config(batch_size, length, seed, &SampleConfig::default())
    }

    /// # Errors
    ///
    /// Returns `SampleError::Config` for an invalid length and
    /// `SampleError::Exhausted` if the ambiguity filter cannot be satisfied.
    pub fn sample_with_config(
        &self,
        batch_size: usize,
        length: usize,
        seed: Option<u64>,
        config: &SampleConfig,
    ) -> Result<SampleBatch, SampleError> {
        let sampler = Sampler::new(self, length, config.clone())?;
        let batch = sampler.sample(batch_size, seed)?;
        info!(
            seed = batch.seed,
            samples = batch.samples.len(),
            length,
            "sampled windows"
        );
        Ok(batch)
    }
}
