use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{run_in_pool, ConfigError, CountConfig, EngineConfig};
use crate::core::alphabet::encode_base;
use crate::core::records::ContigRecord;
use crate::counting::table::{Distribution, KmerTable};
use crate::counting::CountError;
use crate::store::contig_store::ContigStore;
use crate::store::loader::load_with_config;

/// Cooperative cancellation flag, checked before each contig is scanned.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// What was counted and what was excluded for one k
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountDiagnostics {
    pub k: usize,
    /// Windows counted; equals the table total
    pub valid_windows: u64,
    /// Windows inside a contig rejected for holding an ambiguous symbol
    pub ambiguous_windows: u64,
    /// Contigs too short to hold a single window
    pub short_contigs: u64,
    /// Ambiguous symbols seen while scanning
    pub ambiguous_bases: u64,
}

impl CountDiagnostics {
    fn merge(&mut self, other: &Self) {
        self.valid_windows += other.valid_windows;
        self.ambiguous_windows += other.ambiguous_windows;
        self.short_contigs += other.short_contigs;
        self.ambiguous_bases += other.ambiguous_bases;
    }
}

/// Results of one counting run, keyed by k
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KmerCounts {
    tables: BTreeMap<usize, KmerTable>,
    diagnostics: BTreeMap<usize, CountDiagnostics>,
}

impl KmerCounts {
    pub fn get(&self, k: usize) -> Option<&KmerTable> {
        self.tables.get(&k)
    }

    pub fn diagnostics(&self, k: usize) -> Option<&CountDiagnostics> {
        self.diagnostics.get(&k)
    }

    pub fn ks(&self) -> impl Iterator<Item = usize> + '_ {
        self.tables.keys().copied()
    }

    pub fn tables(&self) -> &BTreeMap<usize, KmerTable> {
        &self.tables
    }

    /// Normalized distribution for every k
    pub fn distributions(&self) -> BTreeMap<usize, Distribution> {
        self.tables
            .iter()
            .map(|(&k, table)| (k, table.distribution()))
            .collect()
    }

    pub fn into_tables(self) -> BTreeMap<usize, KmerTable> {
        self.tables
    }
}

/// K-mer profile of a single contig
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContigCounts {
    pub file_idx: usize,
    pub contig_idx: usize,
    pub name: String,
    pub length: usize,
    pub counts: KmerCounts,
}

/// Per-worker accumulator, one table per requested k
struct Partial {
    tables: Vec<KmerTable>,
    diagnostics: Vec<CountDiagnostics>,
}

impl Partial {
    fn merge(mut self, other: Self) -> Result<Self, CountError> {
        for (a, b) in self.tables.iter_mut().zip(&other.tables) {
            a.merge(b)?;
        }
        for (a, b) in self.diagnostics.iter_mut().zip(&other.diagnostics) {
            a.merge(b);
        }
        Ok(self)
    }
}

/// Counts k-mers for a fixed set of k values.
///
/// Every contig is scanned once, left to right, for all k at the same time. A
/// rolling 2-bit code of the most recent bases is kept together with the length
/// of the current run of unambiguous bases; a window of length k is counted when
/// that run is at least k. An ambiguous symbol resets the run, so no window
/// containing it is counted and k-1 further valid bases are needed before
/// counting resumes. Windows never span two contigs.
#[derive(Debug, Clone)]
pub struct KmerCounter {
    ks: Vec<usize>,
    config: CountConfig,
    cancel: Option<CancellationToken>,
}

impl KmerCounter {
    /// # Errors
    ///
    /// Returns `ConfigError` if `ks` is empty or holds a k of zero or above `max_k`.
    pub fn new(ks: &[usize], config: CountConfig) -> Result<Self, ConfigError> {
        config.check_ks(ks)?;
        let mut ks = ks.to_vec();
        ks.sort_unstable();
        ks.dedup();
        Ok(Self {
            ks,
            config,
            cancel: None,
        })
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Requested k values, ascending
    pub fn ks(&self) -> &[usize] {
        &self.ks
    }

    fn empty_partial(&self) -> Partial {
        self.partial_with(|k| self.config.is_dense(k))
    }

    /// Partial for one contig of `len` bases; dense only where the k-mer space
    /// fits within the contig
    fn contig_partial(&self, len: usize) -> Partial {
        let alphabet = self.config.alphabet;
        self.partial_with(|k| self.config.is_dense(k) && alphabet.space(k) <= len as u64)
    }

    fn partial_with(&self, dense: impl Fn(usize) -> bool) -> Partial {
        let alphabet = self.config.alphabet;
        Partial {
            tables: self
                .ks
                .iter()
                .map(|&k| KmerTable::new(alphabet, k, dense(k)))
                .collect(),
            diagnostics: self
                .ks
                .iter()
                .map(|&k| CountDiagnostics {
                    k,
                    ..CountDiagnostics::default()
                })
                .collect(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Scan one sequence given as 2-bit nucleotide codes (`None` = ambiguous)
    /// into `acc`, mapped into the configured alphabet.
    fn scan<I>(&self, acc: &mut Partial, codes: I)
    where
        I: Iterator<Item = Option<u8>>,
    {
        let alphabet = self.config.alphabet;
        let bits = alphabet.bits();
        let mut code = 0u64;
        let mut run = 0usize;
        let mut len = 0u64;
        let mut ambiguous = 0u64;
        let mut valid = vec![0u64; self.ks.len()];

        for symbol in codes {
            len += 1;
            match symbol {
                Some(base) => {
                    code = (code << bits) | u64::from(alphabet.from_nucleotide(base));
                    run += 1;
                    for (i, &k) in self.ks.iter().enumerate() {
                        if run < k {
                            break;
                        }
                        acc.tables[i].increment(code & alphabet.mask(k));
                        valid[i] += 1;
                    }
                }
                None => {
                    run = 0;
                    ambiguous += 1;
                }
            }
        }

        for (i, &k) in self.ks.iter().enumerate() {
            let diag = &mut acc.diagnostics[i];
            let possible = (len + 1).saturating_sub(k as u64);
            diag.valid_windows += valid[i];
            diag.ambiguous_windows += possible - valid[i];
            diag.ambiguous_bases += ambiguous;
            if possible == 0 {
                diag.short_contigs += 1;
            }
        }
    }

    fn finish(&self, partial: Partial) -> KmerCounts {
        KmerCounts {
            tables: partial
                .tables
                .into_iter()
                .map(|t| (t.k(), t))
                .collect(),
            diagnostics: partial
                .diagnostics
                .into_iter()
                .map(|d| (d.k, d))
                .collect(),
        }
    }

    /// Count every contig in the store.
    ///
    /// Contigs are distributed over rayon workers; each worker accumulates its own
    /// tables and the partial tables are summed at the end, so the result is the
    /// same whatever order contigs are processed in.
    ///
    /// # Errors
    ///
    /// Returns `CountError::Cancelled` if the token is cancelled before all
    /// contigs are scanned, or `CountError::Config` if a thread pool cannot be built.
    pub fn count(&self, store: &ContigStore) -> Result<KmerCounts, CountError> {
        debug!(ks = ?self.ks, contigs = store.contig_total(), "counting k-mers");

        let partial = run_in_pool(self.config.threads, || {
            store
                .contigs()
                .par_iter()
                .try_fold(
                    || self.empty_partial(),
                    |mut acc, contig: &ContigRecord| {
                        if self.is_cancelled() {
                            return Err(CountError::Cancelled);
                        }
                        self.scan(&mut acc, contig.sequence.codes());
                        Ok(acc)
                    },
                )
                .try_reduce(|| self.empty_partial(), Partial::merge)
        })??;

        let counts = self.finish(partial);
        for diag in counts.diagnostics.values() {
            info!(
                k = diag.k,
                valid = diag.valid_windows,
                ambiguous = diag.ambiguous_windows,
                "counted k-mers"
            );
        }
        Ok(counts)
    }

    /// Count every contig separately, returned in (file, contig) order.
    ///
    /// # Errors
    ///
    /// Same as [`count`](Self::count).
    pub fn count_per_contig(&self, store: &ContigStore) -> Result<Vec<ContigCounts>, CountError> {
        debug!(ks = ?self.ks, contigs = store.contig_total(), "counting k-mers per contig");

        let profiles = run_in_pool(self.config.threads, || {
            store
                .contigs()
                .par_iter()
                .map(|contig| {
                    if self.is_cancelled() {
                        return Err(CountError::Cancelled);
                    }
                    let mut acc = self.contig_partial(contig.len());
                    self.scan(&mut acc, contig.sequence.codes());
                    Ok(ContigCounts {
                        file_idx: contig.file_idx,
                        contig_idx: contig.contig_idx,
                        name: contig.name.clone(),
                        length: contig.len(),
                        counts: self.finish(acc),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })??;

        info!(contigs = profiles.len(), "counted per-contig profiles");
        Ok(profiles)
    }

    /// Count a single in-memory sequence. Case is ignored; non-ACGT symbols are ambiguous.
    pub fn count_sequence(&self, sequence: &[u8]) -> KmerCounts {
        let mut acc = self.empty_partial();
        self.scan(&mut acc, sequence.iter().map(|&b| encode_base(b)));
        self.finish(acc)
    }
}

/// Count k-mers over a store with the default configuration.
///
/// # Errors
///
/// Returns `CountError::Config` for an invalid k.
pub fn count_kmers(store: &ContigStore, ks: &[usize]) -> Result<KmerCounts, CountError> {
    count_kmers_with_config(store, ks, &CountConfig::default())
}

/// # Errors
///
/// Returns `CountError::Config` for an invalid k or thread count.
pub fn count_kmers_with_config(
    store: &ContigStore,
    ks: &[usize],
    config: &CountConfig,
) -> Result<KmerCounts, CountError> {
    KmerCounter::new(ks, config.clone())?.count(store)
}

/// Count a single sequence with the default configuration.
///
/// # Errors
///
/// Returns `CountError::Config` for an invalid k.
pub fn count_sequence(sequence: &[u8], ks: &[usize]) -> Result<KmerCounts, CountError> {
    Ok(KmerCounter::new(ks, CountConfig::default())?.count_sequence(sequence))
}

/// Load files and count them in one step.
///
/// The k values are checked before any file is read.
///
/// # Errors
///
/// Returns `CountError::Config` for an invalid k and `CountError::Load` if
/// ingestion fails.
pub fn count_kmers_in_files<P: AsRef<Path> + Sync>(
    paths: &[P],
    ks: &[usize],
    config: &EngineConfig,
) -> Result<KmerCounts, CountError> {
    let counter = KmerCounter::new(ks, config.counting.clone())?;
    let store = load_with_config(paths, &config.ingest)?;
    counter.count(&store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::alphabet::{kmer_index, Alphabet};

    fn counter(ks: &[usize]) -> KmerCounter {
        KmerCounter::new(ks, CountConfig::default()).unwrap()
    }

    #[test]
    fn test_single_base_counts() {
        let store = ContigStore::from_sequences([vec!["ACGT", "ACGTACGT"]]);
        let counts = counter(&[1]).count(&store).unwrap();
        let table = counts.get(1).unwrap();
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![3, 3, 3, 3]);
        assert_eq!(table.total(), 12);
    }

    #[test]
    fn test_ambiguous_symbol_breaks_windows() {
        let counts = counter(&[2]).count_sequence(b"ACGTN");
        let table = counts.get(2).unwrap();
        assert_eq!(table.get_kmer(b"AC"), Some(1));
        assert_eq!(table.get_kmer(b"CG"), Some(1));
        assert_eq!(table.get_kmer(b"GT"), Some(1));
        assert_eq!(table.total(), 3);

        let diag = counts.diagnostics(2).unwrap();
        assert_eq!(diag.valid_windows, 3);
        assert_eq!(diag.ambiguous_windows, 1);
        assert_eq!(diag.ambiguous_bases, 1);
    }

    #[test]
    fn test_run_restarts_after_ambiguous() {
        let counts = counter(&[3]).count_sequence(b"ACNGTAC");
        let table = counts.get(3).unwrap();
        // Only GTA and TAC are fully unambiguous
        assert_eq!(table.total(), 2);
        assert_eq!(table.get_kmer(b"GTA"), Some(1));
        assert_eq!(table.get_kmer(b"TAC"), Some(1));
        assert_eq!(counts.diagnostics(3).unwrap().ambiguous_windows, 3);
    }

    #[test]
    fn test_windows_do_not_cross_contigs() {
        let store = ContigStore::from_sequences([vec!["AC"], vec!["GT"]]);
        let counts = counter(&[2, 3]).count(&store).unwrap();
        assert_eq!(counts.get(2).unwrap().total(), 2);
        assert_eq!(counts.get(2).unwrap().get_kmer(b"CG"), Some(0));
        assert_eq!(counts.get(3).unwrap().total(), 0);
        assert_eq!(counts.diagnostics(3).unwrap().short_contigs, 2);
    }

    #[test]
    fn test_multiple_k_single_pass_matches_separate_runs() {
        let store = ContigStore::from_sequences([vec!["ACGGTCANTTGACCA", "GGGACTTA"]]);
        let together = counter(&[1, 2, 5]).count(&store).unwrap();
        for k in [1, 2, 5] {
            let alone = counter(&[k]).count(&store).unwrap();
            assert_eq!(together.get(k), alone.get(k));
        }
    }

    #[test]
    fn test_total_matches_window_formula() {
        let contigs = ["ACGTTGCA", "GGCATTAC", "ACG", "TTTTTTTTTTTT"];
        let store = ContigStore::from_sequences([contigs.to_vec()]);
        let counts = counter(&[1, 2, 3]).count(&store).unwrap();
        let total_len: u64 = contigs.iter().map(|c| c.len() as u64).sum();
        for k in [1u64, 2, 3] {
            let expected = total_len - (k - 1) * contigs.len() as u64;
            assert_eq!(counts.get(k as usize).unwrap().total(), expected);
        }
    }

    #[test]
    fn test_sparse_matches_dense() {
        let store = ContigStore::from_sequences([vec!["ACGTTGCAAGGCTTACGATNACGT"]]);
        let dense = counter(&[4]).count(&store).unwrap();
        let sparse_config = CountConfig {
            dense_max_k: 3,
            ..CountConfig::default()
        };
        let sparse = KmerCounter::new(&[4], sparse_config)
            .unwrap()
            .count(&store)
            .unwrap();
        assert!(!sparse.get(4).unwrap().is_dense());
        assert_eq!(
            dense.get(4).unwrap().iter().collect::<Vec<_>>(),
            sparse.get(4).unwrap().iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_large_k_is_sparse() {
        let seq = "ACGTTGCAAGGCTTACGATTACGGATCCAGTACGATGCA";
        let counts = counter(&[25]).count_sequence(seq.as_bytes());
        let table = counts.get(25).unwrap();
        assert!(!table.is_dense());
        assert_eq!(table.total(), (seq.len() - 24) as u64);
        let first = kmer_index(&seq.as_bytes()[..25]).unwrap();
        assert_eq!(table.get(first), 1);
    }

    #[test]
    fn test_invalid_k_rejected() {
        let store = ContigStore::from_sequences([vec!["ACGT"]]);
        assert!(matches!(
            count_kmers(&store, &[0]),
            Err(CountError::Config(ConfigError::InvalidK { k: 0, .. }))
        ));
        assert!(matches!(
            count_kmers(&store, &[32]),
            Err(CountError::Config(ConfigError::InvalidK { k: 32, .. }))
        ));
    }

    #[test]
    fn test_cancellation() {
        let store = ContigStore::from_sequences([vec!["ACGT"; 64]]);
        let token = CancellationToken::new();
        token.cancel();
        let result = counter(&[2]).with_cancellation(token).count(&store);
        assert!(matches!(result, Err(CountError::Cancelled)));
    }

    #[test]
    fn test_per_contig_matches_single_sequence_counts() {
        let store = ContigStore::from_sequences([
            vec!["ACGTTGCAAGGCTTAC", "GGNNACGTA"],
            vec!["TTTTACGGGACGTTAGCCATGCAAGT", "AC"],
        ]);
        let counter = counter(&[1, 2, 4]);
        let profiles = counter.count_per_contig(&store).unwrap();

        let order: Vec<_> = profiles.iter().map(|p| (p.file_idx, p.contig_idx)).collect();
        assert_eq!(order, [(0, 0), (0, 1), (1, 0), (1, 1)]);
        for profile in &profiles {
            let bases = store.get(profile.file_idx, profile.contig_idx).unwrap();
            assert_eq!(profile.length, bases.len());
            assert_eq!(profile.counts, counter.count_sequence(&bases));
        }
    }

    #[test]
    fn test_per_contig_tables_sum_to_store_counts() {
        let store = ContigStore::from_sequences([vec!["ACGGTCANTTGACCA", "GGGACTTA"], vec!["CATCAT"]]);
        let counter = counter(&[3]);
        let whole = counter.count(&store).unwrap();

        let mut summed = KmerTable::dense(3);
        for profile in counter.count_per_contig(&store).unwrap() {
            // 64 possible 3-mers never fit in these short contigs
            assert!(!profile.counts.get(3).unwrap().is_dense());
            summed.merge(profile.counts.get(3).unwrap()).unwrap();
        }
        assert_eq!(&summed, whole.get(3).unwrap());
    }

    #[test]
    fn test_per_contig_cancellation() {
        let store = ContigStore::from_sequences([vec!["ACGT"; 16]]);
        let token = CancellationToken::new();
        token.cancel();
        let result = counter(&[2]).with_cancellation(token).count_per_contig(&store);
        assert!(matches!(result, Err(CountError::Cancelled)));
    }

    #[test]
    fn test_ry_counting() {
        let config = CountConfig {
            alphabet: Alphabet::Ry,
            ..CountConfig::default()
        };
        let counter = KmerCounter::new(&[1, 3], config).unwrap();
        let store = ContigStore::from_sequences([vec!["AGCTNTTA"]]);
        let counts = counter.count(&store).unwrap();

        let mono = counts.get(1).unwrap();
        assert_eq!(mono.alphabet(), Alphabet::Ry);
        assert_eq!(mono.len(), 2);
        // R: A G A, Y: C T T T
        assert_eq!(mono.iter().collect::<Vec<_>>(), vec![3, 4]);

        // AGC, GCT and TTA survive the N; they read RRY, RYY and YYR
        let tri = counts.get(3).unwrap();
        assert_eq!(tri.total(), 3);
        assert_eq!(tri.get_kmer(b"AGC"), Some(1));
        assert_eq!(tri.get_kmer(b"GCT"), Some(1));
        assert_eq!(tri.get_kmer(b"TTA"), Some(1));
        assert_eq!(tri.get(0b001), 1);
        assert_eq!(tri.get(0b011), 1);
        assert_eq!(tri.get(0b110), 1);
        assert_eq!(counts, counter.count_sequence(b"agctnTTA"));
    }

    #[test]
    fn test_empty_store_reports_zero_tables() {
        let store = ContigStore::from_sequences(Vec::<Vec<&str>>::new());
        let counts = count_kmers(&store, &[2]).unwrap();
        let table = counts.get(2).unwrap();
        assert_eq!(table.total(), 0);
        assert_eq!(counts.distributions()[&2].sum(), 0.0);
    }
}
