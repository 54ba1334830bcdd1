//! # contig-kmers
//!
//! A library for holding genome assemblies in memory and measuring their
//! sequence composition.
//!
//! Many FASTA files (plain or gzip-compressed) are ingested in parallel into a
//! single read-only [`ContigStore`]. Bases are packed at two bits each, with
//! ambiguous symbols such as `N` kept in a side table, so whole assemblies fit
//! comfortably in memory. Contigs are addressed by `(file_idx, contig_idx)` in
//! input order.
//!
//! ## Features
//!
//! - **Exact k-mer counting**: one pass over the corpus for any set of k, with
//!   windows spanning an ambiguous base skipped
//! - **Per-contig profiles**: the same counts for each contig on its own
//! - **Derived tables**: probability distributions, reverse-complement folded
//!   tables, quotient profiles and order-(k-1) Markov conditionals, over
//!   nucleotides or the purine/pyrimidine (RY) alphabet
//! - **Reproducible sampling**: fixed-length windows drawn uniformly over every
//!   valid start position, reproducible from a seed
//! - **Bin export**: write clustered contigs back out as FASTA
//!
//! ## Example
//!
//! ```rust,no_run
//! use contig_kmers::{count_kmers, load};
//!
//! let store = load(&["sample1.fa.gz", "sample2.fa"]).unwrap();
//! println!("{} contigs, {} bases", store.contig_total(), store.total_length());
//!
//! let counts = count_kmers(&store, &[1, 4]).unwrap();
//! let mono = counts.get(1).unwrap();
//! assert_eq!(mono.total() + counts.diagnostics(1).unwrap().ambiguous_windows, store.total_length() as u64);
//!
//! let batch = store.sample(100, 1_000, Some(7)).unwrap();
//! println!("seed {} -> {} windows", batch.seed, batch.samples.len());
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Alphabet, packed sequences and record types
//! - [`parsing`]: Streaming FASTA reader
//! - [`store`]: The contig store and parallel loader
//! - [`engine`]: Load lifecycle around a store
//! - [`counting`]: K-mer tables and counters
//! - [`sampling`]: Seeded window sampling
//! - [`export`]: FASTA bin writer
//! - [`config`]: Engine configuration

pub mod config;
pub mod core;
pub mod counting;
pub mod engine;
pub mod export;
pub mod parsing;
pub mod sampling;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use core::alphabet::Alphabet;
pub use core::records::{ContigRecord, FileRecord, Sample};
pub use counting::counter::{
    count_kmers, count_sequence, CancellationToken, ContigCounts, KmerCounter, KmerCounts,
};
pub use counting::table::KmerTable;
pub use counting::CountError;
pub use engine::{Engine, EngineState};
pub use sampling::sampler::{ProfileBatch, SampleBatch, Sampler};
pub use sampling::SampleError;
pub use store::contig_store::ContigStore;
pub use store::loader::{load, LoadError};
