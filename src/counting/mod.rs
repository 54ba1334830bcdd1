//! Exact k-mer counting.
//!
//! [`KmerCounter`](counter::KmerCounter) scans a [`ContigStore`] once for any
//! number of k values and returns one [`KmerTable`](table::KmerTable) per k. A
//! table is indexed by the canonical k-mer index (bases ordered `A < C < G < T`,
//! first base most significant), so entry `i` of the 1-mer table is the count of
//! `BASES[i]`.
//!
//! Tables up to `dense_max_k` are dense vectors of `4^k` counters; larger k use a
//! sparse index -> count map with the same lookup interface.
//!
//! Counting can instead run over the 2-letter purine/pyrimidine alphabet
//! ([`Alphabet::Ry`](crate::core::alphabet::Alphabet::Ry)) by setting
//! `CountConfig::alphabet`. [`CanonicalTable::quotient`](derived::CanonicalTable::quotient)
//! turns folded tables at k and k-1 into the quotient profile used to compare
//! contigs independently of their shorter-word composition.
//!
//! ## Example
//!
//! ```rust,no_run
//! use contig_kmers::counting::counter::count_kmers;
//! use contig_kmers::store::loader::load;
//!
//! let store = load(&["assembly.fa"]).unwrap();
//! let counts = count_kmers(&store, &[4, 5]).unwrap();
//! let tetra = counts.get(4).unwrap();
//! println!("{} tetranucleotides, AAAA = {}", tetra.total(), tetra.get(0));
//! let folded = tetra.canonical().unwrap();
//! assert_eq!(folded.counts.len(), 136);
//! ```
//!
//! [`ContigStore`]: crate::store::contig_store::ContigStore

pub mod counter;
pub mod derived;
pub mod table;

use thiserror::Error;

use crate::config::ConfigError;
use crate::core::alphabet::Alphabet;
use crate::store::loader::LoadError;

#[derive(Error, Debug)]
pub enum CountError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Counting cancelled")]
    Cancelled,

    #[error("Cannot merge tables for k={left} and k={right}")]
    KMismatch { left: usize, right: usize },

    #[error("Cannot merge a {left:?} table with a {right:?} table")]
    AlphabetMismatch { left: Alphabet, right: Alphabet },

    #[error("K-mer index {index} out of range for a table of {len} entries")]
    IndexOutOfRange { index: u64, len: u64 },
}
