//! Reproducible random windows.
//!
//! Windows are drawn uniformly over all valid start positions in the corpus, so
//! a contig's share of the draws is proportional to the number of full windows
//! it holds. Randomness comes only from the seed passed in (or a freshly
//! generated one that is handed back), never from shared global state.
//!
//! ## Example
//!
//! ```rust,no_run
//! use contig_kmers::store::loader::load;
//!
//! let store = load(&["genome.fna.gz"]).unwrap();
//! let batch = store.sample(1000, 10_000, Some(17)).unwrap();
//! for s in &batch.samples {
//!     println!("{}\t{}\t{}", s.file_idx, s.contig_idx, s.offset);
//! }
//! ```

pub mod sampler;

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::contig_store::IndexError;

#[derive(Error, Debug)]
pub enum SampleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("No acceptable window found after {attempts} attempts")]
    Exhausted { attempts: usize },
}
