//! Contig storage and ingestion.
//!
//! A [`ContigStore`](contig_store::ContigStore) owns every ingested contig in
//! 2-bit packed form and is immutable once built, so it can be shared freely
//! across threads (`&ContigStore` or `Arc<ContigStore>`) without locking.
//!
//! ## Example
//!
//! ```rust,no_run
//! use contig_kmers::store::loader::load;
//!
//! let store = load(&["genome_a.fna.gz", "genome_b.fa"]).unwrap();
//! println!("{} files, {} bases", store.file_count(), store.total_length());
//!
//! let seq = store.get_contig(0, 0).unwrap();
//! let loc = store.locate(store.total_length() / 2).unwrap();
//! println!("{} {:?}", seq.len(), loc);
//! ```

pub mod contig_store;
pub mod loader;
