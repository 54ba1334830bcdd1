//! Parsers for sequence input files.
//!
//! Only FASTA is accepted, plain or gzip/bgzip compressed. See [`fasta`] for the
//! framing rules and how compression is detected.
//!
//! ## Example
//!
//! ```rust,no_run
//! use contig_kmers::parsing::fasta::parse_fasta_file;
//! use std::path::Path;
//!
//! let parsed = parse_fasta_file(Path::new("assembly.fna.gz"), 0).unwrap();
//! for contig in &parsed.contigs {
//!     println!("{}\t{}", contig.name, contig.sequence.len());
//! }
//! ```

pub mod fasta;
