//! Core data types for contig storage and k-mer arithmetic.
//!
//! - [`alphabet`]: canonical base ordering, 2-bit codes, k-mer indices
//! - [`packed`]: [`PackedSequence`](packed::PackedSequence), the 2-bit sequence encoding
//! - [`records`]: [`FileRecord`](records::FileRecord), [`ContigRecord`](records::ContigRecord)
//!   and [`Sample`](records::Sample)
//!
//! ## Normalization
//!
//! Every stored sequence is upper-cased on ingestion. Decoding returns the
//! normalized text, which is not necessarily byte-identical to the source file
//! (soft-masked lowercase regions come back upper-case). Symbols outside `ACGT`
//! are kept verbatim (after upper-casing) and treated as ambiguous.

pub mod alphabet;
pub mod packed;
pub mod records;
