//! Write stored contigs back out as FASTA.
//!
//! The usual consumer is a binning workflow: contigs are clustered (for example
//! on their tetranucleotide profiles) and each cluster is written to its own
//! FASTA file.

pub mod bins;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown contig: {0}")]
    UnknownContig(String),

    #[error("{names} contig names but {bins} bin numbers")]
    LengthMismatch { names: usize, bins: usize },
}
