//! Ingestion: parse input files in parallel and assemble a [`ContigStore`].

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{run_in_pool, ConfigError, FailurePolicy, IngestConfig};
use crate::parsing::fasta::{parse_fasta_file, ParseError, ParsedFile};
use crate::store::contig_store::{ContigStore, StoreBuilder};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {}, line {line}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid engine state: {0}")]
    InvalidState(String),
}

impl From<ParseError> for LoadError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Io { path, source } => Self::Io { path, source },
            ParseError::Malformed {
                file,
                line,
                message,
            } => Self::Parse {
                file,
                line,
                message,
            },
        }
    }
}

/// Load FASTA files with the default configuration (abort on any failure).
///
/// # Errors
///
/// Returns `LoadError::Io` if a file is missing, unreadable, or has a corrupt
/// compressed stream, and `LoadError::Parse` for malformed record framing.
pub fn load<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<ContigStore, LoadError> {
    load_with_config(paths, &IngestConfig::default())
}

/// Load FASTA files into a store.
///
/// Files are parsed concurrently, one stream per file, and placed in the store
/// by their position in `paths` regardless of which worker finishes first.
/// Under [`FailurePolicy::Abort`] the first failing file in input order is
/// reported and no store is produced. Under [`FailurePolicy::SkipAndWarn`] a
/// failing file is logged and kept as an empty, skipped [`FileRecord`] so the
/// indices of later files do not shift.
///
/// [`FileRecord`]: crate::core::records::FileRecord
///
/// # Errors
///
/// Returns `LoadError::Io` or `LoadError::Parse` under the abort policy, and
/// `LoadError::Config` if a thread pool cannot be built.
pub fn load_with_config<P: AsRef<Path> + Sync>(
    paths: &[P],
    config: &IngestConfig,
) -> Result<ContigStore, LoadError> {
    debug!(files = paths.len(), threads = ?config.threads, "starting load");

    let results: Vec<Result<ParsedFile, ParseError>> = run_in_pool(config.threads, || {
        paths
            .par_iter()
            .map(|path| parse_fasta_file(path.as_ref(), config.min_contig_len))
            .collect()
    })?;

    let mut builder = StoreBuilder::new();
    for (path, result) in paths.iter().zip(results) {
        let path = path.as_ref();
        match result {
            Ok(parsed) => {
                debug!(
                    path = %path.display(),
                    contigs = parsed.contigs.len(),
                    compressed = parsed.compressed,
                    "parsed file"
                );
                builder.add_file(path, parsed);
            }
            Err(err) => match config.policy {
                FailurePolicy::Abort => return Err(err.into()),
                FailurePolicy::SkipAndWarn => {
                    warn!(path = %path.display(), error = %err, "skipping file");
                    builder.add_skipped(path, err.to_string());
                }
            },
        }
    }

    let store = builder.build();
    info!(
        files = store.file_count(),
        contigs = store.contig_total(),
        bases = store.total_length(),
        "load complete"
    );
    Ok(store)
}
