use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::packed::PackedSequence;
use crate::core::records::{ContigRecord, FileRecord, FileStatus};
use crate::parsing::fasta::ParsedFile;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("File index {file_idx} out of range ({file_count} files)")]
    File { file_idx: usize, file_count: usize },

    #[error("Contig index {contig_idx} out of range for file {file_idx} ({contig_count} contigs)")]
    Contig {
        file_idx: usize,
        contig_idx: usize,
        contig_count: usize,
    },

    #[error("Offset {offset} out of range (corpus length {total})")]
    Offset { offset: usize, total: usize },
}

/// A corpus-wide offset resolved to a contig position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file_idx: usize,
    pub contig_idx: usize,
    pub local_offset: usize,
}

/// Aggregate statistics for a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub file_count: usize,
    pub skipped_files: usize,
    pub contig_count: usize,
    pub total_length: usize,
    pub longest_contig: usize,
    pub ambiguous_bases: usize,
    pub packed_bytes: usize,
}

/// All ingested contigs, immutable once built.
///
/// Contigs are held in one flat vector in (file, contig) order. Two prefix
/// arrays make every lookup O(1) or O(log n):
/// - `file_starts[f]` is the flat index of file `f`'s first contig
/// - `contig_offsets[i]` is the corpus-wide offset of flat contig `i`'s first base
#[derive(Debug)]
pub struct ContigStore {
    files: Vec<FileRecord>,
    contigs: Vec<ContigRecord>,
    file_starts: Vec<usize>,
    contig_offsets: Vec<usize>,

    /// Index: contig name -> flat index of its first occurrence
    name_to_index: HashMap<String, usize>,

    longest_contig: usize,
    ambiguous_bases: usize,
}

impl ContigStore {
    /// Build a store from in-memory sequences, one inner collection per file.
    ///
    /// Contigs are named `contig_<n>` and files `memory:<n>`.
    pub fn from_sequences<F, C, S>(files: F) -> Self
    where
        F: IntoIterator<Item = C>,
        C: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut builder = StoreBuilder::new();
        for (file_idx, contigs) in files.into_iter().enumerate() {
            let contigs = contigs
                .into_iter()
                .enumerate()
                .map(|(contig_idx, seq)| {
                    let sequence = PackedSequence::from_bytes(seq.as_ref());
                    crate::parsing::fasta::ParsedContig {
                        name: format!("contig_{contig_idx}"),
                        description: None,
                        md5: format!("{:x}", md5::compute(sequence.decode())),
                        sequence,
                    }
                })
                .collect();
            builder.add_file(
                Path::new(&format!("memory:{file_idx}")),
                ParsedFile {
                    compressed: false,
                    contigs,
                },
            );
        }
        builder.build()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of contigs across all files
    pub fn contig_total(&self) -> usize {
        self.contigs.len()
    }

    /// Total number of bases (including ambiguous symbols) across all contigs
    pub fn total_length(&self) -> usize {
        self.contig_offsets.last().copied().unwrap_or(0)
    }

    pub fn longest_contig(&self) -> usize {
        self.longest_contig
    }

    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    /// All contigs in (file, contig) order
    pub fn contigs(&self) -> &[ContigRecord] {
        &self.contigs
    }

    /// Files dropped under the skip-and-warn policy
    pub fn skipped_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.iter().filter(|f| f.is_skipped())
    }

    /// # Errors
    ///
    /// Returns `IndexError::File` if `file_idx` is out of range.
    pub fn file(&self, file_idx: usize) -> Result<&FileRecord, IndexError> {
        self.files.get(file_idx).ok_or(IndexError::File {
            file_idx,
            file_count: self.files.len(),
        })
    }

    /// Number of contigs in one file
    ///
    /// # Errors
    ///
    /// Returns `IndexError::File` if `file_idx` is out of range.
    pub fn contig_count(&self, file_idx: usize) -> Result<usize, IndexError> {
        self.file(file_idx).map(|f| f.contig_count)
    }

    fn flat_index(&self, file_idx: usize, contig_idx: usize) -> Result<usize, IndexError> {
        let contig_count = self.contig_count(file_idx)?;
        if contig_idx >= contig_count {
            return Err(IndexError::Contig {
                file_idx,
                contig_idx,
                contig_count,
            });
        }
        Ok(self.file_starts[file_idx] + contig_idx)
    }

    /// # Errors
    ///
    /// Returns `IndexError` if either index is out of range.
    pub fn contig(&self, file_idx: usize, contig_idx: usize) -> Result<&ContigRecord, IndexError> {
        self.flat_index(file_idx, contig_idx)
            .map(|idx| &self.contigs[idx])
    }

    /// Decoded, upper-case bases of one contig.
    ///
    /// # Errors
    ///
    /// Returns `IndexError` if either index is out of range.
    pub fn get(&self, file_idx: usize, contig_idx: usize) -> Result<Vec<u8>, IndexError> {
        self.contig(file_idx, contig_idx)
            .map(|c| c.sequence.decode())
    }

    /// Decoded contig as a string. The text is the upper-cased concatenation of
    /// the record's sequence lines, not necessarily byte-identical to the file.
    ///
    /// # Errors
    ///
    /// Returns `IndexError` if either index is out of range.
    pub fn get_contig(&self, file_idx: usize, contig_idx: usize) -> Result<String, IndexError> {
        self.get(file_idx, contig_idx)
            .map(|bases| String::from_utf8_lossy(&bases).into_owned())
    }

    /// Decode `len` bases of one contig starting at `start`, clamped to its end.
    ///
    /// # Errors
    ///
    /// Returns `IndexError` if either index is out of range.
    pub fn slice(
        &self,
        file_idx: usize,
        contig_idx: usize,
        start: usize,
        len: usize,
    ) -> Result<Vec<u8>, IndexError> {
        self.contig(file_idx, contig_idx)
            .map(|c| c.sequence.slice(start, len))
    }

    /// First contig with this name, searching files in input order
    pub fn find_by_name(&self, name: &str) -> Option<&ContigRecord> {
        self.name_to_index.get(name).map(|&idx| &self.contigs[idx])
    }

    /// Corpus-wide offset of a contig's first base
    ///
    /// # Errors
    ///
    /// Returns `IndexError` if either index is out of range.
    pub fn contig_start(&self, file_idx: usize, contig_idx: usize) -> Result<usize, IndexError> {
        self.flat_index(file_idx, contig_idx)
            .map(|idx| self.contig_offsets[idx])
    }

    /// Map a corpus-wide offset to the contig holding it.
    ///
    /// Offsets run over all contigs end to end in (file, contig) order. Lookup is a
    /// binary search over the prefix-length index; empty contigs are never returned.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::Offset` if `global_offset >= total_length()`.
    pub fn locate(&self, global_offset: usize) -> Result<Location, IndexError> {
        let total = self.total_length();
        if global_offset >= total {
            return Err(IndexError::Offset {
                offset: global_offset,
                total,
            });
        }

        // Last contig starting at or before the offset. Empty contigs share their
        // start with the next contig, so this always lands on a non-empty one.
        let flat = self.contig_offsets[..self.contigs.len()]
            .partition_point(|&start| start <= global_offset)
            - 1;
        let contig = &self.contigs[flat];

        Ok(Location {
            file_idx: contig.file_idx,
            contig_idx: contig.contig_idx,
            local_offset: global_offset - self.contig_offsets[flat],
        })
    }

    pub fn summary(&self) -> StoreSummary {
        StoreSummary {
            file_count: self.files.len(),
            skipped_files: self.skipped_files().count(),
            contig_count: self.contigs.len(),
            total_length: self.total_length(),
            longest_contig: self.longest_contig,
            ambiguous_bases: self.ambiguous_bases,
            packed_bytes: self.contigs.iter().map(|c| c.sequence.heap_bytes()).sum(),
        }
    }
}

/// Assembles a [`ContigStore`] file by file, in input order.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    files: Vec<FileRecord>,
    contigs: Vec<ContigRecord>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parsed file. Its file index is the number of files added so far.
    pub fn add_file(&mut self, path: &Path, parsed: ParsedFile) {
        let file_idx = self.files.len();
        let contig_count = parsed.contigs.len();

        self.contigs
            .extend(
                parsed
                    .contigs
                    .into_iter()
                    .enumerate()
                    .map(|(contig_idx, c)| ContigRecord {
                        file_idx,
                        contig_idx,
                        name: c.name,
                        description: c.description,
                        md5: c.md5,
                        sequence: c.sequence,
                    }),
            );

        self.files.push(FileRecord {
            path: PathBuf::from(path),
            file_idx,
            contig_count,
            compressed: parsed.compressed,
            status: FileStatus::Loaded,
        });
    }

    /// Append a placeholder for a file that failed to load, keeping later indices stable.
    pub fn add_skipped(&mut self, path: &Path, reason: String) {
        let file_idx = self.files.len();
        self.files.push(FileRecord {
            path: PathBuf::from(path),
            file_idx,
            contig_count: 0,
            compressed: false,
            status: FileStatus::Skipped(reason),
        });
    }

    pub fn build(self) -> ContigStore {
        let mut file_starts = Vec::with_capacity(self.files.len() + 1);
        let mut start = 0;
        for file in &self.files {
            file_starts.push(start);
            start += file.contig_count;
        }
        file_starts.push(start);

        let mut contig_offsets = Vec::with_capacity(self.contigs.len() + 1);
        let mut offset = 0;
        let mut name_to_index = HashMap::new();
        let mut longest_contig = 0;
        let mut ambiguous_bases = 0;

        for (idx, contig) in self.contigs.iter().enumerate() {
            contig_offsets.push(offset);
            offset += contig.len();
            longest_contig = longest_contig.max(contig.len());
            ambiguous_bases += contig.sequence.ambiguous_count();
            name_to_index.entry(contig.name.clone()).or_insert(idx);
        }
        contig_offsets.push(offset);

        ContigStore {
            files: self.files,
            contigs: self.contigs,
            file_starts,
            contig_offsets,
            name_to_index,
            longest_contig,
            ambiguous_bases,
        }
    }
}
