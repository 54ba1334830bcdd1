use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::packed::PackedSequence;

/// Outcome of ingesting one input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum FileStatus {
    Loaded,
    /// Skipped under the skip-and-warn policy; holds the error text
    Skipped(String),
}

/// An ingested source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path as supplied by the caller
    pub path: PathBuf,

    /// Position in the caller's input list
    pub file_idx: usize,

    /// Number of contigs retained from this file
    pub contig_count: usize,

    /// Whether the input was compressed on disk
    pub compressed: bool,

    pub status: FileStatus,
}

impl FileRecord {
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, FileStatus::Skipped(_))
    }
}

/// One sequence record. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContigRecord {
    /// Index of the owning file
    pub file_idx: usize,

    /// Order of appearance within the file, counting retained records only
    pub contig_idx: usize,

    /// Identifier: the header text up to the first whitespace
    pub name: String,

    /// Remainder of the header line, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MD5 of the normalized (upper-case) sequence, lowercase hex
    pub md5: String,

    pub sequence: PackedSequence,
}

impl ContigRecord {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Number of start positions admitting a full window of `length`
    pub fn window_starts(&self, length: usize) -> usize {
        if length == 0 {
            return 0;
        }
        self.len().saturating_sub(length - 1)
    }
}

/// A window copied out of a contig. Owns its bases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub file_idx: usize,
    pub contig_idx: usize,
    /// Start of the window within the contig
    pub offset: usize,
    pub length: usize,
    /// Decoded, upper-case bases
    pub bases: Vec<u8>,
}

impl Sample {
    /// Bases as text. Non-UTF-8 bytes are replaced.
    pub fn sequence(&self) -> String {
        String::from_utf8_lossy(&self.bases).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(bases: &[u8]) -> ContigRecord {
        ContigRecord {
            file_idx: 0,
            contig_idx: 0,
            name: "ctg".to_string(),
            description: None,
            md5: String::new(),
            sequence: PackedSequence::from_bytes(bases),
        }
    }

    #[test]
    fn test_window_starts() {
        let rec = record(b"ACGTACGTAC");
        assert_eq!(rec.window_starts(1), 10);
        assert_eq!(rec.window_starts(10), 1);
        assert_eq!(rec.window_starts(11), 0);
        assert_eq!(rec.window_starts(0), 0);
    }

    #[test]
    fn test_file_status_serialization() {
        let json = serde_json::to_string(&FileStatus::Skipped("bad".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"skipped","reason":"bad"}"#);
    }
}
