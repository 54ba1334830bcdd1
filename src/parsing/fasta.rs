//! Streaming FASTA parser.
//!
//! Reads plain or gzip-compressed FASTA one line at a time and packs each
//! record's bases as they arrive, so neither the decompressed text nor a whole
//! record ever needs to be held in memory as a string.
//!
//! Compression is detected from the gzip magic bytes rather than the file
//! extension. Multi-member streams (bgzip) are read to the end.
//!
//! Framing rules:
//! - A line starting with `>` opens a record; the header is parsed with noodles
//!   (name up to the first whitespace, the rest is the description).
//! - Every following line up to the next header or end of file is appended to the
//!   sequence with its `\n` or `\r\n` terminator removed.
//! - Blank lines before the first header are ignored; any other text there is an error.
//! - A file without a single record is an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use noodles::fasta::record::Definition;
use thiserror::Error;

use crate::core::alphabet::normalize_symbol;
use crate::core::packed::PackedSequence;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", file.display())]
    Malformed {
        file: PathBuf,
        line: usize,
        message: String,
    },
}

/// A record as read from disk, before it is assigned indices in a store
#[derive(Debug, Clone)]
pub struct ParsedContig {
    pub name: String,
    pub description: Option<String>,
    pub md5: String,
    pub sequence: PackedSequence,
}

/// All retained records of one file
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub compressed: bool,
    pub contigs: Vec<ParsedContig>,
}

/// Open a file for reading, transparently decompressing gzip input.
///
/// Returns the reader and whether the file was compressed.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be opened or read.
pub fn open_reader(path: &Path) -> Result<(Box<dyn BufRead + Send>, bool), ParseError> {
    let io_err = |source: std::io::Error| ParseError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let compressed = reader.fill_buf().map_err(io_err)?.starts_with(&GZIP_MAGIC);

    if compressed {
        Ok((Box::new(BufReader::new(MultiGzDecoder::new(reader))), true))
    } else {
        Ok((Box::new(reader), false))
    }
}

/// Parse a FASTA file, keeping records of at least `min_len` bases.
///
/// # Errors
///
/// Returns `ParseError::Io` for a missing/unreadable file or a corrupt gzip
/// stream, and `ParseError::Malformed` for broken record framing.
pub fn parse_fasta_file(path: &Path, min_len: usize) -> Result<ParsedFile, ParseError> {
    let (reader, compressed) = open_reader(path)?;
    let contigs = parse_fasta_reader(reader, path, min_len)?;
    Ok(ParsedFile {
        compressed,
        contigs,
    })
}

/// Record under construction
struct OpenRecord {
    name: String,
    description: Option<String>,
    md5: md5::Context,
    sequence: PackedSequence,
}

impl OpenRecord {
    fn finish(mut self) -> ParsedContig {
        self.sequence.shrink_to_fit();
        ParsedContig {
            name: self.name,
            description: self.description,
            md5: format!("{:x}", self.md5.compute()),
            sequence: self.sequence,
        }
    }
}

/// Parse FASTA from any buffered reader. `source` is only used in errors.
///
/// # Errors
///
/// Returns `ParseError::Io` if reading fails and `ParseError::Malformed` for
/// broken record framing.
pub fn parse_fasta_reader<R: BufRead>(
    mut reader: R,
    source: &Path,
    min_len: usize,
) -> Result<Vec<ParsedContig>, ParseError> {
    let malformed = |line: usize, message: String| ParseError::Malformed {
        file: source.to_path_buf(),
        line,
        message,
    };

    let mut contigs = Vec::new();
    let mut current: Option<OpenRecord> = None;
    let mut records_seen = 0usize;
    let mut buf = Vec::new();
    let mut upper = Vec::new();
    let mut line_no = 0usize;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|source_err| ParseError::Io {
                path: source.to_path_buf(),
                source: source_err,
            })?;
        if n == 0 {
            break;
        }
        line_no += 1;
        let line = strip_terminator(&buf);

        if line.first() == Some(&b'>') {
            if let Some(record) = current.take() {
                push_retained(&mut contigs, record, min_len);
            }
            current = Some(open_record(line).map_err(|msg| malformed(line_no, msg))?);
            records_seen += 1;
            continue;
        }

        match current.as_mut() {
            Some(record) => {
                upper.clear();
                upper.extend(line.iter().map(|&b| normalize_symbol(b)));
                record.md5.consume(&upper);
                record.sequence.extend_from_slice(&upper);
            }
            None if line.iter().all(u8::is_ascii_whitespace) => {}
            None => {
                return Err(malformed(
                    line_no,
                    "sequence data before the first '>' header".to_string(),
                ));
            }
        }
    }

    if let Some(record) = current.take() {
        push_retained(&mut contigs, record, min_len);
    }

    if records_seen == 0 {
        return Err(malformed(
            line_no + 1,
            "expected a '>' header but found no records".to_string(),
        ));
    }

    Ok(contigs)
}

fn push_retained(contigs: &mut Vec<ParsedContig>, record: OpenRecord, min_len: usize) {
    if record.sequence.len() >= min_len {
        contigs.push(record.finish());
    }
}

fn open_record(line: &[u8]) -> Result<OpenRecord, String> {
    let text = std::str::from_utf8(line).map_err(|e| format!("header is not UTF-8: {e}"))?;
    let definition: Definition = text
        .parse()
        .map_err(|e| format!("invalid header {text:?}: {e}"))?;

    Ok(OpenRecord {
        name: String::from_utf8_lossy(definition.name()).to_string(),
        description: definition
            .description()
            .map(|d| String::from_utf8_lossy(d).to_string()),
        md5: md5::Context::new(),
        sequence: PackedSequence::new(),
    })
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn parse_str(text: &str) -> Result<Vec<ParsedContig>, ParseError> {
        parse_fasta_reader(text.as_bytes(), Path::new("test.fa"), 0)
    }

    #[test]
    fn test_parse_multi_record() {
        let contigs = parse_str(">chr1 description\nACGTACGT\nACGT\n>chr2\nGGGG\n").unwrap();
        assert_eq!(contigs.len(), 2);
        assert_eq!(contigs[0].name, "chr1");
        assert_eq!(contigs[0].description.as_deref(), Some("description"));
        assert_eq!(contigs[0].sequence.decode(), b"ACGTACGTACGT");
        assert_eq!(contigs[1].name, "chr2");
        assert_eq!(contigs[1].description, None);
        assert_eq!(contigs[1].sequence.decode(), b"GGGG");
    }

    #[test]
    fn test_crlf_and_lowercase() {
        let contigs = parse_str(">a\r\nacgt\r\nNNac\r\n").unwrap();
        assert_eq!(contigs[0].sequence.decode(), b"ACGTNNAC");
    }

    #[test]
    fn test_md5_is_of_uppercase_sequence() {
        // "ACGT" -> f1f8f4bf413b16ad135722aa4591043e
        let upper = parse_str(">chr1\nACGT\n").unwrap();
        let lower = parse_str(">chr1\nac\ngt\n").unwrap();
        assert_eq!(upper[0].md5, "f1f8f4bf413b16ad135722aa4591043e");
        assert_eq!(lower[0].md5, upper[0].md5);
    }

    #[test]
    fn test_empty_record_and_no_trailing_newline() {
        let contigs = parse_str(">empty\n>full\nACG").unwrap();
        assert_eq!(contigs.len(), 2);
        assert!(contigs[0].sequence.is_empty());
        assert_eq!(contigs[1].sequence.decode(), b"ACG");
    }

    #[test]
    fn test_leading_blank_lines_tolerated() {
        let contigs = parse_str("\n\n>a\nAC\n").unwrap();
        assert_eq!(contigs.len(), 1);
    }

    #[test]
    fn test_sequence_before_header() {
        let err = parse_str("\nACGT\n>a\nAC\n").unwrap_err();
        match err {
            ParseError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input() {
        let err = parse_str("").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_header_without_name() {
        let err = parse_str(">\nACGT\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_min_len_filter() {
        let contigs = parse_fasta_reader(
            ">short\nAC\n>long\nACGTACGT\n".as_bytes(),
            Path::new("test.fa"),
            4,
        )
        .unwrap();
        assert_eq!(contigs.len(), 1);
        assert_eq!(contigs[0].name, "long");
    }

    #[test]
    fn test_parse_gzipped_file() {
        let mut temp = NamedTempFile::with_suffix(".fa.gz").unwrap();
        {
            let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
            encoder.write_all(b">chr1\nACGT\nacgt\n>chr2\nNNNN\n").unwrap();
            encoder.finish().unwrap();
        }

        let parsed = parse_fasta_file(temp.path(), 0).unwrap();
        assert!(parsed.compressed);
        assert_eq!(parsed.contigs.len(), 2);
        assert_eq!(parsed.contigs[0].sequence.decode(), b"ACGTACGT");
    }

    #[test]
    fn test_gzip_detected_without_extension() {
        let mut temp = NamedTempFile::with_suffix(".fa").unwrap();
        {
            let mut encoder = GzEncoder::new(temp.as_file_mut(), Compression::fast());
            encoder.write_all(b">x\nGATTACA\n").unwrap();
            encoder.finish().unwrap();
        }

        let parsed = parse_fasta_file(temp.path(), 0).unwrap();
        assert!(parsed.compressed);
        assert_eq!(parsed.contigs[0].sequence.decode(), b"GATTACA");
    }

    #[test]
    fn test_corrupt_gzip_is_io_error() {
        let mut temp = NamedTempFile::with_suffix(".fa.gz").unwrap();
        temp.write_all(&[0x1f, 0x8b, 0x08, 0x00, 0xde, 0xad, 0xbe, 0xef])
            .unwrap();
        temp.flush().unwrap();

        let err = parse_fasta_file(temp.path(), 0).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = parse_fasta_file(Path::new("/nonexistent/genome.fa"), 0).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
