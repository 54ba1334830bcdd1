use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use noodles::fasta;
use noodles::fasta::record::{Definition, Sequence};
use tracing::{debug, info};

use crate::core::records::ContigRecord;
use crate::export::ExportError;
use crate::store::contig_store::ContigStore;

/// Write one FASTA file per bin, `<out_dir>/<bin>.fa`.
///
/// Contigs are looked up by name and written in assignment order. Bins holding
/// fewer than `min_bases` bases are not written. `out_dir` is created if needed.
/// Returns the number of bases written across all files.
///
/// # Errors
///
/// Returns `ExportError::UnknownContig` if a name is not in the store (checked
/// before any file is created) and `ExportError::Io` if a file cannot be written.
pub fn write_bins<S: AsRef<str>>(
    store: &ContigStore,
    assignments: &[(S, usize)],
    out_dir: &Path,
    min_bases: usize,
) -> Result<usize, ExportError> {
    let mut bins: BTreeMap<usize, Vec<&ContigRecord>> = BTreeMap::new();
    for (name, bin) in assignments {
        let name = name.as_ref();
        let contig = store
            .find_by_name(name)
            .ok_or_else(|| ExportError::UnknownContig(name.to_string()))?;
        bins.entry(*bin).or_default().push(contig);
    }

    fs::create_dir_all(out_dir).map_err(|source| ExportError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;

    let mut written = 0;
    for (bin, contigs) in &bins {
        let bases: usize = contigs.iter().map(|c| c.len()).sum();
        if bases < min_bases {
            debug!(bin, bases, min_bases, "skipping small bin");
            continue;
        }
        write_bin(&out_dir.join(format!("{bin}.fa")), contigs)?;
        written += bases;
    }

    info!(
        bins = bins.len(),
        bases = written,
        out_dir = %out_dir.display(),
        "wrote bins"
    );
    Ok(written)
}

/// [`write_bins`] over parallel name and bin columns.
///
/// # Errors
///
/// Returns `ExportError::LengthMismatch` if the columns differ in length, and
/// otherwise the errors of [`write_bins`].
pub fn write_bin_columns<S: AsRef<str>>(
    store: &ContigStore,
    names: &[S],
    bins: &[usize],
    out_dir: &Path,
    min_bases: usize,
) -> Result<usize, ExportError> {
    if names.len() != bins.len() {
        return Err(ExportError::LengthMismatch {
            names: names.len(),
            bins: bins.len(),
        });
    }
    let assignments: Vec<(&str, usize)> = names
        .iter()
        .map(AsRef::as_ref)
        .zip(bins.iter().copied())
        .collect();
    write_bins(store, &assignments, out_dir, min_bases)
}

fn write_bin(path: &Path, contigs: &[&ContigRecord]) -> Result<(), ExportError> {
    let io_err = |source: std::io::Error| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = fasta::io::Writer::new(BufWriter::new(file));
    for contig in contigs {
        let description = contig.description.clone().map(Into::into);
        let definition = Definition::new(contig.name.as_str(), description);
        let record = fasta::Record::new(definition, Sequence::from(contig.sequence.decode()));
        writer.write_record(&record).map_err(io_err)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::fasta::parse_fasta_file;

    fn store() -> ContigStore {
        ContigStore::from_sequences([vec!["ACGTACGTAC", "GGGG", "ttttNNaa"]])
    }

    #[test]
    fn test_write_bins() {
        let store = store();
        let dir = tempfile::tempdir().unwrap();
        let assignments = [("contig_0", 1), ("contig_2", 1), ("contig_1", 2)];

        let written = write_bins(&store, &assignments, dir.path(), 0).unwrap();
        assert_eq!(written, 22);

        let bin1 = parse_fasta_file(&dir.path().join("1.fa"), 0).unwrap();
        let names: Vec<_> = bin1.contigs.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["contig_0", "contig_2"]);
        assert_eq!(bin1.contigs[1].sequence.decode(), b"TTTTNNAA");

        let bin2 = parse_fasta_file(&dir.path().join("2.fa"), 0).unwrap();
        assert_eq!(bin2.contigs[0].sequence.decode(), b"GGGG");
    }

    #[test]
    fn test_small_bins_skipped() {
        let store = store();
        let dir = tempfile::tempdir().unwrap();
        let assignments = [("contig_0", 1), ("contig_1", 2)];

        let written = write_bins(&store, &assignments, dir.path(), 5).unwrap();
        assert_eq!(written, 10);
        assert!(dir.path().join("1.fa").exists());
        assert!(!dir.path().join("2.fa").exists());
    }

    #[test]
    fn test_unknown_contig() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_bins(&store(), &[("chr1", 0)], dir.path(), 0);
        assert!(matches!(result, Err(ExportError::UnknownContig(name)) if name == "chr1"));
        assert!(!dir.path().join("0.fa").exists());
    }

    #[test]
    fn test_column_length_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let result = write_bin_columns(&store(), &["contig_0"], &[0, 1], dir.path(), 0);
        assert!(matches!(
            result,
            Err(ExportError::LengthMismatch { names: 1, bins: 2 })
        ));
    }
}
