use crate::index::{GroupingIndex, Insertion};
use crate::record::RecordReader;
use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Result of scanning an input directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub index: GroupingIndex,
    /// Number of files visited, DICOM or not.
    pub total_files: usize,
    /// Number of DICOM files that made it into the index.
    pub valid_records: usize,
    /// Number of DICOM files skipped because their instance was already seen.
    pub duplicates: usize,
}

/// All files below `root`, in a deterministic order.
///
/// Entries of each directory are visited sorted by file name, depth first, so the order only
/// depends on the names in the tree and not on the file system.
pub fn list_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.into_path())
        .collect()
}

/// Walk `root` recursively and group all DICOM files by patient, study and series.
///
/// Files are read in parallel, but inserted into the index in the order returned by
/// [`list_files`], so of two files with the same Series Instance UID and SOP Instance UID the
/// one visited first is kept.
pub fn scan<R: RecordReader + ?Sized>(root: &Path, reader: &R) -> ScanReport {
    let files = list_files(root);
    let total_files = files.len();

    let records: Vec<_> = files.par_iter().map(|path| reader.read(path)).collect();

    let mut report = ScanReport {
        total_files,
        ..Default::default()
    };

    for record in records.into_iter().flatten() {
        let path = record.path.clone();
        match report.index.insert(record) {
            Insertion::Added => report.valid_records += 1,
            Insertion::Duplicate => {
                info!("Duplicate found, skipping file: {}", path.display());
                report.duplicates += 1;
            }
        }
    }

    info!(
        "Scanned {} files, found {} valid DICOM files.",
        report.total_files, report.valid_records
    );
    report
}
