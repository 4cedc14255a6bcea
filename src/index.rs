use crate::record::Record;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

pub type SeriesMap = BTreeMap<String, Vec<PathBuf>>;
pub type StudyMap = BTreeMap<String, SeriesMap>;

/// Outcome of inserting a [`Record`] into a [`GroupingIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    Added,
    /// Another file with the same Series Instance UID and SOP Instance UID was inserted before.
    Duplicate,
}

/// Files grouped by patient ID, Study Instance UID and Series Instance UID.
///
/// The index never holds two files with the same (Series Instance UID, SOP Instance UID) pair,
/// the first one inserted wins. All levels iterate in lexicographic order of their identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupingIndex {
    patients: BTreeMap<String, StudyMap>,
    seen: HashSet<(String, String)>,
    len: usize,
}

impl GroupingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: Record) -> Insertion {
        let key = (
            record.series_instance_uid.clone(),
            record.sop_instance_uid.clone(),
        );
        if !self.seen.insert(key) {
            return Insertion::Duplicate;
        }

        self.patients
            .entry(record.patient_id)
            .or_default()
            .entry(record.study_instance_uid)
            .or_default()
            .entry(record.series_instance_uid)
            .or_default()
            .push(record.path);
        self.len += 1;
        Insertion::Added
    }

    /// Patients with their studies, sorted by patient ID.
    pub fn patients(&self) -> impl Iterator<Item = (&String, &StudyMap)> {
        self.patients.iter()
    }

    /// Number of files in the index.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn series_count(&self) -> usize {
        self.patients
            .values()
            .flat_map(|studies| studies.values())
            .map(|series| series.len())
            .sum()
    }
}
