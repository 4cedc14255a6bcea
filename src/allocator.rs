use crate::config::SeriesCapacity;
use crate::index::GroupingIndex;
use log::warn;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const CODE_DIGITS: usize = 5;
const CODE_MAX_NUMBER: u32 = 99_999;

/// Level of the output hierarchy, each with its own folder (or file) name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Patient,
    Study,
    Series,
    Instance,
}

impl Level {
    pub fn prefix(&self) -> &'static str {
        match self {
            Level::Patient => "PA",
            Level::Study => "ST",
            Level::Series => "SE",
            Level::Instance => "DI",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "PA" => Some(Level::Patient),
            "ST" => Some(Level::Study),
            "SE" => Some(Level::Series),
            "DI" => Some(Level::Instance),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{0} is not a valid folder or file code")]
pub struct CodeError(String);

/// A sequential folder or file name like `PA00001` or `DI00042`.
///
/// # Example
///
/// ```
/// use dicomdir_organizer::allocator::{Code, Level};
///
/// let code = Code::new(Level::Series, 3);
/// assert_eq!(code.to_string(), "SE00003");
/// assert_eq!("SE00003".parse::<Code>().unwrap(), code);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Code {
    level: Level,
    number: u32,
}

impl Code {
    pub fn new(level: Level, number: u32) -> Self {
        Self { level, number }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn number(&self) -> u32 {
        self.number
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0width$}",
            self.level.prefix(),
            self.number,
            width = CODE_DIGITS
        )
    }
}

impl FromStr for Code {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodeError(s.into());
        if s.len() != 2 + CODE_DIGITS || !s.is_ascii() {
            return Err(invalid());
        }
        let (prefix, digits) = s.split_at(2);
        let level = Level::from_prefix(prefix).ok_or_else(invalid)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let number = digits.parse().map_err(|_| invalid())?;
        Ok(Code::new(level, number))
    }
}

/// Destination of a single source file in the output hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: PathBuf,
    pub patient: Code,
    pub study: Code,
    pub series: Code,
    pub instance: Code,
}

impl Placement {
    /// Path of the output file relative to the output root, e.g. `PA00001/ST00001/SE00002/DI00007`.
    pub fn relative_path(&self) -> PathBuf {
        [self.patient, self.study, self.series, self.instance]
            .iter()
            .map(|code| code.to_string())
            .collect()
    }

    pub fn destination(&self, output_root: &Path) -> PathBuf {
        output_root.join(self.relative_path())
    }
}

/// A series folder with the original identifiers it was created for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesFolder {
    pub patient_id: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    /// Zero-based index of this folder among the folders the series was split into.
    pub split_index: usize,
    pub patient: Code,
    pub study: Code,
    pub series: Code,
    pub instance_count: usize,
}

/// The output location of every file in a [`GroupingIndex`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationPlan {
    placements: Vec<Placement>,
    series_folders: Vec<SeriesFolder>,
}

impl AllocationPlan {
    /// All placements, ordered by patient, study, series and instance code.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn series_folders(&self) -> &[SeriesFolder] {
        &self.series_folders
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    fn first_oversized_code(&self) -> Option<Code> {
        self.placements
            .iter()
            .flat_map(|p| [p.patient, p.study, p.series, p.instance])
            .find(|code| code.number > CODE_MAX_NUMBER)
    }
}

/// Assign sequential codes to all patients, studies, series and instances of the index.
///
/// - patients are numbered in order of their patient ID
/// - studies are numbered per patient, in order of their Study Instance UID
/// - series are numbered per study, in order of their Series Instance UID; a series with more
///   files than `capacity` is split over consecutive series folders, and numbering of the next
///   series continues after the last of them
/// - instances are numbered per series folder, in order of their source path
///
/// The result only depends on the content of the index.
pub fn allocate(index: &GroupingIndex, capacity: SeriesCapacity) -> AllocationPlan {
    let mut plan = AllocationPlan::default();
    let capacity = capacity.get();

    for (patient_number, (patient_id, studies)) in (1..).zip(index.patients()) {
        let patient = Code::new(Level::Patient, patient_number);

        for (study_number, (study_instance_uid, series_map)) in (1..).zip(studies) {
            let study = Code::new(Level::Study, study_number);
            let mut series_number = 0;

            for (series_instance_uid, files) in series_map {
                let mut files: Vec<&PathBuf> = files.iter().collect();
                files.sort();

                for (split_index, chunk) in files.chunks(capacity).enumerate() {
                    series_number += 1;
                    let series = Code::new(Level::Series, series_number);

                    plan.series_folders.push(SeriesFolder {
                        patient_id: patient_id.clone(),
                        study_instance_uid: study_instance_uid.clone(),
                        series_instance_uid: series_instance_uid.clone(),
                        split_index,
                        patient,
                        study,
                        series,
                        instance_count: chunk.len(),
                    });

                    for (instance_number, source) in (1..).zip(chunk) {
                        plan.placements.push(Placement {
                            source: (*source).clone(),
                            patient,
                            study,
                            series,
                            instance: Code::new(Level::Instance, instance_number),
                        });
                    }
                }
            }
        }
    }

    if let Some(code) = plan.first_oversized_code() {
        warn!(
            "code {} exceeds {} digits, folder names will not be DICOMDIR compliant",
            code,
            CODE_DIGITS
        );
    }

    plan
}
