use crate::vr::trim_padding;
use dicom_core::Tag;
use dicom_dictionary_std::tags;
use dicom_object::{DefaultDicomObject, OpenFileOptions};
use log::debug;
use std::path::{Path, PathBuf};

/// Value used for a patient, study or series identifier that is missing from a file.
pub const UNKNOWN_IDENTIFIER: &str = "UNKNOWN";

/// The organizational identifiers of a single DICOM file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub path: PathBuf,
    pub patient_id: String,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
}

impl Record {
    /// Extract the identifiers from a parsed DICOM object.
    ///
    /// Returns `None` if the object has no (or an empty) SOP Instance UID. Missing patient,
    /// study and series identifiers are replaced by [`UNKNOWN_IDENTIFIER`].
    pub fn from_dicom_object(path: &Path, obj: &DefaultDicomObject) -> Option<Self> {
        let sop_instance_uid = string_value(obj, tags::SOP_INSTANCE_UID)?;

        Some(Self {
            path: path.to_path_buf(),
            patient_id: string_value_or_unknown(obj, tags::PATIENT_ID),
            study_instance_uid: string_value_or_unknown(obj, tags::STUDY_INSTANCE_UID),
            series_instance_uid: string_value_or_unknown(obj, tags::SERIES_INSTANCE_UID),
            sop_instance_uid,
        })
    }
}

fn string_value(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
    let elem = obj.element(tag).ok()?;
    let value = elem.to_str().ok()?;
    let value = trim_padding(&value);
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn string_value_or_unknown(obj: &DefaultDicomObject, tag: Tag) -> String {
    string_value(obj, tag).unwrap_or_else(|| UNKNOWN_IDENTIFIER.into())
}

/// Decides whether a file is a DICOM file and, if so, what its identifiers are.
pub trait RecordReader: Sync {
    /// Returns `None` if the file can't be read as DICOM or lacks a SOP Instance UID.
    fn read(&self, path: &Path) -> Option<Record>;
}

/// [`RecordReader`] that parses the file header with `dicom-object`, stopping before the pixel
/// data.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomRecordReader;

impl DicomRecordReader {
    pub fn new() -> Self {
        Self {}
    }
}

impl RecordReader for DicomRecordReader {
    fn read(&self, path: &Path) -> Option<Record> {
        let obj = match OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
        {
            Ok(obj) => obj,
            Err(e) => {
                debug!("not a DICOM file {}: {}", path.display(), e);
                return None;
            }
        };

        let record = Record::from_dicom_object(path, &obj);
        if record.is_none() {
            debug!("no SOP Instance UID in {}", path.display());
        }
        record
    }
}
