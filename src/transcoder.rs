use crate::vr::{max_length, trim_padding, truncate_to};
use dicom_core::header::Header;
use dicom_core::value::{DataSetSequence, PrimitiveValue, Value};
use dicom_core::{Length, VR};
use dicom_dictionary_std::uids;
use dicom_encoding::transfer_syntax::{Codec, TransferSyntaxIndex};
use dicom_object::mem::InMemElement;
use dicom_object::{DefaultDicomObject, InMemDicomObject, OpenFileOptions};
use dicom_pixeldata::Transcode;
use dicom_transfer_syntax_registry::entries::EXPLICIT_VR_LITTLE_ENDIAN;
use dicom_transfer_syntax_registry::TransferSyntaxRegistry;
use log::{error, info};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What happened to the pixel data encoding of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decompression {
    /// The pixel data was not encapsulated, only the data set encoding had to change.
    NotNeeded,
    Decompressed,
    /// Decompression failed, the file was written with its original pixel data.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeReport {
    pub original_transfer_syntax: String,
    pub decompression: Decompression,
    /// Number of values that were cut off at the maximum length of their VR.
    pub trimmed_values: usize,
}

/// Re-encode the DICOM file at `source` as Explicit VR Little Endian and write it to `dest`.
///
/// Compressed pixel data is decompressed first. A failure to do so is logged, after which the
/// file is written anyway. Short String (SH) values longer than 16 characters are trimmed,
/// including those in nested sequences. Parent directories of `dest` are created as needed.
pub fn transcode(source: &Path, dest: &Path) -> Result<TranscodeReport> {
    let mut obj = OpenFileOptions::new()
        .open_file(source)
        .map_err(|e| Error::ReadError(format!("{}: {}", source.display(), e)))?;

    let report = normalize(&mut obj, source);

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::WriteError(format!("{}: {}", parent.display(), e)))?;
    }
    obj.write_to_file(dest)
        .map_err(|e| Error::WriteError(format!("{}: {}", dest.display(), e)))?;

    Ok(report)
}

/// Convert an in-memory DICOM object to Explicit VR Little Endian and repair over-long values.
///
/// `source` is only used for log messages.
pub fn normalize(obj: &mut DefaultDicomObject, source: &Path) -> TranscodeReport {
    let original_transfer_syntax = obj.meta().transfer_syntax().to_string();

    let decompression = if original_transfer_syntax == uids::EXPLICIT_VR_LITTLE_ENDIAN
        || !has_encapsulated_pixel_data(&original_transfer_syntax)
    {
        Decompression::NotNeeded
    } else {
        match obj.transcode(&EXPLICIT_VR_LITTLE_ENDIAN.erased()) {
            Ok(()) => {
                info!("Decompressed {} successfully", source.display());
                Decompression::Decompressed
            }
            Err(e) => {
                error!("Failed to decompress {}: {}", source.display(), e);
                Decompression::Failed(e.to_string())
            }
        }
    };

    obj.meta_mut().set_transfer_syntax(&EXPLICIT_VR_LITTLE_ENDIAN);
    let trimmed_values = trim_short_strings(obj);

    TranscodeReport {
        original_transfer_syntax,
        decompression,
        trimmed_values,
    }
}

fn has_encapsulated_pixel_data(transfer_syntax: &str) -> bool {
    // unknown transfer syntaxes are treated as compressed, so decoding is at least attempted
    TransferSyntaxRegistry
        .get(transfer_syntax)
        .map(|ts| matches!(ts.codec(), Codec::EncapsulatedPixelData(..)))
        .unwrap_or(true)
}

/// Trim all values that are longer than their VR allows, recursing into sequences.
///
/// Only Short String (SH) values are bounded this way, at 16 characters. Padding at the end of a
/// value does not count towards its length. Returns the number of values that were trimmed.
pub fn trim_short_strings(obj: &mut InMemDicomObject) -> usize {
    let mut trimmed = 0;
    let replacements: Vec<InMemElement> = obj
        .iter()
        .filter_map(|elem| {
            let (new_elem, count) = trim_element(elem)?;
            trimmed += count;
            Some(new_elem)
        })
        .collect();

    for elem in replacements {
        obj.put(elem);
    }
    trimmed
}

fn trim_element(elem: &InMemElement) -> Option<(InMemElement, usize)> {
    match elem.value() {
        Value::Sequence(seq) => {
            let mut items = seq.items().to_vec();
            let count: usize = items.iter_mut().map(trim_short_strings).sum();
            if count == 0 {
                return None;
            }
            let new_elem = InMemElement::new(
                elem.tag(),
                VR::SQ,
                Value::Sequence(DataSetSequence::new(items, Length::UNDEFINED)),
            );
            Some((new_elem, count))
        }
        Value::Primitive(value) => {
            let limit = max_length(elem.vr())?;
            let (new_value, count) = trim_strings(value, limit)?;
            info!(
                "Trimming {} value of tag {} from {:?} to {:?}",
                elem.vr(),
                elem.tag(),
                value.to_str(),
                new_value.to_str()
            );
            let new_elem = InMemElement::new(elem.tag(), elem.vr(), Value::Primitive(new_value));
            Some((new_elem, count))
        }
        _ => None,
    }
}

fn trim_strings(value: &PrimitiveValue, limit: usize) -> Option<(PrimitiveValue, usize)> {
    let values: Vec<&str> = match value {
        PrimitiveValue::Str(s) => vec![s.as_str()],
        PrimitiveValue::Strs(strs) => strs.iter().map(String::as_str).collect(),
        _ => return None,
    };

    let mut count = 0;
    let new_values: Vec<String> = values
        .into_iter()
        .map(|v| {
            let v = trim_padding(v);
            if v.chars().count() > limit {
                count += 1;
                truncate_to(limit, v)
            } else {
                v.to_string()
            }
        })
        .collect();

    if count == 0 {
        return None;
    }

    let new_value = match value {
        PrimitiveValue::Str(_) => PrimitiveValue::Str(new_values.concat()),
        _ => PrimitiveValue::Strs(new_values.into_iter().collect()),
    };
    Some((new_value, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_broken_jpeg_object, make_object, write_object};
    use dicom_dictionary_std::tags;
    use dicom_object::open_file;

    const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";

    fn sh(tag: dicom_core::Tag, value: &str) -> InMemElement {
        InMemElement::new(tag, VR::SH, Value::from(value))
    }

    fn sh_value(obj: &InMemDicomObject, tag: dicom_core::Tag) -> String {
        let value = obj.element(tag).unwrap().to_str().unwrap();
        trim_padding(&value).to_string()
    }

    #[test]
    fn test_trim_short_strings() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(sh(tags::ACCESSION_NUMBER, "ABCDEFGHIJKLMNOPQRST"));
        obj.put(sh(tags::STUDY_ID, "SHORT"));

        let trimmed = trim_short_strings(&mut obj);
        assert_eq!(trimmed, 1);
        assert_eq!(sh_value(&obj, tags::ACCESSION_NUMBER), "ABCDEFGHIJKLMNOP");
        assert_eq!(sh_value(&obj, tags::STUDY_ID), "SHORT");
    }

    #[test]
    fn test_trim_short_strings_exactly_max_length() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(sh(tags::ACCESSION_NUMBER, "0123456789ABCDEF"));

        assert_eq!(trim_short_strings(&mut obj), 0);
        assert_eq!(sh_value(&obj, tags::ACCESSION_NUMBER), "0123456789ABCDEF");
    }

    #[test]
    fn test_trim_short_strings_ignores_padding() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(sh(tags::ACCESSION_NUMBER, "0123456789ABCDEF  "));

        assert_eq!(trim_short_strings(&mut obj), 0);
    }

    #[test]
    fn test_trim_short_strings_other_vr_untouched() {
        let mut obj = InMemDicomObject::new_empty();
        let long_value = "A LONG STRING VALUE OF MORE THAN SIXTEEN CHARACTERS";
        obj.put(InMemElement::new(
            tags::STUDY_DESCRIPTION,
            VR::LO,
            Value::from(long_value),
        ));

        assert_eq!(trim_short_strings(&mut obj), 0);
        assert_eq!(
            obj.element(tags::STUDY_DESCRIPTION)
                .unwrap()
                .to_str()
                .unwrap(),
            long_value
        );
    }

    #[test]
    fn test_trim_short_strings_multiple_values() {
        let mut obj = InMemDicomObject::new_empty();
        obj.put(InMemElement::new(
            tags::ACCESSION_NUMBER,
            VR::SH,
            PrimitiveValue::Strs(
                ["SHORT".to_string(), "X".repeat(20)]
                    .into_iter()
                    .collect(),
            ),
        ));

        assert_eq!(trim_short_strings(&mut obj), 1);
        let value = obj.element(tags::ACCESSION_NUMBER).unwrap().value();
        assert_eq!(
            value,
            &Value::Primitive(PrimitiveValue::Strs(
                ["SHORT".to_string(), "X".repeat(16)].into_iter().collect()
            ))
        );
    }

    #[test]
    fn test_trim_short_strings_nested_sequence() {
        let mut inner = InMemDicomObject::new_empty();
        inner.put(sh(tags::CODE_VALUE, "CODE-VALUE-0123456789"));
        let mut item = InMemDicomObject::new_empty();
        item.put(sh(tags::REQUESTED_PROCEDURE_ID, "REQUESTED-PROCEDURE-1"));
        item.put(InMemElement::new(
            tags::REQUESTED_PROCEDURE_CODE_SEQUENCE,
            VR::SQ,
            Value::Sequence(DataSetSequence::new(vec![inner], Length::UNDEFINED)),
        ));

        let mut obj = InMemDicomObject::new_empty();
        obj.put(InMemElement::new(
            tags::REQUEST_ATTRIBUTES_SEQUENCE,
            VR::SQ,
            Value::Sequence(DataSetSequence::new(vec![item], Length::UNDEFINED)),
        ));

        assert_eq!(trim_short_strings(&mut obj), 2);

        let items = obj
            .element(tags::REQUEST_ATTRIBUTES_SEQUENCE)
            .unwrap()
            .items()
            .unwrap();
        assert_eq!(
            sh_value(&items[0], tags::REQUESTED_PROCEDURE_ID),
            "REQUESTED-PROCED"
        );
        let inner_items = items[0]
            .element(tags::REQUESTED_PROCEDURE_CODE_SEQUENCE)
            .unwrap()
            .items()
            .unwrap();
        assert_eq!(sh_value(&inner_items[0], tags::CODE_VALUE), "CODE-VALUE-01234");
    }

    #[test]
    fn test_transcode_implicit_to_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in");
        let dest = dir.path().join("out/PA00001/ST00001/SE00001/DI00001");
        let mut obj = make_object(
            uids::IMPLICIT_VR_LITTLE_ENDIAN,
            Some("PAT1"),
            Some("1.2.3"),
            Some("1.2.3.4"),
            "1.2.3.4.5",
        );
        obj.put(sh(tags::ACCESSION_NUMBER, "ACCESSION-NUMBER-1234"));
        write_object(&obj, &source);

        let report = transcode(&source, &dest).unwrap();
        assert_eq!(report.original_transfer_syntax, uids::IMPLICIT_VR_LITTLE_ENDIAN);
        assert_eq!(report.decompression, Decompression::NotNeeded);
        assert_eq!(report.trimmed_values, 1);

        let written = open_file(&dest).unwrap();
        assert_eq!(
            written.meta().transfer_syntax(),
            uids::EXPLICIT_VR_LITTLE_ENDIAN
        );
        assert_eq!(sh_value(&written, tags::ACCESSION_NUMBER), "ACCESSION-NUMBER");
        assert_eq!(sh_value(&written, tags::SOP_INSTANCE_UID), "1.2.3.4.5");
        assert_eq!(sh_value(&written, tags::PATIENT_ID), "PAT1");
    }

    #[test]
    fn test_transcode_explicit_stays_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in");
        let dest = dir.path().join("out");
        let obj = make_object(
            uids::EXPLICIT_VR_LITTLE_ENDIAN,
            Some("PAT1"),
            Some("1.2.3"),
            Some("1.2.3.4"),
            "1.2.3.4.5",
        );
        write_object(&obj, &source);

        let report = transcode(&source, &dest).unwrap();
        assert_eq!(report.decompression, Decompression::NotNeeded);
        assert_eq!(report.trimmed_values, 0);
        assert_eq!(
            open_file(&dest).unwrap().meta().transfer_syntax(),
            uids::EXPLICIT_VR_LITTLE_ENDIAN
        );
    }

    #[test]
    fn test_transcode_unreadable_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in");
        std::fs::write(&source, "not a DICOM file").unwrap();

        let result = transcode(&source, &dir.path().join("out"));
        assert!(matches!(result, Err(Error::ReadError(_))));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_has_encapsulated_pixel_data() {
        assert!(!has_encapsulated_pixel_data(uids::IMPLICIT_VR_LITTLE_ENDIAN));
        // Explicit VR Big Endian
        assert!(!has_encapsulated_pixel_data("1.2.840.10008.1.2.2"));
        assert!(has_encapsulated_pixel_data(JPEG_BASELINE));
        assert!(has_encapsulated_pixel_data("1.2.3.4.5.6"));
    }

    #[test]
    fn test_transcode_broken_compressed_pixel_data() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("in");
        let dest = dir.path().join("out");
        let obj = make_broken_jpeg_object(JPEG_BASELINE, "1.2.3.4.5");
        write_object(&obj, &source);

        let report = transcode(&source, &dest).unwrap();
        assert_eq!(report.original_transfer_syntax, JPEG_BASELINE);
        assert!(matches!(report.decompression, Decompression::Failed(_)));

        let written = open_file(&dest).unwrap();
        assert_eq!(
            written.meta().transfer_syntax(),
            uids::EXPLICIT_VR_LITTLE_ENDIAN
        );
        assert_eq!(sh_value(&written, tags::SOP_INSTANCE_UID), "1.2.3.4.5");
    }
}
