//! Sort an unorganized tree of DICOM files into a DICOMDIR-compliant hierarchy.
//!
//! Files are grouped by patient, study and series, duplicates (same Series Instance UID and
//! SOP Instance UID) are dropped, and every surviving file is re-encoded as Explicit VR Little
//! Endian into
//!
//! ```text
//! <output>/PA00001/ST00001/SE00001/DI00001
//! ```
//!
//! Series with more instances than the configured capacity are split over several `SE` folders.
//! Finally, an external utility (`dcmmkdir` by default) is called to create the `DICOMDIR` file.
//!
//! # Example
//!
//! ```no_run
//! use dicomdir_organizer::config::{ConfigBuilder, SeriesCapacity};
//! use dicomdir_organizer::Organizer;
//!
//! let config = ConfigBuilder::new()
//!     .series_capacity(SeriesCapacity::new(500).unwrap())
//!     .build();
//! let organizer = Organizer::new(config);
//! let summary = organizer.run("unsorted".as_ref(), "sorted".as_ref()).unwrap();
//! println!("{} files written", summary.transcoded);
//! ```

pub mod allocator;
pub mod config;
pub mod dicomdir;
pub mod index;
pub mod organizer;
pub mod record;
pub mod scanner;
pub mod transcoder;
mod vr;

pub use dicom_core::Tag;
pub use dicom_dictionary_std::tags;
pub use organizer::{OrganizeError, Organizer, RunSummary};
