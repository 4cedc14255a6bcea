use log::info;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

/// Name of the index file created in the output root.
pub const DICOMDIR_FILE_NAME: &str = "DICOMDIR";

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("failed to start {program}: {message}")]
    SpawnError { program: String, message: String },

    #[error("{program} exited with {status}")]
    ExitStatusError { program: String, status: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Creates a `DICOMDIR` file for a directory of sorted DICOM files.
pub trait IndexBuilder: Sync {
    fn build(&self, root: &Path) -> Result<()>;
}

/// [`IndexBuilder`] that runs DCMTK's `dcmmkdir`.
///
/// The files below the root are added recursively, using the general purpose profile. An existing
/// `DICOMDIR` is replaced and missing type 1 attributes are invented.
#[derive(Debug, Clone, PartialEq)]
pub struct Dcmmkdir {
    program: PathBuf,
}

impl Dcmmkdir {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn arguments(root: &Path) -> Vec<OsString> {
        vec![
            "+r".into(),
            "+id".into(),
            root.into(),
            "+D".into(),
            root.join(DICOMDIR_FILE_NAME).into(),
            "-Pgp".into(),
            "-A".into(),
            "+I".into(),
        ]
    }
}

impl Default for Dcmmkdir {
    fn default() -> Self {
        Self::new("dcmmkdir")
    }
}

impl IndexBuilder for Dcmmkdir {
    fn build(&self, root: &Path) -> Result<()> {
        let program = self.program.display().to_string();
        let args = Self::arguments(root);
        info!(
            "Running {} {}",
            program,
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(|e| Error::SpawnError {
                program: program.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(Error::ExitStatusError {
                program,
                status: status.to_string(),
            });
        }

        info!(
            "DICOMDIR created successfully at {}",
            root.join(DICOMDIR_FILE_NAME).display()
        );
        Ok(())
    }
}
