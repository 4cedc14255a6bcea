use crate::allocator::{allocate, AllocationPlan};
use crate::config::Config;
use crate::dicomdir::{self, Dcmmkdir, IndexBuilder};
use crate::record::{DicomRecordReader, RecordReader};
use crate::scanner::scan;
use crate::transcoder::{self, Decompression};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum OrganizeError {
    #[error("Output directory '{0}' must be empty")]
    OutputNotEmpty(String),

    #[error("No valid DICOM files found in '{0}'")]
    NoValidRecords(String),

    #[error("Failed to create DICOMDIR: {0}")]
    IndexBuilderError(#[from] dicomdir::Error),

    #[error("Input directory '{0}' does not exist or is not a directory")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Failed to start worker threads: {0}")]
    ThreadPoolError(String),
}

impl OrganizeError {
    /// Process exit code for this error.
    ///
    /// | error                 | code |
    /// |-----------------------|------|
    /// | output not empty      | 2    |
    /// | no valid DICOM files  | 3    |
    /// | DICOMDIR not created  | 4    |
    /// | anything else         | 1    |
    pub fn exit_code(&self) -> i32 {
        match self {
            OrganizeError::OutputNotEmpty(_) => 2,
            OrganizeError::NoValidRecords(_) => 3,
            OrganizeError::IndexBuilderError(_) => 4,
            OrganizeError::InvalidInput(_)
            | OrganizeError::IoError(_)
            | OrganizeError::ThreadPoolError(_) => 1,
        }
    }
}

pub type Result<T, E = OrganizeError> = std::result::Result<T, E>;

/// Counts gathered during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub scanned_files: usize,
    pub valid_records: usize,
    pub duplicates: usize,
    pub patients: usize,
    pub series_folders: usize,
    pub transcoded: usize,
    pub failed: usize,
    pub decompression_failures: usize,
    pub trimmed_values: usize,
    pub dicomdir_created: bool,
}

/// Sorts a tree of DICOM files into a DICOMDIR hierarchy.
///
/// A run goes through these phases, each one finished before the next starts:
/// 1. make sure the output directory is empty (or create it)
/// 2. read all files in the input directory in parallel and group them, dropping duplicates
/// 3. allocate the `PA`/`ST`/`SE`/`DI` codes for every file
/// 4. write every file to its new location in parallel, as Explicit VR Little Endian
/// 5. create the `DICOMDIR` file
///
/// Files that can't be read or written are logged and skipped; only an output directory that is
/// not empty, an input without any DICOM files and a failure to create the `DICOMDIR` stop the run.
pub struct Organizer {
    config: Config,
    reader: Box<dyn RecordReader>,
    index_builder: Box<dyn IndexBuilder>,
}

impl Organizer {
    pub fn new(config: Config) -> Self {
        let index_builder = Dcmmkdir::new(config.get_index_builder().program().clone());
        Self {
            config,
            reader: Box::new(DicomRecordReader::new()),
            index_builder: Box::new(index_builder),
        }
    }

    pub fn with_reader<R: RecordReader + 'static>(mut self, reader: R) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_index_builder<B: IndexBuilder + 'static>(mut self, index_builder: B) -> Self {
        self.index_builder = Box::new(index_builder);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self, input: &Path, output: &Path) -> Result<RunSummary> {
        info!("Input directory: {}", input.display());
        info!("Output directory: {}", output.display());

        if !input.is_dir() {
            return Err(OrganizeError::InvalidInput(input.display().to_string()));
        }
        prepare_output_dir(output)?;

        let pool = self.thread_pool()?;

        let report = pool.install(|| scan(input, self.reader.as_ref()));
        if report.index.is_empty() {
            return Err(OrganizeError::NoValidRecords(input.display().to_string()));
        }

        let plan = allocate(&report.index, self.config.get_series_capacity());
        log_plan(&plan);

        let mut summary = RunSummary {
            scanned_files: report.total_files,
            valid_records: report.valid_records,
            duplicates: report.duplicates,
            patients: report.index.patient_count(),
            series_folders: plan.series_folders().len(),
            ..Default::default()
        };

        pool.install(|| transcode_all(&plan, output, &mut summary));
        info!(
            "Converted {} files to Explicit VR Little Endian, {} failed.",
            summary.transcoded, summary.failed
        );

        if self.config.get_index_builder().is_enabled() {
            self.index_builder.build(output)?;
            summary.dicomdir_created = true;
        } else {
            info!("Skipping creation of DICOMDIR");
        }

        Ok(summary)
    }

    fn thread_pool(&self) -> Result<ThreadPool> {
        // zero lets rayon pick the number of threads
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.get_threads().unwrap_or(0))
            .build()
            .map_err(|e| OrganizeError::ThreadPoolError(e.to_string()))
    }
}

/// Create the output directory if it does not exist yet, or make sure it is empty.
pub fn prepare_output_dir(output: &Path) -> Result<()> {
    if output.exists() {
        let mut entries = fs::read_dir(output)
            .map_err(|e| OrganizeError::IoError(format!("{}: {}", output.display(), e)))?;
        if entries.next().is_some() {
            error!("Output directory '{}' is not empty.", output.display());
            return Err(OrganizeError::OutputNotEmpty(output.display().to_string()));
        }
    } else {
        fs::create_dir_all(output)
            .map_err(|e| OrganizeError::IoError(format!("{}: {}", output.display(), e)))?;
        info!("Created output directory: {}", output.display());
    }
    Ok(())
}

fn log_plan(plan: &AllocationPlan) {
    for folder in plan.series_folders() {
        debug!(
            "{}/{}/{}: {} files of patient {}, study {}, series {} (part {})",
            folder.patient,
            folder.study,
            folder.series,
            folder.instance_count,
            folder.patient_id,
            folder.study_instance_uid,
            folder.series_instance_uid,
            folder.split_index + 1
        );
    }
    info!(
        "Allocated {} files to {} series folders.",
        plan.len(),
        plan.series_folders().len()
    );
}

fn transcode_all(plan: &AllocationPlan, output: &Path, summary: &mut RunSummary) {
    let results: Vec<_> = plan
        .placements()
        .par_iter()
        .map(|placement| {
            let dest = placement.destination(output);
            let result = transcoder::transcode(&placement.source, &dest);
            if let Err(e) = &result {
                error!(
                    "Error converting file {} to explicit VR: {}",
                    placement.source.display(),
                    e
                );
            }
            result
        })
        .collect();

    for result in results {
        match result {
            Ok(report) => {
                summary.transcoded += 1;
                summary.trimmed_values += report.trimmed_values;
                if let Decompression::Failed(_) = report.decompression {
                    summary.decompression_failures += 1;
                }
            }
            Err(_) => summary.failed += 1,
        }
    }

    if summary.decompression_failures > 0 {
        warn!(
            "{} files could not be decompressed and were written with their original pixel data",
            summary.decompression_failures
        );
    }
}
