use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

const SERIES_CAPACITY_DEFAULT_VALUE: usize = 1000;
const SERIES_CAPACITY_MINIMUM: usize = 1;
const INDEX_BUILDER_DEFAULT_PROGRAM: &str = "dcmmkdir";

#[derive(Error, Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
#[error("{0}")]
pub struct SeriesCapacityError(String);

#[derive(Error, Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum ConfigError {
    #[error("invalid series capacity: {0}")]
    InvalidSeriesCapacity(String),

    #[error("invalid number of threads: {0}")]
    InvalidThreads(String),
}

impl From<SeriesCapacityError> for ConfigError {
    fn from(err: SeriesCapacityError) -> Self {
        ConfigError::InvalidSeriesCapacity(err.0)
    }
}

/// The maximum number of instances that go into a single series (`SE`) folder.
///
/// Series with more instances are split over multiple consecutive series folders.
///
/// # Example
///
/// ```
/// use dicomdir_organizer::config::SeriesCapacity;
///
/// let capacity = SeriesCapacity::new(250).unwrap();
/// assert_eq!(capacity.get(), 250);
///
/// // a series folder has to be able to hold at least one instance
/// assert!(SeriesCapacity::new(0).is_err());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
#[serde(try_from = "usize", into = "usize")]
pub struct SeriesCapacity(usize);

impl SeriesCapacity {
    pub fn new(capacity: usize) -> Result<Self, SeriesCapacityError> {
        if capacity < SERIES_CAPACITY_MINIMUM {
            return Err(SeriesCapacityError(format!(
                "series capacity must be at least {}",
                SERIES_CAPACITY_MINIMUM
            )));
        }
        Ok(SeriesCapacity(capacity))
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for SeriesCapacity {
    fn default() -> Self {
        SeriesCapacity(SERIES_CAPACITY_DEFAULT_VALUE)
    }
}

impl TryFrom<usize> for SeriesCapacity {
    type Error = SeriesCapacityError;

    fn try_from(value: usize) -> Result<Self, SeriesCapacityError> {
        SeriesCapacity::new(value)
    }
}

impl From<SeriesCapacity> for usize {
    fn from(capacity: SeriesCapacity) -> Self {
        capacity.0
    }
}

/// Settings for the external utility that creates the `DICOMDIR` file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IndexBuilderConfig {
    #[serde(default = "default_index_builder_program")]
    program: PathBuf,

    #[serde(default = "default_true")]
    enabled: bool,
}

fn default_index_builder_program() -> PathBuf {
    INDEX_BUILDER_DEFAULT_PROGRAM.into()
}

fn default_true() -> bool {
    true
}

impl IndexBuilderConfig {
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for IndexBuilderConfig {
    fn default() -> Self {
        Self {
            program: default_index_builder_program(),
            enabled: true,
        }
    }
}

/// Configuration for sorting DICOM files into a DICOMDIR hierarchy.
///
/// # Fields
///
/// * `series_capacity` - Maximum number of instances per series folder (default: `1000`)
/// * `index_builder` - Program used to create the `DICOMDIR` file, and whether to run it at all
/// * `threads` - Number of worker threads for reading and writing files (default: number of CPUs)
///
/// A [`Config`] can be deserialized from JSON, missing fields get their default value:
///
/// ```
/// use dicomdir_organizer::config::Config;
///
/// let config: Config = serde_json::from_str(r#"{"series_capacity": 500}"#).unwrap();
/// assert_eq!(config.get_series_capacity().get(), 500);
/// assert_eq!(config.get_index_builder().program().to_str(), Some("dcmmkdir"));
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    series_capacity: SeriesCapacity,

    #[serde(default)]
    index_builder: IndexBuilderConfig,

    #[serde(default)]
    threads: Option<usize>,
}

impl Config {
    pub fn get_series_capacity(&self) -> SeriesCapacity {
        self.series_capacity
    }

    pub fn get_index_builder(&self) -> &IndexBuilderConfig {
        &self.index_builder
    }

    pub fn get_threads(&self) -> Option<usize> {
        self.threads
    }
}

/// A builder for [`Config`].
///
/// # Example
///
/// ```
/// use dicomdir_organizer::config::{ConfigBuilder, SeriesCapacity};
///
/// let config = ConfigBuilder::new()
///     .series_capacity(SeriesCapacity::new(100).unwrap())
///     .index_builder_program("/opt/dcmtk/bin/dcmmkdir")
///     .threads(4)
///     .unwrap()
///     .build();
/// assert_eq!(config.get_series_capacity().get(), 100);
/// assert_eq!(config.get_threads(), Some(4));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigBuilder(Config);

impl ConfigBuilder {
    pub fn new() -> Self {
        ConfigBuilder(Config::default())
    }

    /// Start from an existing configuration, e.g. one loaded from a file, to override parts of it.
    pub fn from_config(config: &Config) -> Self {
        ConfigBuilder(config.clone())
    }

    pub fn series_capacity(mut self, capacity: SeriesCapacity) -> Self {
        self.0.series_capacity = capacity;
        self
    }

    pub fn index_builder_program<P: Into<PathBuf>>(mut self, program: P) -> Self {
        self.0.index_builder.program = program.into();
        self
    }

    /// Enable or disable the creation of the `DICOMDIR` file after sorting.
    pub fn create_dicomdir(mut self, enabled: bool) -> Self {
        self.0.index_builder.enabled = enabled;
        self
    }

    pub fn threads(mut self, threads: usize) -> Result<Self, ConfigError> {
        if threads == 0 {
            return Err(ConfigError::InvalidThreads(
                "number of threads must be at least 1".into(),
            ));
        }
        self.0.threads = Some(threads);
        Ok(self)
    }

    pub fn build(self) -> Config {
        self.0
    }
}
