use anyhow::{Context, Result};
use clap::Parser;
use dicomdir_organizer::config::{Config, ConfigBuilder, SeriesCapacity};
use dicomdir_organizer::{OrganizeError, Organizer};
use env_logger::Builder;
use log::{error, Level, LevelFilter};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Sort unorganized DICOM files into a DICOMDIR-compliant structure and create a DICOMDIR file
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input directory containing unorganized DICOM files
    #[arg(short, long, value_name = "INPUT_DIR")]
    input: PathBuf,

    /// Output directory for the sorted DICOM files and the DICOMDIR file (must be empty)
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    output: PathBuf,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Maximum number of images per series folder (default: 1000)
    #[arg(short, long, value_name = "COUNT")]
    max_per_series: Option<usize>,

    /// Number of worker threads (default: number of CPUs)
    #[arg(short = 'j', long, value_name = "COUNT")]
    threads: Option<usize>,

    /// Program used to create the DICOMDIR file (default: 'dcmmkdir')
    #[arg(long, value_name = "PROGRAM", env = "DCMMKDIR")]
    dcmmkdir: Option<PathBuf>,

    /// Only sort the files, don't create a DICOMDIR file
    #[arg(long)]
    no_dicomdir: bool,

    /// Show more verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let log_level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    let mut builder = Builder::from_default_env();
    builder
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => "Error",
                Level::Warn => "Warning",
                Level::Info => "Info",
                Level::Debug => "Debug",
                Level::Trace => "Trace",
            };
            writeln!(buf, "{}: {}", level, record.args())
        })
        .filter(None, log_level);
    builder.init();
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config_builder = match &args.config {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let config: Config = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            ConfigBuilder::from_config(&config)
        }
        None => ConfigBuilder::new(),
    };

    if let Some(max_per_series) = args.max_per_series {
        config_builder = config_builder.series_capacity(SeriesCapacity::new(max_per_series)?);
    }

    if let Some(threads) = args.threads {
        config_builder = config_builder.threads(threads)?;
    }

    if let Some(program) = &args.dcmmkdir {
        config_builder = config_builder.index_builder_program(program);
    }

    if args.no_dicomdir {
        config_builder = config_builder.create_dicomdir(false);
    }

    Ok(config_builder.build())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let organizer = Organizer::new(config);
    match organizer.run(&args.input, &args.output) {
        Ok(summary) => {
            println!(
                "Sorted {} of {} files ({} duplicates skipped, {} failed) into {} series folders",
                summary.transcoded,
                summary.scanned_files,
                summary.duplicates,
                summary.failed,
                summary.series_folders
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            exit_code(&e)
        }
    }
}

fn exit_code(e: &OrganizeError) -> ExitCode {
    u8::try_from(e.exit_code())
        .map(ExitCode::from)
        .unwrap_or(ExitCode::FAILURE)
}
