use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use federation_census::aggregate::{self, OrganizationAggregator};
use federation_census::config::{self, Config};
use federation_census::models::{Bucket, FileOutcome};
use federation_census::report::{self, OutputFormat};
use federation_census::workbook;

#[derive(Parser)]
#[command(name = "federation-census")]
#[command(about = "Consolidates club membership workbooks into the federation's annual census", long_about = None)]
struct Cli {
    /// Config file (defaults to ./federation-census.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every workbook in a directory into one report
    Process {
        #[arg(long, default_value = "uploads")]
        input_dir: PathBuf,
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,
        /// Reference date for member ages (YYYY-MM-DD)
        #[arg(long, env = "CENSUS_CUTOFF")]
        cutoff: Option<NaiveDate>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
        format: OutputFormat,
    },
    /// Run one workbook through the pipeline and print its figures
    Check {
        file: PathBuf,
        #[arg(long, env = "CENSUS_CUTOFF")]
        cutoff: Option<NaiveDate>,
    },
    /// Write a config file with the default settings
    InitConfig {
        #[arg(long, default_value = config::CONFIG_FILE)]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Process {
            input_dir,
            out_dir,
            cutoff,
            format,
        } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(cutoff) = cutoff {
                config.report.cutoff = cutoff;
            }
            process(&config, &input_dir, &out_dir, format)?;
        }
        Commands::Check { file, cutoff } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(cutoff) = cutoff {
                config.report.cutoff = cutoff;
            }
            check(&config, &file)?;
        }
        Commands::InitConfig { out, force } => {
            if out.exists() && !force {
                anyhow::bail!("{} already exists, pass --force to overwrite", out.display());
            }
            std::fs::write(&out, Config::default_toml()?)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Default config written to {}.", out.display());
        }
    }

    Ok(())
}

fn process(
    config: &Config,
    input_dir: &Path,
    out_dir: &Path,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let run_id = Uuid::new_v4();
    let paths = workbook::list_workbooks(input_dir)?;
    let aggregator = OrganizationAggregator::from_config(config);
    info!(
        %run_id,
        files = paths.len(),
        cutoff = %aggregator.reference_date(),
        "Processing batch"
    );

    let outcomes = paths.iter().map(|path| {
        match workbook::load_submission(path, &config.roster.sheet, &config.metadata.sheet) {
            Ok(submission) => aggregator.process_file(&submission),
            Err(error) => {
                let filename = workbook::file_name(path);
                warn!(%run_id, file = %filename, error = %error, "Workbook unreadable");
                FileOutcome::Failure {
                    filename,
                    message: error.to_string(),
                }
            }
        }
    });
    let (rows, errors) = aggregate::collect(outcomes);

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;
    let (report_name, log_name) =
        report::output_file_names(&Local::now(), &config.report.report_stem, format);
    let report_path = out_dir.join(report_name);
    let log_path = out_dir.join(log_name);

    let file = File::create(&report_path)
        .with_context(|| format!("failed to create {}", report_path.display()))?;
    let mut writer = BufWriter::new(file);
    report::write_table(&mut writer, &rows, format)?;
    writer
        .flush()
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    std::fs::write(&log_path, report::build_error_report(&errors))
        .with_context(|| format!("failed to write {}", log_path.display()))?;

    info!(
        %run_id,
        clubs = rows.len(),
        failed = errors.len(),
        active = rows.iter().map(|row| row.club.counts.total(Bucket::Total)).sum::<u32>(),
        "Batch complete"
    );
    println!("Processed {} of {} workbooks.", rows.len(), paths.len());
    println!("Report written to {}.", report_path.display());
    println!("Error log written to {}.", log_path.display());

    Ok(())
}

fn check(config: &Config, path: &Path) -> anyhow::Result<()> {
    let aggregator = OrganizationAggregator::from_config(config);
    let loaded = workbook::load_submission(path, &config.roster.sheet, &config.metadata.sheet);
    let outcome = match loaded {
        Ok(submission) => aggregator.process_file(&submission),
        Err(error) => FileOutcome::Failure {
            filename: workbook::file_name(path),
            message: error.to_string(),
        },
    };

    match outcome {
        FileOutcome::Success(club) => {
            print!("{}", report::build_club_summary(&club));
            Ok(())
        }
        FileOutcome::Failure { filename, message } => anyhow::bail!("{filename}: {message}"),
    }
}
