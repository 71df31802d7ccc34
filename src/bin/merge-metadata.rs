//! A binary to merge run-level metadata with condition and grade annotations
//! and select the runs of a cohort.
//!
//! ```shell
//! cargo run --release --bin=merge-metadata --features=binaries -- --directory data/
//! ```
//!
//! With no options, the inputs and outputs are the conventional files of the
//! current working directory:
//!
//! * `SraRunTable.csv` and `GSE181294_conditions.csv` are read and merged.
//! * `merged_SRA_GEO.csv` receives the merged table.
//! * `selected_SRR_ids.txt` receives the selected runs, if there are any.

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::InfoLevel;
use clap_verbosity_flag::Verbosity;
use psiflow::MergeConfig;
use psiflow::metadata;
use psiflow::metadata::Predicate;
use psiflow::metadata::selection::DEFAULT_CONDITION;
use psiflow::metadata::selection::DEFAULT_GRADE;
use tracing_log::AsTrace as _;
use tracing_subscriber::EnvFilter;

/// Merges sample metadata and selects the runs of a cohort.
#[derive(Parser)]
struct Args {
    /// The working directory holding the inputs and receiving the outputs.
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// The run-level metadata table (default: `<directory>/SraRunTable.csv`).
    #[arg(long)]
    run_table: Option<PathBuf>,

    /// The condition and grade annotation table (default:
    /// `<directory>/GSE181294_conditions.csv`).
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Where to write the merged table (default:
    /// `<directory>/merged_SRA_GEO.csv`).
    #[arg(long)]
    merged: Option<PathBuf>,

    /// Where to write the selected runs (default:
    /// `<directory>/selected_SRR_ids.txt`).
    #[arg(long)]
    selection: Option<PathBuf>,

    /// The condition a run must have to be selected.
    #[arg(long, default_value = DEFAULT_CONDITION)]
    condition: String,

    /// The grade a run must have to be selected.
    #[arg(long, default_value = DEFAULT_GRADE)]
    grade: String,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

impl Args {
    /// Builds the stage configuration.
    fn config(&self) -> Result<MergeConfig> {
        let directory = match &self.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("getting the working directory")?,
        };

        let mut config = MergeConfig::in_directory(directory);

        if let Some(path) = &self.run_table {
            config.run_table = path.clone();
        }

        if let Some(path) = &self.annotations {
            config.annotations = path.clone();
        }

        if let Some(path) = &self.merged {
            config.merged = path.clone();
        }

        if let Some(path) = &self.selection {
            config.selection = path.clone();
        }

        config.predicate = Predicate::new(self.condition.clone(), self.grade.clone());
        Ok(config)
    }
}

fn merge(args: &Args) -> Result<()> {
    let config = args.config()?;
    let report = metadata::run(&config).context("merging metadata")?;

    println!("Merge complete.");
    println!("Total samples: {}", report.merged.len());
    println!("Condition distribution:");
    println!("{}", report.conditions);
    println!("Grade distribution:");
    println!("{}", report.grades);
    println!();
    println!("Saved merged metadata to: {}", report.merged_path.display());

    match &report.selection_path {
        None => {
            println!();
            println!("No runs found for {}.", config.predicate);
        }
        Some(path) => {
            println!();
            println!(
                "Found {} runs for {}:",
                report.selection.len(),
                config.predicate
            );

            for run in report.selection.iter() {
                println!("  {run}");
            }

            println!();
            println!("Saved run list to {}", path.display());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    merge(&args)
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn test_reports_at_info_by_default() {
        let args = Args::parse_from(["merge-metadata"]);
        assert_eq!(args.verbose.log_level_filter().as_trace(), LevelFilter::INFO);

        let args = Args::parse_from(["merge-metadata", "-q"]);
        assert_eq!(args.verbose.log_level_filter().as_trace(), LevelFilter::WARN);
    }
}
