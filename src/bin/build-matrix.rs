//! A binary to quantify every run of a run table, assemble the expression
//! matrix, and compute splicing-event PSI values.
//!
//! ```shell
//! cargo run --release --bin=build-matrix --features=binaries -- --directory data/
//! ```
//!
//! It achieves this by carrying out the following:
//!
//! * Building a [`salmon`] index from the transcriptome.
//! * For each run in `SraRunTable.txt`, downloading and extracting the reads
//!   with the [SRA Toolkit] and quantifying them with `salmon`. Only one run's
//!   reads are kept on disk at a time.
//! * Assembling every `results/<run>_quant/quant.sf` into
//!   `TPM_SUPPA2_final.tsv`.
//! * Generating splicing events from the annotation and computing PSI values
//!   with [`SUPPA2`].
//!
//! [`salmon`]: https://github.com/COMBINE-lab/salmon
//! [SRA Toolkit]: https://github.com/ncbi/sra-tools
//! [`SUPPA2`]: https://github.com/comprna/SUPPA

use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap_verbosity_flag::InfoLevel;
use clap_verbosity_flag::Verbosity;
use psiflow::Pipeline;
use psiflow::PipelineConfig;
use psiflow::config::DEFAULT_EVENT_TYPES;
use psiflow::config::DEFAULT_KMER_SIZE;
use psiflow::config::DEFAULT_PSI_EVENT_TYPES;
use psiflow::config::DEFAULT_THREADS;
use psiflow::tool::SystemRunner;
use tracing_log::AsTrace as _;
use tracing_subscriber::EnvFilter;

/// Builds a transcript expression matrix and splicing-event PSI values.
#[derive(Parser)]
struct Args {
    /// The working directory holding the inputs and receiving the outputs.
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// The run table (default: `<directory>/SraRunTable.txt`).
    #[arg(long)]
    run_table: Option<PathBuf>,

    /// Additional accepted names for the run column (`Run` is always
    /// accepted).
    #[arg(long = "run-column")]
    run_columns: Vec<String>,

    /// The transcriptome FASTA (default:
    /// `<directory>/gencode.v43.transcripts.fa.gz`).
    #[arg(long)]
    transcripts: Option<PathBuf>,

    /// The annotation file (default: `<directory>/gencode.v43.annotation.gtf`,
    /// falling back to its `.gz` counterpart).
    #[arg(long)]
    annotation: Option<PathBuf>,

    /// Where to write the expression matrix (default:
    /// `<directory>/TPM_SUPPA2_final.tsv`).
    #[arg(long)]
    matrix: Option<PathBuf>,

    /// The number of quantifier threads.
    #[arg(short, long, default_value_t = DEFAULT_THREADS)]
    threads: usize,

    /// The k-mer size of the quantifier index.
    #[arg(short, long, default_value_t = DEFAULT_KMER_SIZE)]
    kmer_size: usize,

    /// The splicing event types to generate.
    #[arg(long = "event-type", default_values = DEFAULT_EVENT_TYPES)]
    event_types: Vec<String>,

    /// The splicing event types to compute PSI values for.
    #[arg(long = "psi-event-type", default_values = DEFAULT_PSI_EVENT_TYPES)]
    psi_event_types: Vec<String>,

    /// The `salmon` executable.
    #[arg(long, default_value = "salmon")]
    salmon: PathBuf,

    /// The `prefetch` executable.
    #[arg(long, default_value = "prefetch")]
    prefetch: PathBuf,

    /// The `fasterq-dump` executable.
    #[arg(long, default_value = "fasterq-dump")]
    fasterq_dump: PathBuf,

    /// The `suppa.py` executable.
    #[arg(long, default_value = "suppa.py")]
    suppa: PathBuf,

    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

impl Args {
    /// Builds the stage configuration.
    fn config(&self) -> Result<PipelineConfig> {
        let directory = match &self.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("getting the working directory")?,
        };

        let mut config = PipelineConfig::in_directory(directory);

        if let Some(path) = &self.run_table {
            config.run_table = path.clone();
        }

        if let Some(path) = &self.transcripts {
            config.transcripts = path.clone();
        }

        if let Some(path) = &self.annotation {
            config.annotations = vec![path.clone()];
        }

        if let Some(path) = &self.matrix {
            config.matrix = path.clone();
        }

        config.run_columns.extend(self.run_columns.iter().cloned());
        config.threads = self.threads;
        config.kmer_size = self.kmer_size;
        config.event_types = self.event_types.clone();
        config.psi_event_types = self.psi_event_types.clone();

        config.tools.salmon = self.salmon.clone();
        config.tools.prefetch = self.prefetch.clone();
        config.tools.fasterq_dump = self.fasterq_dump.clone();
        config.tools.suppa = self.suppa.clone();

        Ok(config)
    }
}

fn build(args: &Args) -> Result<()> {
    let config = args.config()?;

    let summary = Pipeline::new(&config, SystemRunner)
        .run()
        .context("building the expression matrix")?;

    println!(
        "Quantified {} runs; {} created with {} transcripts across {} samples.",
        summary.runs.len(),
        summary.matrix.display(),
        summary.transcripts,
        summary.samples.len()
    );
    println!("Events generated from {}.", summary.annotation.display());

    if summary.psi.is_empty() {
        println!("No PSI tables were written.");
    }

    for path in &summary.psi {
        println!("PSI values written to {}.", path.display());
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.threads > 0, "`threads` must be greater than 0");

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    build(&args)
}
