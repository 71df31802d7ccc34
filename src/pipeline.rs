//! The expression matrix builder.
//!
//! For every run listed in the run table, the builder downloads the reads,
//! extracts them, and quantifies transcript abundance, one run at a time.
//! The read scratch directory is cleared whenever a run's iteration ends,
//! whether it succeeded or not, so at most one run's reads are ever on disk.
//! The per-run results are then assembled into an
//! [`ExpressionMatrix`](crate::matrix::ExpressionMatrix), after which
//! splicing events are generated from the annotation and PSI values are
//! computed against the matrix.
//!
//! All external programs go through a [`Runner`]; any step that fails aborts
//! the pipeline.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use nonempty::NonEmpty;
use regex::Regex;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::PipelineConfig;
use crate::matrix;
use crate::matrix::ExpressionMatrix;
use crate::quant;
use crate::table;
use crate::table::ColumnLookup;
use crate::table::Table;
use crate::tool;
use crate::tool::Invocation;
use crate::tool::Runner;
use crate::tool::Step;
use crate::tool::execute;

/// The shape of a sequence-archive run accession.
static ACCESSION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[SED]RR\d+$").unwrap());

/// The extension of extracted reads.
const FASTQ_EXTENSION: &str = "fastq";

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to the pipeline.
#[derive(Debug)]
pub enum Error {
    /// The run table could not be read or has no run column.
    RunTable(table::Error),

    /// A required input file does not exist.
    MissingFile(PathBuf),

    /// None of the candidate annotation files exist.
    MissingAnnotation(Vec<PathBuf>),

    /// A working directory could not be created.
    CreateDirectory(PathBuf, io::Error),

    /// An external tool failed.
    Tool(tool::Error),

    /// No quantification outputs were found.
    NoQuantOutputs(PathBuf),

    /// A quantification output could not be loaded.
    Quant(quant::Error),

    /// The matrix could not be assembled or written.
    Matrix(PathBuf, matrix::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::RunTable(err) => write!(f, "run table: {err}"),
            Error::MissingFile(path) => write!(f, "file not found: {}", path.display()),
            Error::MissingAnnotation(candidates) => write!(
                f,
                "annotation file not found (looked for {})",
                candidates
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" or ")
            ),
            Error::CreateDirectory(path, err) => {
                write!(f, "creating directory {}: {err}", path.display())
            }
            Error::Tool(err) => write!(f, "{err}"),
            Error::NoQuantOutputs(path) => write!(
                f,
                "no {} files found in {}; run quantification first",
                quant::QUANT_FILE_NAME,
                path.display()
            ),
            Error::Quant(err) => write!(f, "{err}"),
            Error::Matrix(path, err) => write!(f, "expression matrix {}: {err}", path.display()),
        }
    }
}

impl std::error::Error for Error {}

impl From<tool::Error> for Error {
    fn from(err: tool::Error) -> Self {
        Error::Tool(err)
    }
}

impl From<quant::Error> for Error {
    fn from(err: quant::Error) -> Self {
        Error::Quant(err)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Inputs
////////////////////////////////////////////////////////////////////////////////////////

/// Loads the run identifiers from a run table.
///
/// The delimiter is detected from the header line and the run column is
/// located with `lookup`. Blank cells are skipped.
pub fn load_run_ids(path: &Path, lookup: &ColumnLookup) -> Result<Vec<String>> {
    let table = Table::read(path, None).map_err(Error::RunTable)?;
    info!("columns in {}: {:?}", path.display(), table.headers());

    let column = table.resolve(lookup, path).map_err(Error::RunTable)?;
    let mut runs = Vec::with_capacity(table.len());

    for (row, value) in table.values(column).enumerate() {
        let Some(run) = value.map(str::trim).filter(|run| !run.is_empty()) else {
            warn!("row {} of {} has no run identifier; skipping", row + 1, path.display());
            continue;
        };

        if !ACCESSION.is_match(run) {
            warn!("`{run}` does not look like a run accession");
        }

        runs.push(run.to_string());
    }

    info!("found {} run identifiers: {runs:?}", runs.len());
    Ok(runs)
}

/// Picks the first annotation candidate that exists.
pub fn resolve_annotation(candidates: &[PathBuf]) -> Result<PathBuf> {
    candidates
        .iter()
        .find(|path| path.exists())
        .cloned()
        .ok_or_else(|| Error::MissingAnnotation(candidates.to_vec()))
}

/// Removes everything inside a directory, leaving the directory itself.
pub fn clear_directory(dir: &Path) -> io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }

    Ok(())
}

/// Clears the read scratch directory when dropped.
struct Scratch<'a>(&'a Path);

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        match clear_directory(self.0) {
            Ok(()) => debug!("cleared {}", self.0.display()),
            Err(err) => warn!("could not clear {}: {err}", self.0.display()),
        }
    }
}

/// The quantifier read arguments for a run.
///
/// Mate files `<run>_1.fastq` and `<run>_2.fastq` are passed as a pair;
/// otherwise `<run>.fastq` is passed as single-end reads.
fn read_args(reads: &Path, run: &str) -> Vec<OsString> {
    let first = reads.join(format!("{run}_1.{FASTQ_EXTENSION}"));
    let second = reads.join(format!("{run}_2.{FASTQ_EXTENSION}"));

    if first.is_file() && second.is_file() {
        vec![
            "-1".into(),
            first.into_os_string(),
            "-2".into(),
            second.into_os_string(),
        ]
    } else {
        vec![
            "-r".into(),
            reads
                .join(format!("{run}.{FASTQ_EXTENSION}"))
                .into_os_string(),
        ]
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Pipeline
////////////////////////////////////////////////////////////////////////////////////////

/// What a completed pipeline produced.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Summary {
    /// The runs that were quantified.
    pub runs: Vec<String>,

    /// The samples in the matrix, in column order.
    pub samples: Vec<String>,

    /// The number of transcripts in the matrix.
    pub transcripts: usize,

    /// Where the matrix was written.
    pub matrix: PathBuf,

    /// The annotation file events were generated from.
    pub annotation: PathBuf,

    /// The PSI tables that were written.
    pub psi: Vec<PathBuf>,
}

/// The expression matrix builder.
#[derive(Debug)]
pub struct Pipeline<'a, R> {
    /// The configuration.
    config: &'a PipelineConfig,

    /// The external tool runner.
    runner: R,
}

impl<'a, R> Pipeline<'a, R>
where
    R: Runner,
{
    /// Creates a new [`Pipeline`].
    pub fn new(config: &'a PipelineConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Consumes the pipeline and returns the runner.
    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Creates every working directory.
    pub fn prepare_directories(&self) -> Result<()> {
        let config = self.config;

        for dir in [&config.reads, &config.results, &config.events, &config.psi] {
            fs::create_dir_all(dir).map_err(|e| Error::CreateDirectory(dir.clone(), e))?;
        }

        Ok(())
    }

    /// Builds the quantifier index from the transcriptome.
    pub fn build_index(&mut self) -> Result<()> {
        let config = self.config;
        let invocation = Invocation::new(Step::BuildIndex, &config.tools.salmon)
            .args(["index", "--gencode", "-t"])
            .arg(&config.transcripts)
            .arg("-i")
            .arg(&config.index)
            .arg("-p")
            .arg(config.threads.to_string())
            .arg("-k")
            .arg(config.kmer_size.to_string());

        execute(&mut self.runner, invocation)?;
        Ok(())
    }

    /// Downloads, extracts and quantifies one run.
    ///
    /// The read scratch directory is cleared when this returns, on success
    /// and on failure. Returns the run's quantifier output directory.
    pub fn quantify(&mut self, run: &str) -> Result<PathBuf> {
        let config = self.config;
        let _scratch = Scratch(&config.reads);
        let output = quant::output_dir(&config.results, run);

        info!("processing {run}");

        execute(
            &mut self.runner,
            Invocation::new(Step::Download, &config.tools.prefetch)
                .for_run(run)
                .args(["-v", run, "-O"])
                .arg(&config.reads),
        )?;

        execute(
            &mut self.runner,
            Invocation::new(Step::Extract, &config.tools.fasterq_dump)
                .for_run(run)
                .arg(run)
                .arg("--split-3")
                .arg("-O")
                .arg(&config.reads),
        )?;

        execute(
            &mut self.runner,
            Invocation::new(Step::Quantify, &config.tools.salmon)
                .for_run(run)
                .arg("quant")
                .arg("-i")
                .arg(&config.index)
                .args(["-l", "A"])
                .args(read_args(&config.reads, run))
                .arg("-p")
                .arg(config.threads.to_string())
                .arg("--validateMappings")
                .arg("-o")
                .arg(&output),
        )?;

        Ok(output)
    }

    /// Collects every quantification output and assembles the matrix.
    pub fn assemble(&self) -> Result<ExpressionMatrix> {
        let results_dir = &self.config.results;
        let outputs = quant::discover(results_dir)?;
        info!("found {} {} files", outputs.len(), quant::QUANT_FILE_NAME);

        let results = outputs
            .iter()
            .map(|output| output.load())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let results =
            NonEmpty::from_vec(results).ok_or_else(|| Error::NoQuantOutputs(results_dir.clone()))?;

        ExpressionMatrix::assemble(results).map_err(|e| Error::Matrix(self.config.matrix.clone(), e))
    }

    /// Generates the splicing event definitions from an annotation file.
    pub fn generate_events(&mut self, annotation: &Path) -> Result<()> {
        let config = self.config;
        let invocation = Invocation::new(Step::GenerateEvents, &config.tools.suppa)
            .arg("generateEvents")
            .arg("-i")
            .arg(annotation)
            .arg("-o")
            .arg(config.events_prefix())
            .args(["-f", "ioe", "-e"])
            .args(&config.event_types);

        execute(&mut self.runner, invocation)?;
        Ok(())
    }

    /// Computes PSI values for every configured event type whose event
    /// definition file exists.
    ///
    /// Returns the PSI tables that were written.
    pub fn calculate_psi(&mut self) -> Result<Vec<PathBuf>> {
        let config = self.config;
        let mut written = Vec::new();

        for event_type in &config.psi_event_types {
            let ioe = config.ioe_file(event_type);

            if !ioe.exists() {
                warn!("no {event_type} event definitions at {}; skipping", ioe.display());
                continue;
            }

            let output = config.psi_file(event_type);
            let invocation = Invocation::new(Step::CalculatePsi, &config.tools.suppa)
                .arg("psiPerEvent")
                .arg("-i")
                .arg(&ioe)
                .arg("-e")
                .arg(&config.matrix)
                .arg("-o")
                .arg(&output);

            execute(&mut self.runner, invocation)?;
            written.push(output);
        }

        Ok(written)
    }

    /// Runs the whole pipeline.
    ///
    /// Every required input is checked before any directory or file is
    /// created.
    pub fn run(&mut self) -> Result<Summary> {
        let config = self.config;

        let runs = load_run_ids(&config.run_table, &config.run_lookup())?;

        if !config.transcripts.exists() {
            return Err(Error::MissingFile(config.transcripts.clone()));
        }

        let annotation = resolve_annotation(&config.annotations)?;

        self.prepare_directories()?;
        self.build_index()?;

        for run in &runs {
            self.quantify(run)?;
        }

        let matrix = self.assemble()?;
        matrix
            .write_to_path(&config.matrix)
            .map_err(|e| Error::Matrix(config.matrix.clone(), e))?;
        info!(
            "wrote {} transcripts x {} samples to {}",
            matrix.len(),
            matrix.samples().len(),
            config.matrix.display()
        );

        self.generate_events(&annotation)?;
        let psi = self.calculate_psi()?;

        Ok(Summary {
            runs,
            samples: matrix.samples().to_vec(),
            transcripts: matrix.len(),
            matrix: config.matrix.clone(),
            annotation,
            psi,
        })
    }
}
