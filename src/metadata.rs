//! Merging run-level metadata with condition and grade annotations.
//!
//! The merger performs a left join of a run table (one row per sequencing
//! run) with an annotation table (one row per sample) on the sample
//! identifier. Every run-table row is preserved, in order; runs whose sample
//! has no annotation carry missing condition and grade values. From the
//! merged rows, a [`RunSelection`] of the runs matching a [`Predicate`] is
//! derived.
//!
//! ```
//! use std::path::Path;
//!
//! use psiflow::metadata;
//! use psiflow::metadata::Predicate;
//! use psiflow::metadata::RunSelection;
//! use psiflow::table::Delimiter;
//! use psiflow::table::Table;
//!
//! let source = Path::new("<memory>");
//! let runs = "Run,Sample\nSRR1,\"GSM1 \"\nSRR2,GSM2\n";
//! let annotations = "Sample,Condition,Grade\nGSM1,tumor,high\n";
//!
//! let runs = Table::from_reader(runs.as_bytes(), Delimiter::Comma, source)?;
//! let annotations = Table::from_reader(annotations.as_bytes(), Delimiter::Comma, source)?;
//!
//! let merged = metadata::merge(&runs, &annotations, source, source)?;
//! assert_eq!(merged.len(), 2);
//!
//! let selection = RunSelection::select(&merged, &Predicate::default());
//! assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["SRR1"]);
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;

use crate::config::MergeConfig;
use crate::table;
use crate::table::Delimiter;
use crate::table::Table;
use crate::table::normalize_identifier;

pub mod distribution;
pub mod selection;

pub use distribution::Distribution;
pub use selection::Predicate;
pub use selection::RunSelection;

/// The name of the join key column.
pub const SAMPLE_COLUMN: &str = "Sample";

/// The name of the run identifier column.
pub const RUN_COLUMN: &str = "Run";

/// The name of the condition column.
pub const CONDITION_COLUMN: &str = "Condition";

/// The name of the grade column.
pub const GRADE_COLUMN: &str = "Grade";

/// The suffix given to a run-table column whose name also appears in the
/// annotation table.
const LEFT_SUFFIX: &str = "_x";

/// The suffix given to an annotation-table column whose name also appears in
/// the run table.
const RIGHT_SUFFIX: &str = "_y";

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to merging metadata.
#[derive(Debug)]
pub enum Error {
    /// A table could not be read or a column could not be found.
    Table(table::Error),

    /// The selection list could not be written.
    WriteSelection(PathBuf, io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Table(err) => write!(f, "{err}"),
            Error::WriteSelection(path, err) => {
                write!(f, "writing selection to {}: {err}", path.display())
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<table::Error> for Error {
    fn from(err: table::Error) -> Self {
        Error::Table(err)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Merged metadata
////////////////////////////////////////////////////////////////////////////////////////

/// A view of one merged row.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SampleRecord<'a> {
    /// The normalized sample identifier.
    sample: Option<&'a str>,

    /// The run identifier.
    run: Option<&'a str>,

    /// The condition label.
    condition: Option<&'a str>,

    /// The grade label.
    grade: Option<&'a str>,
}

impl<'a> SampleRecord<'a> {
    /// Gets the normalized sample identifier.
    pub fn sample(&self) -> Option<&'a str> {
        self.sample
    }

    /// Gets the run identifier.
    pub fn run(&self) -> Option<&'a str> {
        self.run
    }

    /// Gets the condition label.
    pub fn condition(&self) -> Option<&'a str> {
        self.condition
    }

    /// Gets the grade label.
    pub fn grade(&self) -> Option<&'a str> {
        self.grade
    }
}

/// The merged metadata table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Merged {
    /// The merged rows.
    table: Table,

    /// The index of the sample column.
    sample: usize,

    /// The index of the run column.
    run: usize,

    /// The index of the condition column.
    condition: usize,

    /// The index of the grade column.
    grade: usize,
}

impl Merged {
    /// Wraps an already merged table, locating its key columns.
    ///
    /// Key columns are matched by exact name, so differently cased attribute
    /// columns are carried along untouched.
    ///
    /// `source` only labels diagnostics.
    pub fn from_table(table: Table, source: &Path) -> Result<Self> {
        let sample = table.require(SAMPLE_COLUMN, source)?;
        let run = table.require(RUN_COLUMN, source)?;
        let condition = table.require(CONDITION_COLUMN, source)?;
        let grade = table.require(GRADE_COLUMN, source)?;

        Ok(Self {
            table,
            sample,
            run,
            condition,
            grade,
        })
    }

    /// Gets the underlying table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Gets the number of merged rows.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns whether there are no merged rows.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Iterates over the merged rows.
    pub fn records(&self) -> impl Iterator<Item = SampleRecord<'_>> + '_ {
        (0..self.table.len()).map(move |row| SampleRecord {
            sample: self.table.get(row, self.sample),
            run: self.table.get(row, self.run),
            condition: self.table.get(row, self.condition),
            grade: self.table.get(row, self.grade),
        })
    }

    /// Tallies the condition column.
    pub fn condition_distribution(&self) -> Distribution {
        Distribution::tally(
            self.table.headers()[self.condition].as_str(),
            self.table.values(self.condition),
        )
    }

    /// Tallies the grade column.
    pub fn grade_distribution(&self) -> Distribution {
        Distribution::tally(
            self.table.headers()[self.grade].as_str(),
            self.table.values(self.grade),
        )
    }

    /// Writes the merged table as comma-separated values.
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        self.table
            .write_to_path(path, Delimiter::Comma)
            .map_err(Error::Table)
    }
}

/// Normalizes the sample column of a row in place and returns the join key.
fn normalize_key(row: &mut [Option<String>], column: usize) -> String {
    let key = normalize_identifier(row[column].as_deref().unwrap_or_default());
    row[column] = if key.is_empty() {
        None
    } else {
        Some(key.clone())
    };
    key
}

/// Left joins `runs` with `annotations` on the sample identifier.
///
/// Sample identifiers in both tables are normalized with
/// [`normalize_identifier`] before comparison, and the merged table carries
/// the normalized values. Every row of `runs` appears in the output in its
/// original order; a row whose sample matches several annotation rows is
/// repeated once per match. `runs_source` and `annotations_source` only label
/// diagnostics.
pub fn merge(
    runs: &Table,
    annotations: &Table,
    runs_source: &Path,
    annotations_source: &Path,
) -> Result<Merged> {
    let left_key = runs.require(SAMPLE_COLUMN, runs_source)?;
    let right_key = annotations.require(SAMPLE_COLUMN, annotations_source)?;

    let right_columns = (0..annotations.headers().len())
        .filter(|column| *column != right_key)
        .collect::<Vec<_>>();

    let left_names = runs
        .headers()
        .iter()
        .enumerate()
        .filter(|(column, _)| *column != left_key)
        .map(|(_, name)| name.as_str())
        .collect::<HashSet<_>>();
    let right_names = right_columns
        .iter()
        .map(|column| annotations.headers()[*column].as_str())
        .collect::<HashSet<_>>();

    let mut headers = runs
        .headers()
        .iter()
        .enumerate()
        .map(|(column, name)| {
            if column != left_key && right_names.contains(name.as_str()) {
                format!("{name}{LEFT_SUFFIX}")
            } else {
                name.clone()
            }
        })
        .collect::<Vec<_>>();

    headers.extend(right_columns.iter().map(|column| {
        let name = &annotations.headers()[*column];
        if left_names.contains(name.as_str()) {
            format!("{name}{RIGHT_SUFFIX}")
        } else {
            name.clone()
        }
    }));

    let mut index = HashMap::<String, Vec<usize>>::new();
    for (i, row) in annotations.rows().iter().enumerate() {
        let key = normalize_identifier(row[right_key].as_deref().unwrap_or_default());
        index.entry(key).or_default().push(i);
    }

    let mut rows = Vec::with_capacity(runs.len());

    for row in runs.rows() {
        let mut left = row.clone();
        let key = normalize_key(&mut left, left_key);

        match index.get(&key) {
            Some(matches) => {
                for i in matches {
                    let right = &annotations.rows()[*i];
                    let mut merged = left.clone();
                    merged.extend(right_columns.iter().map(|column| right[*column].clone()));
                    rows.push(merged);
                }
            }
            None => {
                left.extend(right_columns.iter().map(|_| None));
                rows.push(left);
            }
        }
    }

    Merged::from_table(Table::new(headers, rows), runs_source)
}

////////////////////////////////////////////////////////////////////////////////////////
// Stage
////////////////////////////////////////////////////////////////////////////////////////

/// The outcome of running the merger.
#[derive(Clone, Debug)]
pub struct Report {
    /// The merged metadata.
    pub merged: Merged,

    /// Where the merged metadata was written.
    pub merged_path: PathBuf,

    /// The distribution of conditions.
    pub conditions: Distribution,

    /// The distribution of grades.
    pub grades: Distribution,

    /// The selected runs.
    pub selection: RunSelection,

    /// Where the selection was written, if anything was selected.
    pub selection_path: Option<PathBuf>,
}

/// Runs the metadata merger.
///
/// Both inputs are checked before anything is written. The selection file
/// is only written when at least one run is selected.
pub fn run(config: &MergeConfig) -> Result<Report> {
    for path in [&config.run_table, &config.annotations] {
        if !path.exists() {
            return Err(Error::Table(table::Error::MissingFile(path.clone())));
        }
    }

    let runs = Table::read(&config.run_table, Some(Delimiter::Comma))?;
    let annotations = Table::read(&config.annotations, Some(Delimiter::Comma))?;

    let merged = merge(&runs, &annotations, &config.run_table, &config.annotations)?;
    info!("merged {} run rows with sample annotations", merged.len());

    let conditions = merged.condition_distribution();
    let grades = merged.grade_distribution();

    merged.write_to_path(&config.merged)?;
    info!("saved merged metadata to {}", config.merged.display());

    let selection = RunSelection::select(&merged, &config.predicate);

    let selection_path = if selection.is_empty() {
        info!("no runs found for {}", config.predicate);
        None
    } else {
        selection
            .write_to_path(&config.selection)
            .map_err(|e| Error::WriteSelection(config.selection.clone(), e))?;
        info!(
            "saved {} selected runs to {}",
            selection.len(),
            config.selection.display()
        );
        Some(config.selection.clone())
    };

    Ok(Report {
        merged,
        merged_path: config.merged.clone(),
        conditions,
        grades,
        selection,
        selection_path,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempdir::TempDir;

    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn table(data: &str) -> Table {
        Table::from_reader(data.as_bytes(), Delimiter::Comma, Path::new("<memory>")).unwrap()
    }

    fn join(runs: &str, annotations: &str) -> Merged {
        let source = Path::new("<memory>");
        merge(&table(runs), &table(annotations), source, source).unwrap()
    }

    #[test]
    fn test_left_join_preserves_every_run_row() {
        let merged = join(
            "Run,Sample,Assay Type\n\
             SRR1,GSM1,RNA-Seq\n\
             SRR2,GSM9,RNA-Seq\n\
             SRR3,GSM2,RNA-Seq\n",
            "Sample,Condition,Grade\n\
             GSM2,normal,low\n\
             GSM1,tumor,high\n",
        );

        assert_eq!(merged.len(), 3);
        assert_eq!(
            merged.table().headers(),
            &["Run", "Sample", "Assay Type", "Condition", "Grade"]
        );

        let records = merged.records().collect::<Vec<_>>();
        assert_eq!(
            records.iter().map(|r| r.sample()).collect::<Vec<_>>(),
            vec![Some("GSM1"), Some("GSM9"), Some("GSM2")]
        );
        assert_eq!(records[0].condition(), Some("tumor"));
        assert_eq!(records[1].condition(), None);
        assert_eq!(records[1].grade(), None);
        assert_eq!(records[2].grade(), Some("low"));
    }

    #[test]
    fn test_quoted_and_padded_samples_join() {
        let merged = join(
            "Run,Sample\n\
             SRR1,\"GSM123 \"\n\
             SRR2,GSM123\n\
             SRR3,\"\"\"GSM123\"\"\"\n",
            "Sample,Condition,Grade\n\
             \" GSM123\",tumor,high\n",
        );

        for record in merged.records() {
            assert_eq!(record.sample(), Some("GSM123"));
            assert_eq!(record.condition(), Some("tumor"));
        }
    }

    #[test]
    fn test_duplicate_annotations_multiply_rows() {
        let merged = join(
            "Run,Sample\nSRR1,GSM1\nSRR2,GSM2\n",
            "Sample,Condition,Grade\nGSM1,tumor,high\nGSM1,tumor,low\n",
        );

        let records = merged.records().collect::<Vec<_>>();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].grade(), Some("high"));
        assert_eq!(records[1].grade(), Some("low"));
        assert_eq!(records[2].run(), Some("SRR2"));
    }

    #[test]
    fn test_overlapping_columns_are_suffixed() {
        let source = Path::new("<memory>");
        let merged = merge(
            &table("Run,Sample,Tissue\nSRR1,GSM1,prostate\n"),
            &table("Sample,Condition,Grade,Tissue\nGSM1,tumor,high,gland\n"),
            source,
            source,
        )
        .unwrap();

        assert_eq!(
            merged.table().headers(),
            &["Run", "Sample", "Tissue_x", "Condition", "Grade", "Tissue_y"]
        );
    }

    #[test]
    fn test_differently_cased_columns_are_plain_attributes() {
        let merged = join(
            "Run,Sample,condition,grade\nSRR1,GSM1,cancer,G3\n",
            "Sample,Condition,Grade\nGSM1,tumor,high\n",
        );

        assert_eq!(
            merged.table().headers(),
            &["Run", "Sample", "condition", "grade", "Condition", "Grade"]
        );

        let records = merged.records().collect::<Vec<_>>();
        assert_eq!(records[0].condition(), Some("tumor"));
        assert_eq!(records[0].grade(), Some("high"));

        let selection = RunSelection::select(&merged, &Predicate::default());
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["SRR1"]);
    }

    #[test]
    fn test_missing_condition_column() {
        let source = Path::new("<memory>");
        let err = merge(
            &table("Run,Sample\nSRR1,GSM1\n"),
            &table("Sample,Grade\nGSM1,high\n"),
            source,
            source,
        )
        .unwrap_err();

        assert!(err.to_string().contains("could not find a `Condition` column"));
    }

    #[test]
    fn test_distributions_count_missing_values() {
        let merged = join(
            "Run,Sample\nSRR1,GSM1\nSRR2,GSM2\nSRR3,GSM3\n",
            "Sample,Condition,Grade\nGSM1,tumor,high\nGSM2,tumor,\n",
        );

        let conditions = merged.condition_distribution();
        assert_eq!(conditions.count(Some("tumor")), 2);
        assert_eq!(conditions.missing(), 1);

        let grades = merged.grade_distribution();
        assert_eq!(grades.count(Some("high")), 1);
        assert_eq!(grades.missing(), 2);
    }

    fn write_inputs(dir: &Path, annotations: &str) -> MergeConfig {
        let config = MergeConfig::in_directory(dir);
        fs::write(
            &config.run_table,
            "Run,Sample\nSRR1,GSM1\nSRR2,GSM2\nSRR3,GSM1\n",
        )
        .unwrap();
        fs::write(&config.annotations, annotations).unwrap();
        config
    }

    #[test]
    fn test_run_writes_merged_table_and_selection() -> TestResult {
        let dir = TempDir::new("merge")?;
        let config = write_inputs(
            dir.path(),
            "Sample,Condition,Grade\nGSM1,tumor,high\nGSM2,normal,low\n",
        );

        let report = run(&config)?;

        assert_eq!(report.merged.len(), 3);
        assert_eq!(
            fs::read_to_string(&config.merged)?,
            "Run,Sample,Condition,Grade\n\
             SRR1,GSM1,tumor,high\n\
             SRR2,GSM2,normal,low\n\
             SRR3,GSM1,tumor,high\n"
        );
        assert_eq!(report.selection_path.as_ref(), Some(&config.selection));
        assert_eq!(fs::read_to_string(&config.selection)?, "SRR1\nSRR3\n");
        Ok(())
    }

    #[test]
    fn test_run_with_empty_selection_skips_the_selection_file() -> TestResult {
        let dir = TempDir::new("merge")?;
        let config = write_inputs(dir.path(), "Sample,Condition,Grade\nGSM1,normal,low\n");

        let report = run(&config)?;

        assert!(report.selection.is_empty());
        assert!(report.selection_path.is_none());
        assert!(config.merged.exists());
        assert!(!config.selection.exists());
        Ok(())
    }

    #[test]
    fn test_run_with_missing_input_writes_nothing() -> TestResult {
        let dir = TempDir::new("merge")?;
        let config = MergeConfig::in_directory(dir.path());
        fs::write(&config.run_table, "Run,Sample\nSRR1,GSM1\n")?;

        let err = run(&config).unwrap_err();

        assert!(matches!(err, Error::Table(table::Error::MissingFile(_))));
        assert!(!config.merged.exists());
        assert!(!config.selection.exists());
        Ok(())
    }
}
