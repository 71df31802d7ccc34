//! Per-run quantification results.
//!
//! The quantifier writes one directory per run, `<results>/<run>_quant`,
//! containing a tab-separated `quant.sf` file. Only the `Name` and `TPM`
//! columns of that file are used.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::warn;

use crate::table;
use crate::table::Delimiter;
use crate::table::Table;

/// The name of the quantifier output file.
pub const QUANT_FILE_NAME: &str = "quant.sf";

/// The suffix of a per-run output directory.
pub const QUANT_DIR_SUFFIX: &str = "_quant";

/// The transcript identifier column.
pub const NAME_COLUMN: &str = "Name";

/// The abundance column.
pub const TPM_COLUMN: &str = "TPM";

/// The delimiter of composite transcript identifiers.
const ID_DELIMITER: char = '|';

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to quantification results.
#[derive(Debug)]
pub enum Error {
    /// The output file could not be read.
    Table(table::Error),

    /// A required column is absent.
    MissingColumn {
        /// The offending file.
        path: PathBuf,

        /// The absent column.
        column: &'static str,
    },

    /// A row has no transcript identifier.
    MissingTranscript {
        /// The offending file.
        path: PathBuf,

        /// The 0-based data row.
        row: usize,
    },

    /// An abundance is absent or not a number.
    InvalidAbundance {
        /// The offending file.
        path: PathBuf,

        /// The transcript.
        transcript: String,

        /// The raw value, if any.
        value: Option<String>,
    },

    /// A transcript appears more than once.
    DuplicateTranscript {
        /// The offending file.
        path: PathBuf,

        /// The transcript.
        transcript: String,
    },

    /// The results directory could not be listed.
    Io(PathBuf, io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Table(err) => write!(f, "{err}"),
            Error::MissingColumn { path, column } => {
                write!(f, "{}: missing required column `{column}`", path.display())
            }
            Error::MissingTranscript { path, row } => {
                write!(f, "{}: row {row} has no transcript name", path.display())
            }
            Error::InvalidAbundance {
                path,
                transcript,
                value,
            } => match value {
                Some(value) => write!(
                    f,
                    "{}: invalid abundance `{value}` for transcript `{transcript}`",
                    path.display()
                ),
                None => write!(
                    f,
                    "{}: missing abundance for transcript `{transcript}`",
                    path.display()
                ),
            },
            Error::DuplicateTranscript { path, transcript } => write!(
                f,
                "{}: transcript `{transcript}` appears more than once",
                path.display()
            ),
            Error::Io(path, err) => write!(f, "listing {}: {err}", path.display()),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Results
////////////////////////////////////////////////////////////////////////////////////////

/// Truncates a transcript identifier at its first `|`.
///
/// # Examples
///
/// ```
/// use psiflow::quant::truncate_transcript_id;
///
/// assert_eq!(
///     truncate_transcript_id("ENST00000456328.2|ENSG00000223972.5|OTTHUMG00000000961.2|"),
///     "ENST00000456328.2"
/// );
/// assert_eq!(truncate_transcript_id("ENST00000456328.2"), "ENST00000456328.2");
/// ```
pub fn truncate_transcript_id(id: &str) -> &str {
    match id.split_once(ID_DELIMITER) {
        Some((primary, _)) => primary,
        None => id,
    }
}

/// The abundances reported for one sample.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantificationResult {
    /// The sample identifier.
    sample: String,

    /// The transcript identifiers and their abundances, in file order.
    abundances: Vec<(String, f64)>,
}

impl QuantificationResult {
    /// Creates a new [`QuantificationResult`].
    ///
    /// Returns the first repeated transcript identifier as the error.
    pub fn try_new(
        sample: impl Into<String>,
        abundances: Vec<(String, f64)>,
    ) -> std::result::Result<Self, String> {
        let mut seen = HashSet::with_capacity(abundances.len());

        for (transcript, _) in &abundances {
            if !seen.insert(transcript.as_str()) {
                return Err(transcript.clone());
            }
        }

        Ok(Self {
            sample: sample.into(),
            abundances,
        })
    }

    /// Parses a quantifier output table.
    ///
    /// `path` only labels diagnostics.
    pub fn from_table(sample: impl Into<String>, table: &Table, path: &Path) -> Result<Self> {
        let missing = |column| Error::MissingColumn {
            path: path.to_path_buf(),
            column,
        };

        let name = table.column(NAME_COLUMN).ok_or_else(|| missing(NAME_COLUMN))?;
        let tpm = table.column(TPM_COLUMN).ok_or_else(|| missing(TPM_COLUMN))?;

        let mut abundances = Vec::with_capacity(table.len());

        for row in 0..table.len() {
            let transcript = table
                .get(row, name)
                .map(truncate_transcript_id)
                .ok_or_else(|| Error::MissingTranscript {
                    path: path.to_path_buf(),
                    row,
                })?;

            let raw = table.get(row, tpm);
            let value = raw
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .ok_or_else(|| Error::InvalidAbundance {
                    path: path.to_path_buf(),
                    transcript: transcript.to_string(),
                    value: raw.map(String::from),
                })?;

            abundances.push((transcript.to_string(), value));
        }

        Self::try_new(sample, abundances).map_err(|transcript| Error::DuplicateTranscript {
            path: path.to_path_buf(),
            transcript,
        })
    }

    /// Reads a quantifier output file.
    pub fn read(sample: impl Into<String>, path: &Path) -> Result<Self> {
        let table = Table::read(path, Some(Delimiter::Tab)).map_err(Error::Table)?;
        Self::from_table(sample, &table, path)
    }

    /// Gets the sample identifier.
    pub fn sample(&self) -> &str {
        &self.sample
    }

    /// Gets the transcript identifiers and their abundances.
    pub fn abundances(&self) -> &[(String, f64)] {
        &self.abundances
    }

    /// Gets the number of transcripts.
    pub fn len(&self) -> usize {
        self.abundances.len()
    }

    /// Returns whether there are no transcripts.
    pub fn is_empty(&self) -> bool {
        self.abundances.is_empty()
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Discovery
////////////////////////////////////////////////////////////////////////////////////////

/// A quantifier output file found on disk.
#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct QuantOutput {
    /// The sample identifier.
    sample: String,

    /// The path of the output file.
    path: PathBuf,
}

impl QuantOutput {
    /// Gets the sample identifier.
    pub fn sample(&self) -> &str {
        &self.sample
    }

    /// Gets the path of the output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the output file.
    pub fn load(&self) -> Result<QuantificationResult> {
        QuantificationResult::read(self.sample.clone(), &self.path)
    }
}

/// The directory the quantifier writes for a run.
pub fn output_dir(results: &Path, run: &str) -> PathBuf {
    results.join(format!("{run}{QUANT_DIR_SUFFIX}"))
}

/// Finds every quantifier output under `results`.
///
/// Each subdirectory named `<sample>_quant` that contains a `quant.sf` file
/// yields one output. Outputs are sorted by directory name; a `_quant`
/// directory without an output file is skipped with a warning.
pub fn discover(results: &Path) -> Result<Vec<QuantOutput>> {
    let entries = fs::read_dir(results).map_err(|e| Error::Io(results.to_path_buf(), e))?;
    let mut outputs = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| Error::Io(results.to_path_buf(), e))?;
        let dir = entry.path();

        if !dir.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(sample) = name.strip_suffix(QUANT_DIR_SUFFIX) else {
            continue;
        };

        let path = dir.join(QUANT_FILE_NAME);
        if !path.is_file() {
            warn!("no {QUANT_FILE_NAME} in {}; skipping", dir.display());
            continue;
        }

        debug!("found quantification output for `{sample}`");
        outputs.push(QuantOutput {
            sample: sample.to_string(),
            path,
        });
    }

    outputs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    const QUANT_SF: &str = "Name\tLength\tEffectiveLength\tTPM\tNumReads\n\
        ENST00000456328.2|ENSG00000223972.5|OTTHUMG00000000961.2|\t1657\t1491.0\t0.5\t3\n\
        ENST00000450305.2|ENSG00000223972.5|\t632\t466.0\t0\t0\n";

    fn parse(data: &str) -> Result<QuantificationResult> {
        let path = Path::new("<memory>");
        let table = Table::from_reader(data.as_bytes(), Delimiter::Tab, path).map_err(Error::Table)?;
        QuantificationResult::from_table("SRR1", &table, path)
    }

    #[test]
    fn test_keeps_name_and_tpm() -> TestResult {
        let result = parse(QUANT_SF)?;

        assert_eq!(result.sample(), "SRR1");
        assert_eq!(
            result.abundances(),
            &[
                (String::from("ENST00000456328.2"), 0.5),
                (String::from("ENST00000450305.2"), 0.0),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_missing_tpm_column() {
        let err = parse("Name\tNumReads\nT1\t3\n").unwrap_err();
        assert!(matches!(
            err,
            Error::MissingColumn {
                column: TPM_COLUMN,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_abundance() {
        let err = parse("Name\tTPM\nT1\tlots\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "<memory>: invalid abundance `lots` for transcript `T1`"
        );
    }

    #[test]
    fn test_duplicate_after_truncation() {
        let err = parse("Name\tTPM\nT1|a\t1\nT1|b\t2\n").unwrap_err();
        assert!(matches!(err, Error::DuplicateTranscript { transcript, .. } if transcript == "T1"));
    }

    #[test]
    fn test_discover() -> TestResult {
        let dir = TempDir::new("results")?;

        for run in ["SRR2", "SRR1", "SRR3"] {
            fs::create_dir(output_dir(dir.path(), run))?;
        }
        fs::write(output_dir(dir.path(), "SRR2").join(QUANT_FILE_NAME), QUANT_SF)?;
        fs::write(output_dir(dir.path(), "SRR1").join(QUANT_FILE_NAME), QUANT_SF)?;
        fs::create_dir(dir.path().join("logs"))?;
        fs::write(dir.path().join("stray_quant"), "")?;

        let outputs = discover(dir.path())?;
        let samples = outputs.iter().map(|o| o.sample()).collect::<Vec<_>>();
        assert_eq!(samples, vec!["SRR1", "SRR2"]);

        let result = outputs[1].load()?;
        assert_eq!(result.sample(), "SRR2");
        assert_eq!(result.len(), 2);
        Ok(())
    }
}
