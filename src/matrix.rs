//! Transcript-by-sample expression matrices.
//!
//! An [`ExpressionMatrix`] is the outer join of a set of
//! [`QuantificationResult`]s on transcript identifier. Rows are kept sorted
//! by transcript identifier and a transcript absent from a sample has a
//! missing value there.
//!
//! The on-disk format is the one the splicing-event tool expects: the first
//! line lists only the sample identifiers, and every following line is a
//! transcript identifier followed by one value per sample, all tab-separated.
//! There is no header cell for the transcript column.
//!
//! ```
//! use nonempty::nonempty;
//! use psiflow::matrix::ExpressionMatrix;
//! use psiflow::quant::QuantificationResult;
//!
//! let a = QuantificationResult::try_new(
//!     "SRR1",
//!     vec![(String::from("T2"), 1.5), (String::from("T1"), 0.0)],
//! )?;
//! let b = QuantificationResult::try_new("SRR2", vec![(String::from("T3"), 2.0)])?;
//!
//! let matrix = ExpressionMatrix::assemble(nonempty![a, b])?;
//!
//! let mut buffer = Vec::new();
//! matrix.write(&mut buffer)?;
//!
//! assert_eq!(
//!     String::from_utf8(buffer)?,
//!     "SRR1\tSRR2\nT1\t0.0\t\nT2\t1.5\t\nT3\t\t2.0\n"
//! );
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use nonempty::NonEmpty;

use crate::quant::QuantificationResult;

/// The field delimiter of the matrix file.
const DELIMITER: &str = "\t";

/// An error related to an [`ExpressionMatrix`].
#[derive(Debug)]
pub enum Error {
    /// Two results share a sample identifier.
    DuplicateSample(String),

    /// The matrix could not be written.
    Io(io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::DuplicateSample(sample) => {
                write!(f, "sample `{sample}` appears in more than one result")
            }
            Error::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

/// Formats an abundance value.
///
/// Values are written in their shortest round-trip decimal form; integral
/// values keep a trailing `.0`.
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// A transcript-by-sample abundance matrix.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpressionMatrix {
    /// The sample identifiers, in column order.
    samples: Vec<String>,

    /// The values per transcript, one slot per sample.
    rows: BTreeMap<String, Vec<Option<f64>>>,
}

impl ExpressionMatrix {
    /// Outer joins a set of results on transcript identifier.
    ///
    /// Columns follow the order of `results`.
    pub fn assemble(results: NonEmpty<QuantificationResult>) -> Result<Self> {
        let width = results.len();
        let mut samples: Vec<String> = Vec::with_capacity(width);
        let mut rows = BTreeMap::<String, Vec<Option<f64>>>::new();

        for (column, result) in results.iter().enumerate() {
            if samples.iter().any(|sample| sample == result.sample()) {
                return Err(Error::DuplicateSample(result.sample().to_string()));
            }

            samples.push(result.sample().to_string());

            for (transcript, value) in result.abundances() {
                let row = rows
                    .entry(transcript.clone())
                    .or_insert_with(|| vec![None; width]);
                row[column] = Some(*value);
            }
        }

        Ok(Self { samples, rows })
    }

    /// Gets the sample identifiers.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Iterates over the transcript identifiers in ascending order.
    pub fn transcripts(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Gets the number of transcripts.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether there are no transcripts.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gets the value of a transcript in a sample.
    ///
    /// Returns [`None`] when either is unknown or the value is missing.
    pub fn get(&self, transcript: &str, sample: &str) -> Option<f64> {
        let column = self.samples.iter().position(|s| s == sample)?;
        self.rows.get(transcript).and_then(|row| row[column])
    }

    /// Writes the matrix.
    pub fn write<W>(&self, mut writer: W) -> io::Result<()>
    where
        W: Write,
    {
        writeln!(writer, "{}", self.samples.join(DELIMITER))?;

        for (transcript, values) in &self.rows {
            write!(writer, "{transcript}")?;

            for value in values {
                write!(writer, "{DELIMITER}")?;
                if let Some(value) = value {
                    write!(writer, "{}", format_value(*value))?;
                }
            }

            writeln!(writer)?;
        }

        writer.flush()
    }

    /// Writes the matrix to a file.
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(Error::Io)?;
        self.write(BufWriter::new(file)).map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use nonempty::nonempty;

    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn result(sample: &str, abundances: &[(&str, f64)]) -> QuantificationResult {
        QuantificationResult::try_new(
            sample,
            abundances
                .iter()
                .map(|(transcript, value)| (transcript.to_string(), *value))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_outer_join_keeps_every_transcript() -> TestResult {
        let a = result("A", &[("T2", 2.0), ("T1", 1.0)]);
        let b = result("B", &[("T3", 3.0), ("T2", 4.0)]);

        let matrix = ExpressionMatrix::assemble(nonempty![a, b])?;

        assert_eq!(matrix.transcripts().collect::<Vec<_>>(), vec!["T1", "T2", "T3"]);
        assert_eq!(matrix.get("T1", "A"), Some(1.0));
        assert_eq!(matrix.get("T1", "B"), None);
        assert_eq!(matrix.get("T2", "B"), Some(4.0));
        assert_eq!(matrix.get("T3", "A"), None);
        Ok(())
    }

    #[test]
    fn test_sorting_is_lexicographic() -> TestResult {
        let a = result("A", &[("T10", 1.0), ("T9", 1.0), ("T1", 1.0)]);
        let matrix = ExpressionMatrix::assemble(NonEmpty::new(a))?;

        assert_eq!(
            matrix.transcripts().collect::<Vec<_>>(),
            vec!["T1", "T10", "T9"]
        );
        Ok(())
    }

    #[test]
    fn test_header_lists_only_samples() -> TestResult {
        let a = result("SRR1", &[("ENST1", 12.25)]);
        let b = result("SRR2", &[("ENST1", 3.0)]);
        let c = result("SRR3", &[]);

        let mut buffer = Vec::new();
        ExpressionMatrix::assemble(nonempty![a, b, c])?.write(&mut buffer)?;
        let text = String::from_utf8(buffer)?;
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert_eq!(header, "SRR1\tSRR2\tSRR3");
        assert_eq!(header.split('\t').count(), 3);
        assert_eq!(lines.next(), Some("ENST1\t12.25\t3.0\t"));
        assert_eq!(lines.next(), None);
        Ok(())
    }

    #[test]
    fn test_duplicate_sample() {
        let a = result("A", &[("T1", 1.0)]);
        let b = result("A", &[("T1", 1.0)]);

        assert!(matches!(
            ExpressionMatrix::assemble(nonempty![a, b]),
            Err(Error::DuplicateSample(sample)) if sample == "A"
        ));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(0.0), "0.0");
        assert_eq!(format_value(7.0), "7.0");
        assert_eq!(format_value(0.125), "0.125");
        assert_eq!(format_value(1234.5678), "1234.5678");
    }
}
