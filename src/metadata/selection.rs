//! Selecting run identifiers from the merged metadata.

use std::fs::File;
use std::io;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;

use crate::metadata::Merged;

/// The condition selected by default.
pub const DEFAULT_CONDITION: &str = "tumor";

/// The grade selected by default.
pub const DEFAULT_GRADE: &str = "high";

/// The condition and grade a merged row must carry to be selected.
///
/// Both values are compared exactly and case-sensitively.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Predicate {
    /// The required condition.
    condition: String,

    /// The required grade.
    grade: String,
}

impl Predicate {
    /// Creates a new [`Predicate`].
    pub fn new(condition: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            grade: grade.into(),
        }
    }

    /// Gets the required condition.
    pub fn condition(&self) -> &str {
        &self.condition
    }

    /// Gets the required grade.
    pub fn grade(&self) -> &str {
        &self.grade
    }

    /// Returns whether a condition and grade satisfy the predicate.
    pub fn matches(&self, condition: Option<&str>, grade: Option<&str>) -> bool {
        condition == Some(self.condition.as_str()) && grade == Some(self.grade.as_str())
    }
}

impl Default for Predicate {
    fn default() -> Self {
        Self::new(DEFAULT_CONDITION, DEFAULT_GRADE)
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Condition='{}' and Grade='{}'",
            self.condition, self.grade
        )
    }
}

/// An ordered list of unique run identifiers.
///
/// Identifiers appear in the order of their first occurrence in the merged
/// metadata.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSelection(Vec<String>);

impl RunSelection {
    /// Selects the runs of every merged row satisfying `predicate`.
    ///
    /// Rows without a run identifier are skipped.
    pub fn select(merged: &Merged, predicate: &Predicate) -> Self {
        let mut runs: Vec<String> = Vec::new();

        for record in merged.records() {
            if !predicate.matches(record.condition(), record.grade()) {
                continue;
            }

            if let Some(run) = record.run() {
                if !runs.iter().any(|existing| existing == run) {
                    runs.push(run.to_string());
                }
            }
        }

        Self(runs)
    }

    /// Gets the number of selected runs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the selected runs.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Writes one run identifier per line.
    pub fn write<W>(&self, mut writer: W) -> io::Result<()>
    where
        W: Write,
    {
        for run in &self.0 {
            writeln!(writer, "{run}")?;
        }

        writer.flush()
    }

    /// Writes the selection to a file.
    pub fn write_to_path(&self, path: &Path) -> io::Result<()> {
        self.write(BufWriter::new(File::create(path)?))
    }
}

impl From<RunSelection> for Vec<String> {
    fn from(selection: RunSelection) -> Self {
        selection.0
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::table::Delimiter;
    use crate::table::Table;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn merged(data: &str) -> Merged {
        let source = PathBuf::from("<memory>");
        let table = Table::from_reader(data.as_bytes(), Delimiter::Comma, &source).unwrap();
        Merged::from_table(table, &source).unwrap()
    }

    #[test]
    fn test_duplicates_collapse_in_first_occurrence_order() {
        let merged = merged(
            "Run,Sample,Condition,Grade\n\
             SRR3,GSM3,tumor,high\n\
             SRR1,GSM1,tumor,high\n\
             SRR2,GSM2,tumor,low\n\
             SRR3,GSM3,tumor,high\n\
             ,GSM4,tumor,high\n",
        );

        let selection = RunSelection::select(&merged, &Predicate::default());
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["SRR3", "SRR1"]);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let merged = merged(
            "Run,Sample,Condition,Grade\n\
             SRR1,GSM1,Tumor,high\n\
             SRR2,GSM2,tumor,HIGH\n\
             SRR3,GSM3,,high\n",
        );

        assert!(RunSelection::select(&merged, &Predicate::default()).is_empty());
    }

    #[test]
    fn test_write() -> TestResult {
        let selection = RunSelection(vec![String::from("SRR1"), String::from("SRR2")]);

        let mut buffer = Vec::new();
        selection.write(&mut buffer)?;

        assert_eq!(String::from_utf8(buffer)?, "SRR1\nSRR2\n");
        Ok(())
    }
}
