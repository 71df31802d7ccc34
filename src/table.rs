//! Small, wholly in-memory delimited tables.
//!
//! Every input this crate consumes (sample metadata, run tables, and
//! quantifier outputs) is a modest delimited text file with a header row.
//! [`Table`] holds such a file as a list of header names and rows of optional
//! cells, where an empty input cell is represented as [`None`].

use std::fs::File;
use std::io;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use flate2::read::GzDecoder;

pub mod column;
pub mod delimiter;

pub use column::ColumnLookup;
pub use delimiter::Delimiter;

/// The extension of gzip-compressed inputs.
const GZIP_EXTENSION: &str = "gz";

/// The quote character stripped from identifiers.
const QUOTE: char = '"';

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to a [`Table`].
#[derive(Debug)]
pub enum Error {
    /// A required input file does not exist.
    MissingFile(PathBuf),

    /// An I/O error.
    Io(PathBuf, io::Error),

    /// The delimited text could not be parsed.
    Csv(PathBuf, csv::Error),

    /// A row has more fields than the header.
    RaggedRow {
        /// The offending file.
        path: PathBuf,

        /// The 1-based line of the row.
        line: u64,

        /// The number of header fields.
        expected: usize,

        /// The number of fields found.
        found: usize,
    },

    /// A column could not be resolved.
    Column(PathBuf, column::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MissingFile(path) => write!(f, "file not found: {}", path.display()),
            Error::Io(path, err) => write!(f, "i/o error for {}: {err}", path.display()),
            Error::Csv(path, err) => write!(f, "malformed table {}: {err}", path.display()),
            Error::RaggedRow {
                path,
                line,
                expected,
                found,
            } => write!(
                f,
                "row at line {line} of {} has {found} fields, but the header has {expected}",
                path.display()
            ),
            Error::Column(path, err) => write!(f, "{}: {err}", path.display()),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Helpers
////////////////////////////////////////////////////////////////////////////////////////

/// Normalizes an identifier by removing every double quote and trimming
/// surrounding whitespace.
///
/// # Examples
///
/// ```
/// use psiflow::table::normalize_identifier;
///
/// assert_eq!(normalize_identifier("\"GSM123 \""), "GSM123");
/// assert_eq!(normalize_identifier("GSM123"), "GSM123");
/// assert_eq!(normalize_identifier(" \"GSM123\""), "GSM123");
/// ```
pub fn normalize_identifier(value: &str) -> String {
    value.replace(QUOTE, "").trim().to_string()
}

/// Opens a file for reading, transparently decompressing `.gz` files.
pub fn open(path: &Path) -> Result<Box<dyn Read>> {
    if !path.exists() {
        return Err(Error::MissingFile(path.to_path_buf()));
    }

    let file = File::open(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some(GZIP_EXTENSION) => Ok(Box::new(GzDecoder::new(file))),
        _ => Ok(Box::new(file)),
    }
}

/// Converts a raw cell into an optional value.
fn cell(raw: &str) -> Option<String> {
    match raw {
        "" => None,
        value => Some(value.to_string()),
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Tables
////////////////////////////////////////////////////////////////////////////////////////

/// A delimited table held in memory.
///
/// Only an empty cell is missing. Markers such as `NA`, `NaN` or `null` are
/// kept as literal values.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Table {
    /// The header names.
    headers: Vec<String>,

    /// The rows, each exactly as wide as the header.
    rows: Vec<Vec<Option<String>>>,
}

impl Table {
    /// Creates a new table.
    ///
    /// Rows narrower than the header are padded with missing cells and rows
    /// wider than the header are truncated.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();

        Self { headers, rows }
    }

    /// Reads a table from a file.
    ///
    /// When `delimiter` is [`None`], it is detected from the header line.
    pub fn read(path: &Path, delimiter: Option<Delimiter>) -> Result<Self> {
        let mut contents = String::new();
        open(path)?
            .read_to_string(&mut contents)
            .map_err(|e| Error::Io(path.to_path_buf(), e))?;

        let delimiter = delimiter.unwrap_or_else(|| {
            let header = contents.lines().next().unwrap_or_default();
            Delimiter::detect(header)
        });

        tracing::debug!("reading {} as {delimiter}-delimited", path.display());
        Self::from_reader(contents.as_bytes(), delimiter, path)
    }

    /// Reads a table from a reader.
    ///
    /// `source` only labels diagnostics.
    pub fn from_reader<R>(reader: R, delimiter: Delimiter, source: &Path) -> Result<Self>
    where
        R: Read,
    {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter.as_byte())
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| Error::Csv(source.to_path_buf(), e))?
            .iter()
            .map(String::from)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| Error::Csv(source.to_path_buf(), e))?;

            if record.len() > headers.len() {
                return Err(Error::RaggedRow {
                    path: source.to_path_buf(),
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    expected: headers.len(),
                    found: record.len(),
                });
            }

            rows.push(record.iter().map(cell).collect());
        }

        Ok(Self::new(headers, rows))
    }

    /// Gets the header names.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Gets the rows.
    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    /// Gets the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gets the index of the column named exactly `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Gets the index of the column named exactly `name`, failing with the
    /// available columns when there is none.
    ///
    /// `source` only labels diagnostics.
    pub fn require(&self, name: &str, source: &Path) -> Result<usize> {
        self.column(name).ok_or_else(|| {
            Error::Column(
                source.to_path_buf(),
                column::Error::Missing {
                    column: name.to_string(),
                    available: self.headers.clone(),
                },
            )
        })
    }

    /// Resolves a [`ColumnLookup`] against the headers.
    ///
    /// `source` only labels diagnostics.
    pub fn resolve(&self, lookup: &ColumnLookup, source: &Path) -> Result<usize> {
        lookup
            .resolve(&self.headers)
            .map_err(|e| Error::Column(source.to_path_buf(), e))
    }

    /// Gets a cell.
    pub fn get(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|row| row.get(column))
            .and_then(|cell| cell.as_deref())
    }

    /// Iterates over the values of a column.
    pub fn values(&self, column: usize) -> impl Iterator<Item = Option<&str>> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(column).and_then(|cell| cell.as_deref()))
    }

    /// Writes the table as delimited text with a header row.
    ///
    /// Missing cells are written as empty fields.
    pub fn write<W>(&self, writer: W, delimiter: Delimiter) -> csv::Result<()>
    where
        W: Write,
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .from_writer(writer);

        writer.write_record(&self.headers)?;

        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or_default()))?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Writes the table to a file.
    pub fn write_to_path(&self, path: &Path, delimiter: Delimiter) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::Io(path.to_path_buf(), e))?;
        self.write(io::BufWriter::new(file), delimiter)
            .map_err(|e| Error::Csv(path.to_path_buf(), e))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempdir::TempDir;

    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn source() -> PathBuf {
        PathBuf::from("<memory>")
    }

    #[test]
    fn test_empty_cells_are_missing() -> TestResult {
        let data = "Run,Sample,Condition\nSRR1,GSM1,\nSRR2,GSM2,tumor\n";
        let table = Table::from_reader(data.as_bytes(), Delimiter::Comma, &source())?;

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, 2), None);
        assert_eq!(table.get(1, 2), Some("tumor"));
        assert_eq!(
            table.values(0).collect::<Vec<_>>(),
            vec![Some("SRR1"), Some("SRR2")]
        );
        Ok(())
    }

    #[test]
    fn test_missing_value_markers_are_literal() -> TestResult {
        let data = "Run,Condition,Grade\nSRR1,NA,NaN\nSRR2,null,\n";
        let table = Table::from_reader(data.as_bytes(), Delimiter::Comma, &source())?;

        assert_eq!(
            table.values(1).collect::<Vec<_>>(),
            vec![Some("NA"), Some("null")]
        );
        assert_eq!(table.values(2).collect::<Vec<_>>(), vec![Some("NaN"), None]);
        Ok(())
    }

    #[test]
    fn test_require_matches_exactly() {
        let table = Table::new(
            vec![String::from("condition"), String::from("Condition")],
            Vec::new(),
        );

        assert_eq!(table.require("Condition", &source()).ok(), Some(1));

        let err = table.require("Grade", &source()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "<memory>: could not find a `Grade` column; available columns: [`condition`, `Condition`]"
        );
    }

    #[test]
    fn test_short_rows_are_padded() -> TestResult {
        let data = "Run\tSample\tCondition\nSRR1\tGSM1\n";
        let table = Table::from_reader(data.as_bytes(), Delimiter::Tab, &source())?;

        assert_eq!(table.rows()[0].len(), 3);
        assert_eq!(table.get(0, 2), None);
        Ok(())
    }

    #[test]
    fn test_long_rows_are_rejected() {
        let data = "Run,Sample\nSRR1,GSM1,extra\n";
        let err = Table::from_reader(data.as_bytes(), Delimiter::Comma, &source()).unwrap_err();
        assert!(matches!(
            err,
            Error::RaggedRow {
                expected: 2,
                found: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_read_detects_delimiter_and_decompresses() -> TestResult {
        let dir = TempDir::new("table")?;
        let path = dir.path().join("SraRunTable.txt.gz");

        let mut encoder = GzEncoder::new(File::create(&path)?, Compression::default());
        encoder.write_all(b"Run\tSample\nSRR1\tGSM1\n")?;
        encoder.finish()?;

        let table = Table::read(&path, None)?;
        assert_eq!(table.headers(), &["Run", "Sample"]);
        assert_eq!(table.get(0, 1), Some("GSM1"));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = Table::read(Path::new("/nonexistent/SraRunTable.csv"), None).unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }

    #[test]
    fn test_write_leaves_missing_cells_empty() -> TestResult {
        let table = Table::new(
            vec![String::from("Run"), String::from("Grade")],
            vec![
                vec![Some(String::from("SRR1")), None],
                vec![Some(String::from("SRR2")), Some(String::from("high"))],
            ],
        );

        let mut buffer = Vec::new();
        table.write(&mut buffer, Delimiter::Comma)?;

        assert_eq!(String::from_utf8(buffer)?, "Run,Grade\nSRR1,\nSRR2,high\n");
        Ok(())
    }
}
