//! Locating columns by name.

/// An error related to resolving a [`ColumnLookup`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// No header matched any accepted name.
    Missing {
        /// The column that was being looked for.
        column: String,

        /// The headers that were available.
        available: Vec<String>,
    },

    /// More than one header matched an accepted name.
    Ambiguous {
        /// The column that was being looked for.
        column: String,

        /// The headers that matched.
        matches: Vec<String>,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Missing { column, available } => write!(
                f,
                "could not find a `{column}` column; available columns: [{}]",
                quoted(available)
            ),
            Error::Ambiguous { column, matches } => write!(
                f,
                "found more than one candidate for the `{column}` column: [{}]",
                quoted(matches)
            ),
        }
    }
}

impl std::error::Error for Error {}

/// Renders a list of header names for a diagnostic.
fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("`{name}`"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Normalizes a header name for comparison.
fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A lookup for a column by name.
///
/// Header names are compared after trimming surrounding whitespace and
/// ignoring case. A lookup carries one or more accepted names and resolves to
/// exactly one header; zero or several matches are errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnLookup {
    /// The name used in diagnostics.
    name: String,

    /// The normalized accepted names.
    synonyms: Vec<String>,
}

impl ColumnLookup {
    /// Creates a lookup that accepts only `name`.
    ///
    /// # Examples
    ///
    /// ```
    /// use psiflow::table::ColumnLookup;
    ///
    /// let headers = vec![String::from("Assay Type"), String::from(" run ")];
    /// assert_eq!(ColumnLookup::new("Run").resolve(&headers)?, 1);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let synonyms = vec![normalize(&name)];
        Self { name, synonyms }
    }

    /// Creates a lookup that accepts `name` and any of `synonyms`.
    pub fn with_synonyms<I, S>(name: impl Into<String>, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut lookup = Self::new(name);

        for synonym in synonyms {
            let synonym = normalize(synonym.as_ref());
            if !lookup.synonyms.contains(&synonym) {
                lookup.synonyms.push(synonym);
            }
        }

        lookup
    }

    /// Gets the name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether a header is accepted by this lookup.
    pub fn accepts(&self, header: &str) -> bool {
        let header = normalize(header);
        self.synonyms.iter().any(|synonym| *synonym == header)
    }

    /// Resolves the lookup to the index of exactly one header.
    pub fn resolve(&self, headers: &[String]) -> Result<usize, Error> {
        let matches = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| self.accepts(header))
            .collect::<Vec<_>>();

        match matches.as_slice() {
            [] => Err(Error::Missing {
                column: self.name.clone(),
                available: headers.to_vec(),
            }),
            [(index, _)] => Ok(*index),
            _ => Err(Error::Ambiguous {
                column: self.name.clone(),
                matches: matches
                    .into_iter()
                    .map(|(_, header)| header.clone())
                    .collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_missing_column_lists_available_columns() {
        let err = ColumnLookup::new("Run")
            .resolve(&headers(&["Sample", "Assay Type"]))
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "could not find a `Run` column; available columns: [`Sample`, `Assay Type`]"
        );
    }

    #[test]
    fn test_synonyms() -> TestResult {
        let lookup = ColumnLookup::with_synonyms("Run", ["Run_accession", "RUN"]);
        assert_eq!(lookup.resolve(&headers(&["Sample", "run_accession"]))?, 1);
        assert_eq!(lookup.name(), "Run");
        Ok(())
    }

    #[test]
    fn test_ambiguous_column() {
        let lookup = ColumnLookup::with_synonyms("Run", ["Run_accession"]);
        let err = lookup
            .resolve(&headers(&["Run", "Sample", "Run_accession"]))
            .unwrap_err();

        assert_eq!(
            err,
            Error::Ambiguous {
                column: String::from("Run"),
                matches: headers(&["Run", "Run_accession"]),
            }
        );
    }
}
