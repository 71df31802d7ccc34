//! Field delimiters for tabular inputs.

/// The comma character.
const COMMA: char = ',';

/// The tab character.
const TAB: char = '\t';

/// A field delimiter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Delimiter {
    /// Comma-separated values.
    Comma,

    /// Tab-separated values.
    Tab,
}

impl Delimiter {
    /// Detects the delimiter used by a header line.
    ///
    /// Tabs win when they outnumber commas; everything else (including a
    /// single-column header with neither) is read as comma-separated.
    ///
    /// # Examples
    ///
    /// ```
    /// use psiflow::table::Delimiter;
    ///
    /// assert_eq!(Delimiter::detect("Run\tSample\tAssay Type"), Delimiter::Tab);
    /// assert_eq!(Delimiter::detect("Run,Sample,Assay Type"), Delimiter::Comma);
    /// assert_eq!(Delimiter::detect("Run"), Delimiter::Comma);
    /// ```
    pub fn detect(line: &str) -> Self {
        let tabs = line.chars().filter(|c| *c == TAB).count();
        let commas = line.chars().filter(|c| *c == COMMA).count();

        if tabs > commas {
            Delimiter::Tab
        } else {
            Delimiter::Comma
        }
    }

    /// Gets the delimiter as a single byte.
    pub fn as_byte(&self) -> u8 {
        match self {
            Delimiter::Comma => COMMA as u8,
            Delimiter::Tab => TAB as u8,
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delimiter::Comma => write!(f, "comma"),
            Delimiter::Tab => write!(f, "tab"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_commas_do_not_outvote_tabs() {
        let line = "Run\tSample\t\"Homo sapiens, adult\"";
        assert_eq!(Delimiter::detect(line), Delimiter::Tab);
    }

    #[test]
    fn test_ties_fall_back_to_comma() {
        assert_eq!(Delimiter::detect("a\tb,c"), Delimiter::Comma);
        assert_eq!(Delimiter::detect(""), Delimiter::Comma);
    }

    #[test]
    fn test_as_byte() {
        assert_eq!(Delimiter::Comma.as_byte(), b',');
        assert_eq!(Delimiter::Tab.as_byte(), b'\t');
    }
}
