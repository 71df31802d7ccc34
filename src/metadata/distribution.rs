//! Value distributions over a column of the merged metadata.

use tabled::builder::Builder;
use tabled::settings::Alignment;
use tabled::settings::Style;
use tabled::settings::object::Columns;

/// The label under which missing values are counted.
pub const MISSING_LABEL: &str = "NaN";

/// The frequency of every value in a column, missing values included.
///
/// Entries are ordered by descending count; ties keep the order in which the
/// values were first seen.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Distribution {
    /// The column name.
    column: String,

    /// The values and their counts.
    counts: Vec<(Option<String>, usize)>,
}

impl Distribution {
    /// Tallies a sequence of optional values.
    ///
    /// # Examples
    ///
    /// ```
    /// use psiflow::metadata::Distribution;
    ///
    /// let values = [Some("tumor"), None, Some("normal"), Some("tumor")];
    /// let distribution = Distribution::tally("Condition", values);
    ///
    /// assert_eq!(distribution.count(Some("tumor")), 2);
    /// assert_eq!(distribution.missing(), 1);
    /// assert_eq!(distribution.total(), 4);
    /// ```
    pub fn tally<'a, I>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut counts: Vec<(Option<String>, usize)> = Vec::new();

        for value in values {
            match counts
                .iter_mut()
                .find(|(existing, _)| existing.as_deref() == value)
            {
                Some((_, count)) => *count += 1,
                None => counts.push((value.map(String::from), 1)),
            }
        }

        // NOTE: `sort_by` is stable, so ties stay in first-seen order.
        counts.sort_by(|(_, a), (_, b)| b.cmp(a));

        Self {
            column: column.into(),
            counts,
        }
    }

    /// Gets the column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Gets the values and their counts.
    pub fn counts(&self) -> &[(Option<String>, usize)] {
        &self.counts
    }

    /// Gets the count for a value ([`None`] counts missing values).
    pub fn count(&self, value: Option<&str>) -> usize {
        self.counts
            .iter()
            .find(|(existing, _)| existing.as_deref() == value)
            .map(|(_, count)| *count)
            .unwrap_or_default()
    }

    /// Gets the number of missing values.
    pub fn missing(&self) -> usize {
        self.count(None)
    }

    /// Gets the total number of values tallied.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }
}

impl std::fmt::Display for Distribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builder = Builder::default();
        builder.push_record([self.column.as_str(), "count"]);

        for (value, count) in &self.counts {
            let label = value.as_deref().unwrap_or(MISSING_LABEL);
            builder.push_record([label.to_string(), count.to_string()]);
        }

        let table = builder
            .build()
            .with(Style::rounded())
            .modify(Columns::single(1), Alignment::right())
            .to_string();

        write!(f, "{table}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        let values = [
            Some("normal"),
            None,
            Some("tumor"),
            Some("tumor"),
            None,
            Some("adjacent"),
        ];
        let distribution = Distribution::tally("Condition", values);

        assert_eq!(
            distribution.counts(),
            &[
                (None, 2),
                (Some(String::from("tumor")), 2),
                (Some(String::from("normal")), 1),
                (Some(String::from("adjacent")), 1),
            ]
        );
    }

    #[test]
    fn test_display_labels_missing_values() {
        let distribution = Distribution::tally("Grade", [Some("high"), None]);
        let rendered = distribution.to_string();

        assert!(rendered.contains("Grade"));
        assert!(rendered.contains("high"));
        assert!(rendered.contains(MISSING_LABEL));
    }

    #[test]
    fn test_empty() {
        let distribution = Distribution::tally("Grade", std::iter::empty());
        assert_eq!(distribution.total(), 0);
        assert_eq!(distribution.missing(), 0);
    }
}
