//! Configuration for the two stages.
//!
//! Every path a stage reads or writes is carried explicitly. The
//! `in_directory` constructors reproduce the conventional file layout of a
//! working directory, which is what the binaries use unless told otherwise.

use std::path::Path;
use std::path::PathBuf;

use crate::metadata::Predicate;
use crate::metadata::RUN_COLUMN;
use crate::table::ColumnLookup;

/// The default number of threads handed to the quantifier.
pub const DEFAULT_THREADS: usize = 8;

/// The default k-mer size of the quantifier index.
pub const DEFAULT_KMER_SIZE: usize = 31;

/// The splicing event types generated by default.
pub const DEFAULT_EVENT_TYPES: &[&str] = &["SE", "SS", "MX", "RI", "FL"];

/// The splicing event types for which PSI values are computed by default.
pub const DEFAULT_PSI_EVENT_TYPES: &[&str] = &["RI"];

/// Configuration for the metadata merger.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MergeConfig {
    /// The run-level metadata table.
    pub run_table: PathBuf,

    /// The condition and grade annotation table.
    pub annotations: PathBuf,

    /// Where the merged table is written.
    pub merged: PathBuf,

    /// Where the selected run identifiers are written.
    pub selection: PathBuf,

    /// Which merged rows are selected.
    pub predicate: Predicate,
}

impl MergeConfig {
    /// Creates the conventional configuration rooted at `directory`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    ///
    /// use psiflow::config::MergeConfig;
    ///
    /// let config = MergeConfig::in_directory("work");
    /// assert_eq!(config.run_table, Path::new("work/SraRunTable.csv"));
    /// assert_eq!(config.selection, Path::new("work/selected_SRR_ids.txt"));
    /// ```
    pub fn in_directory(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();

        Self {
            run_table: directory.join("SraRunTable.csv"),
            annotations: directory.join("GSE181294_conditions.csv"),
            merged: directory.join("merged_SRA_GEO.csv"),
            selection: directory.join("selected_SRR_ids.txt"),
            predicate: Predicate::default(),
        }
    }
}

/// Locations of the external executables.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Tools {
    /// The transcript quantifier (index builder and quantifier).
    pub salmon: PathBuf,

    /// The read downloader.
    pub prefetch: PathBuf,

    /// The read extractor.
    pub fasterq_dump: PathBuf,

    /// The splicing-event tool (event generation and PSI calculation).
    pub suppa: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            salmon: PathBuf::from("salmon"),
            prefetch: PathBuf::from("prefetch"),
            fasterq_dump: PathBuf::from("fasterq-dump"),
            suppa: PathBuf::from("suppa.py"),
        }
    }
}

/// Configuration for the expression matrix builder.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PipelineConfig {
    /// The run table listing the runs to process.
    pub run_table: PathBuf,

    /// The accepted names of the run identifier column.
    pub run_columns: Vec<String>,

    /// The transcriptome the quantifier index is built from.
    pub transcripts: PathBuf,

    /// The quantifier index directory.
    pub index: PathBuf,

    /// The scratch directory for downloaded and extracted reads.
    pub reads: PathBuf,

    /// The directory holding one `<run>_quant` directory per run.
    pub results: PathBuf,

    /// Candidate annotation files, most preferred first.
    pub annotations: Vec<PathBuf>,

    /// The directory for event definition files.
    pub events: PathBuf,

    /// The directory for PSI tables.
    pub psi: PathBuf,

    /// Where the expression matrix is written.
    pub matrix: PathBuf,

    /// The number of quantifier threads.
    pub threads: usize,

    /// The k-mer size of the quantifier index.
    pub kmer_size: usize,

    /// The splicing event types to generate.
    pub event_types: Vec<String>,

    /// The splicing event types to compute PSI values for.
    pub psi_event_types: Vec<String>,

    /// The external executables.
    pub tools: Tools,
}

impl PipelineConfig {
    /// Creates the conventional configuration rooted at `directory`.
    pub fn in_directory(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();

        Self {
            run_table: directory.join("SraRunTable.txt"),
            run_columns: vec![String::from(RUN_COLUMN)],
            transcripts: directory.join("gencode.v43.transcripts.fa.gz"),
            index: directory.join("salmon_index"),
            reads: directory.join("fastq_output"),
            results: directory.join("results"),
            annotations: vec![
                directory.join("gencode.v43.annotation.gtf"),
                directory.join("gencode.v43.annotation.gtf.gz"),
            ],
            events: directory.join("events_ioe"),
            psi: directory.join("suppa_results"),
            matrix: directory.join("TPM_SUPPA2_final.tsv"),
            threads: DEFAULT_THREADS,
            kmer_size: DEFAULT_KMER_SIZE,
            event_types: DEFAULT_EVENT_TYPES.iter().map(|t| t.to_string()).collect(),
            psi_event_types: DEFAULT_PSI_EVENT_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            tools: Tools::default(),
        }
    }

    /// The lookup for the run identifier column.
    pub fn run_lookup(&self) -> ColumnLookup {
        ColumnLookup::with_synonyms(RUN_COLUMN, &self.run_columns)
    }

    /// The output prefix handed to the event generator.
    pub fn events_prefix(&self) -> PathBuf {
        self.events.join("events")
    }

    /// The strict event definition file for an event type.
    pub fn ioe_file(&self, event_type: &str) -> PathBuf {
        self.events.join(format!("events_{event_type}_strict.ioe"))
    }

    /// The PSI table for an event type.
    pub fn psi_file(&self, event_type: &str) -> PathBuf {
        self.psi.join(format!("{event_type}.psi"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_layout() {
        let config = PipelineConfig::in_directory("/work");

        assert_eq!(config.matrix, Path::new("/work/TPM_SUPPA2_final.tsv"));
        assert_eq!(config.events_prefix(), Path::new("/work/events_ioe/events"));
        assert_eq!(
            config.ioe_file("RI"),
            Path::new("/work/events_ioe/events_RI_strict.ioe")
        );
        assert_eq!(config.psi_file("RI"), Path::new("/work/suppa_results/RI.psi"));
        assert_eq!(
            config.annotations,
            vec![
                PathBuf::from("/work/gencode.v43.annotation.gtf"),
                PathBuf::from("/work/gencode.v43.annotation.gtf.gz"),
            ]
        );
    }
}
