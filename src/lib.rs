//! `psiflow` is a crate for preparing bulk RNA-seq data for splicing-event
//! analysis.
//!
//! The crate provides two stages, run one after the other:
//!
//! - Merging run-level sample metadata with condition and grade annotations,
//!   then selecting the runs of a cohort of interest ([`metadata`]).
//! - Quantifying every run of a run table with an external quantifier,
//!   assembling the per-run results into a transcript-by-sample expression
//!   matrix, and computing splicing-event usage with an external tool
//!   ([`pipeline`]).
//!
//! The heavy lifting (downloading reads, quantification, and event
//! statistics) is delegated to external programs reached through the
//! [`tool::Runner`] facility. What this crate owns is the data contract in
//! between: the metadata join and selection, and the expression matrix
//! assembly in the format the splicing-event tool expects.
//!
//! ## Merging metadata
//!
//! [`metadata::merge()`] left joins a run table with an annotation table on
//! their `Sample` column, normalizing identifiers on both sides first. The
//! merged rows can then be filtered into a [`metadata::RunSelection`]. The
//! [`metadata::run()`] function performs the whole stage from a
//! [`config::MergeConfig`].
//!
//! ## Building the expression matrix
//!
//! A [`pipeline::Pipeline`] walks the runs of a run table one at a time and
//! then assembles an [`matrix::ExpressionMatrix`] from every quantifier
//! output it can find. The matrix can also be assembled directly from
//! [`quant::QuantificationResult`]s:
//!
//! ```
//! use nonempty::nonempty;
//! use psiflow::matrix::ExpressionMatrix;
//! use psiflow::quant::QuantificationResult;
//!
//! let a = QuantificationResult::try_new(
//!     "A",
//!     vec![(String::from("T1"), 1.0), (String::from("T2"), 2.0)],
//! )?;
//! let b = QuantificationResult::try_new(
//!     "B",
//!     vec![(String::from("T2"), 3.0), (String::from("T3"), 4.0)],
//! )?;
//!
//! let matrix = ExpressionMatrix::assemble(nonempty![a, b])?;
//! assert_eq!(matrix.transcripts().collect::<Vec<_>>(), vec!["T1", "T2", "T3"]);
//! assert_eq!(matrix.get("T1", "B"), None);
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod matrix;
pub mod metadata;
pub mod pipeline;
pub mod quant;
pub mod table;
pub mod tool;

pub use config::MergeConfig;
pub use config::PipelineConfig;
pub use matrix::ExpressionMatrix;
pub use pipeline::Pipeline;
