//! # manuscript-forge
//!
//! Assembles ordered scene notes into manuscripts, outlines and typeset documents.
//!
//! ## Features
//!
//! - Narrative, chronological and reversed orderings with subplot and range filters
//! - Markdown manuscripts with configurable headings, table of contents and cleanup
//! - Balanced splitting of one selection into several files
//! - Beat sheets, rundowns, shooting schedules and index cards (CSV, JSON)
//! - Typesetting through an external converter with font-aware engine selection
//!
//! ## Quick Start
//!
//! ```no_run
//! use manuscript_forge::{ExportJob, ExportSettings, Exporter, FsVault, SortOrder, TocMode};
//!
//! # fn main() -> anyhow::Result<()> {
//! let vault = FsVault::open("./vault")?;
//! let job = ExportJob::builder()
//!     .order(SortOrder::Chronological)
//!     .toc(TocMode::Markdown)
//!     .parts(3)
//!     .build()?;
//!
//! let report = Exporter::new(&vault, ExportSettings::default())?.run(&job)?;
//! for path in &report.saved_paths {
//!     println!("{}", path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! An export runs as a pipeline:
//! 1. **Selector**: orders, filters and range-restricts the vault's scene records
//! 2. **Splitter**: divides the selection into balanced contiguous parts
//! 3. **Assembler / Outline generator**: builds each part's text
//! 4. **Writer**: persists each part atomically
//! 5. **Typesetter**: renders typeset targets through the external converter

#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod pipeline;
mod template;
mod writer;

pub mod manuscript;
pub mod naming;
pub mod outline;
pub mod preset;
pub mod sanitize;
pub mod scene;
pub mod selector;
pub mod splitter;
pub mod token;
pub mod typeset;
pub mod vault;

pub use config::{ExportJob, ExportJobBuilder, ExportSettings, ExportTarget, PlanningSettings};
pub use error::{Error, Result};
pub use manuscript::{AssembledManuscript, Assembler, AssemblyOptions, HeadingMode, HeadingRender, TocMode};
pub use outline::{OutlineDocument, OutlineGenerator, OutlineOptions};
pub use pipeline::{
    CancellationToken, ExportPreview, ExportReport, ExportStats, Exporter, PlannedPart,
};
pub use preset::{ManuscriptPreset, OutlinePreset};
pub use sanitize::{CleanupPolicies, CleanupPolicy, Sanitizer};
pub use scene::{RawSceneRecord, SceneRecord};
pub use selector::{OrderedSelection, SceneRange, SceneSelector, SelectionRequest, SortOrder};
pub use splitter::{SplitPlan, plan_parts};
pub use typeset::layout::{LayoutRegistry, LayoutTemplate};
pub use vault::{FsVault, MemoryVault, Vault};

/// Runs one export against `vault` with the given settings.
///
/// # Errors
///
/// Returns an error if:
/// - The settings or the job are invalid
/// - No scene matches the selection
/// - The requested split is infeasible
/// - A typeset layout template is missing
/// - Writing or rendering fails
///
/// # Examples
///
/// ```no_run
/// use manuscript_forge::{ExportJob, ExportSettings, FsVault, run};
///
/// # fn main() -> anyhow::Result<()> {
/// let vault = FsVault::open(".")?;
/// let job = ExportJob::builder().build()?;
///
/// run(&vault, ExportSettings::default(), &job)?;
/// # Ok(())
/// # }
/// ```
pub fn run(vault: &dyn Vault, settings: ExportSettings, job: &ExportJob) -> Result<ExportReport> {
    Exporter::new(vault, settings)?.run(job)
}
