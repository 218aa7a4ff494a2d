use crate::error::{Error, Result};
use crate::manuscript::{AssemblyOptions, HeadingMode, HeadingRender, TocMode};
use crate::outline::OutlineOptions;
use crate::preset::{ManuscriptPreset, OutlinePreset};
use crate::sanitize::{CleanupPolicies, CleanupPolicy, CleanupTarget};
use crate::selector::{SceneRange, SelectionRequest, SortOrder};
use crate::splitter::{MAX_PARTS, MIN_PARTS};
use crate::typeset::{
    OUTPUT_FORMAT,
    compiler::{CompilerLocator, resolve_program},
    layout::LayoutRegistry,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_OUTPUT_FOLDER: &str = "Manuscripts";

/// Drafting-rate settings used for outline planning metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningSettings {
    /// Drafting speed in words per minute
    pub drafting_wpm: Option<f64>,

    /// Minutes available for writing per day
    pub daily_minutes: Option<f64>,
}

impl PlanningSettings {
    /// Returns true if a drafting rate is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.drafting_wpm.is_some()
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the drafting rate is not positive or the daily minutes are negative.
    pub fn validate(&self) -> Result<()> {
        if let Some(wpm) = self.drafting_wpm {
            if !wpm.is_finite() || wpm <= 0.0 {
                return Err(Error::config(format!(
                    "drafting_wpm must be greater than 0, got {wpm}"
                )));
            }
        }
        if let Some(minutes) = self.daily_minutes {
            if !minutes.is_finite() || minutes < 0.0 {
                return Err(Error::config(format!(
                    "daily_minutes must not be negative, got {minutes}"
                )));
            }
        }
        Ok(())
    }
}

/// Read-only host configuration shared by every export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Folder that receives exported files
    pub output_folder: PathBuf,

    /// Book title used to name typeset output
    pub book_title: Option<String>,

    /// Layout template registry
    pub layouts: LayoutRegistry,

    /// Planning metrics configuration
    pub planning: PlanningSettings,

    /// Configured converter program
    pub compiler_path: Option<PathBuf>,

    /// Replaces the platform list of compiler install directories
    pub search_dirs: Option<Vec<PathBuf>>,

    /// Cleanup policies per destination
    pub cleanup: CleanupPolicies,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from(DEFAULT_OUTPUT_FOLDER),
            book_title: None,
            layouts: LayoutRegistry::default(),
            planning: PlanningSettings::default(),
            compiler_path: None,
            search_dirs: None,
            cleanup: CleanupPolicies::default(),
        }
    }
}

impl ExportSettings {
    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if planning values are out of range.
    pub fn validate(&self) -> Result<()> {
        self.planning.validate()
    }

    /// Locator over the configured or platform compiler directories.
    #[must_use]
    pub fn compiler_locator(&self) -> CompilerLocator {
        self.search_dirs
            .clone()
            .map_or_else(CompilerLocator::default, CompilerLocator::new)
    }

    /// Converter program, with path recovery applied.
    #[must_use]
    pub fn compiler_program(&self) -> PathBuf {
        resolve_program(self.compiler_path.as_deref())
    }
}

/// What an export produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExportTarget {
    /// Markdown manuscript
    Manuscript {
        /// Structural family
        preset: ManuscriptPreset,
    },
    /// Manuscript rendered by the external converter
    Typeset {
        /// Structural family
        preset: ManuscriptPreset,
        /// Layout template id
        layout: String,
    },
    /// Structured outline
    Outline {
        /// Outline view
        preset: OutlinePreset,
    },
}

impl Default for ExportTarget {
    fn default() -> Self {
        Self::Manuscript {
            preset: ManuscriptPreset::Novel,
        }
    }
}

impl ExportTarget {
    /// Returns true for targets rendered by the external converter.
    #[must_use]
    pub const fn is_typeset(&self) -> bool {
        matches!(self, Self::Typeset { .. })
    }

    /// Which cleanup policy applies.
    #[must_use]
    pub const fn cleanup_target(&self) -> CleanupTarget {
        match self {
            Self::Typeset { .. } => CleanupTarget::Typeset,
            _ => CleanupTarget::Plain,
        }
    }

    /// Generic category label used in file names.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Manuscript { .. } | Self::Typeset { .. } => "Manuscript",
            Self::Outline { .. } => "Outline",
        }
    }

    /// Preset acronym used in file names.
    #[must_use]
    pub const fn preset_acronym(&self) -> &'static str {
        match self {
            Self::Manuscript { preset } | Self::Typeset { preset, .. } => preset.acronym(),
            Self::Outline { preset } => preset.acronym(),
        }
    }

    /// Extension of the final artifact.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Manuscript { .. } => "md",
            Self::Typeset { .. } => OUTPUT_FORMAT,
            Self::Outline { preset } => preset.extension(),
        }
    }
}

/// One export invocation.
///
/// Use [`ExportJob::builder()`] to construct a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ExportJob {
    /// Ordering, subplot filter and range
    pub selection: SelectionRequest,

    /// Output kind
    pub target: ExportTarget,

    /// Headings, table of contents and matter
    pub assembly: AssemblyOptions,

    /// Outline columns
    pub outline: OutlineOptions,

    /// Overrides the settings' cleanup policy for this job
    pub cleanup: Option<CleanupPolicy>,

    /// Split the selection into this many files
    pub parts: Option<usize>,
}

impl ExportJob {
    /// Creates a new job builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use manuscript_forge::{ExportJob, SortOrder};
    ///
    /// let job = ExportJob::builder()
    ///     .order(SortOrder::Chronological)
    ///     .parts(3)
    ///     .build()
    ///     .expect("valid job");
    /// assert_eq!(job.parts, Some(3));
    /// ```
    #[must_use]
    pub fn builder() -> ExportJobBuilder {
        ExportJobBuilder::default()
    }

    /// Validates the job.
    ///
    /// # Errors
    ///
    /// Returns an error if the part count is outside `2..=20` or a typeset target has
    /// no layout template id.
    pub fn validate(&self) -> Result<()> {
        if let Some(parts) = self.parts {
            if !(MIN_PARTS..=MAX_PARTS).contains(&parts) {
                return Err(Error::config(format!(
                    "parts must be between {MIN_PARTS} and {MAX_PARTS}, got {parts}"
                )));
            }
            if matches!(self.target, ExportTarget::Outline { .. }) {
                return Err(Error::config("Outline exports cannot be split into parts"));
            }
        }

        if let ExportTarget::Typeset { layout, .. } = &self.target {
            if layout.trim().is_empty() {
                return Err(Error::config("Typeset exports require a layout template id"));
            }
        }

        if self
            .selection
            .subplot
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            return Err(Error::config("Subplot filter must not be blank"));
        }

        Ok(())
    }

    /// Cleanup policy for this job under `settings`.
    #[must_use]
    pub fn cleanup_policy(&self, settings: &ExportSettings) -> CleanupPolicy {
        self.cleanup
            .unwrap_or_else(|| settings.cleanup.for_target(self.target.cleanup_target()))
    }
}

/// Builder for creating an [`ExportJob`].
#[derive(Debug, Default)]
pub struct ExportJobBuilder {
    order: SortOrder,
    subplot: Option<String>,
    range: Option<SceneRange>,
    target: ExportTarget,
    heading: HeadingMode,
    heading_render: Option<HeadingRender>,
    toc: TocMode,
    include_matter: bool,
    outline: OutlineOptions,
    cleanup: Option<CleanupPolicy>,
    parts: Option<usize>,
}

impl ExportJobBuilder {
    /// Sets the ordering mode.
    #[must_use]
    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Keeps only scenes of this subplot.
    #[must_use]
    pub fn subplot(mut self, subplot: impl Into<String>) -> Self {
        self.subplot = Some(subplot.into());
        self
    }

    /// Restricts the export to positions `start..=end` of the ordered list (1-based).
    #[must_use]
    pub fn range(mut self, start: usize, end: usize) -> Self {
        self.range = Some(SceneRange::new(start, end));
        self
    }

    /// Exports a markdown manuscript.
    #[must_use]
    pub fn manuscript(mut self, preset: ManuscriptPreset) -> Self {
        self.target = ExportTarget::Manuscript { preset };
        self
    }

    /// Exports a typeset manuscript using a layout template from the registry.
    #[must_use]
    pub fn typeset(mut self, preset: ManuscriptPreset, layout: impl Into<String>) -> Self {
        self.target = ExportTarget::Typeset {
            preset,
            layout: layout.into(),
        };
        self
    }

    /// Exports an outline.
    #[must_use]
    pub fn outline(mut self, preset: OutlinePreset) -> Self {
        self.target = ExportTarget::Outline { preset };
        self
    }

    /// Sets the heading label style.
    #[must_use]
    pub fn heading(mut self, mode: HeadingMode) -> Self {
        self.heading = mode;
        self
    }

    /// Sets how headings are written.
    ///
    /// Defaults to LaTeX section openers for typeset targets and markdown headings otherwise.
    #[must_use]
    pub fn heading_render(mut self, render: HeadingRender) -> Self {
        self.heading_render = Some(render);
        self
    }

    /// Sets the table of contents style.
    #[must_use]
    pub fn toc(mut self, mode: TocMode) -> Self {
        self.toc = mode;
        self
    }

    /// Emits front and back matter around the scenes.
    #[must_use]
    pub fn include_matter(mut self, enabled: bool) -> Self {
        self.include_matter = enabled;
        self
    }

    /// Adds synopses to outlines.
    #[must_use]
    pub fn include_synopsis(mut self, enabled: bool) -> Self {
        self.outline.include_synopsis = enabled;
        self
    }

    /// Shows word counts in beat sheets.
    #[must_use]
    pub fn include_word_counts(mut self, enabled: bool) -> Self {
        self.outline.include_word_counts = enabled;
        self
    }

    /// Overrides the cleanup policy.
    #[must_use]
    pub fn cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup = Some(policy);
        self
    }

    /// Splits the export into `parts` files.
    #[must_use]
    pub fn parts(mut self, parts: usize) -> Self {
        self.parts = Some(parts);
        self
    }

    /// Builds the job.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<ExportJob> {
        let render = self.heading_render.unwrap_or(if self.target.is_typeset() {
            HeadingRender::LatexSectionStarred
        } else {
            HeadingRender::MarkdownHeading
        });

        let job = ExportJob {
            selection: SelectionRequest {
                order: self.order,
                subplot: self.subplot,
                range: self.range,
            },
            target: self.target,
            assembly: AssemblyOptions {
                heading: self.heading,
                render,
                toc: self.toc,
                include_matter: self.include_matter,
            },
            outline: self.outline,
            cleanup: self.cleanup,
            parts: self.parts,
        };

        job.validate()?;
        Ok(job)
    }
}
