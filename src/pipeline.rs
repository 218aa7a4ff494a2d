use crate::{
    config::{ExportJob, ExportSettings, ExportTarget},
    error::{Error, Result},
    manuscript::Assembler,
    naming::FilenameBuilder,
    outline::OutlineGenerator,
    sanitize::Sanitizer,
    selector::{OrderedSelection, SceneRange, SceneSelector},
    splitter::plan_parts,
    typeset::{
        ResolvedLayout, Typesetter,
        invoke::{CompilerRunner, SystemRunner},
    },
    vault::Vault,
    writer::Writer,
};
use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Cooperative cancellation flag shared between the caller and a running export.
///
/// Checked before loading scenes, between scene reads and before each compiler launch.
/// A compiler that has already started runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`Error::Cancelled`] if cancellation was requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] after [`cancel`](Self::cancel).
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Statistics collected during an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportStats {
    /// Scenes in the selection
    pub total_scenes: usize,

    /// Words across all parts
    pub total_words: usize,

    /// Number of parts produced
    pub parts: usize,

    /// Scenes that could not be read
    pub failed_scenes: usize,

    /// Number of files written, rendered output included
    pub files_written: usize,

    /// Total execution time
    pub duration: Duration,

    /// Time spent loading and ordering scenes
    pub select_duration: Duration,

    /// Time spent assembling manuscripts or outlines
    pub assemble_duration: Duration,

    /// Time spent writing files
    pub write_duration: Duration,

    /// Time spent in the document compiler
    pub render_duration: Duration,

    /// Output folder path
    pub output_folder: String,
}

impl ExportStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              Export Summary                           ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Scenes:               {:>8}                        ║",
            self.total_scenes
        );
        println!(
            "║   - Unreadable:       {:>8}                        ║",
            self.failed_scenes
        );
        println!(
            "║ Words:                {:>8}                        ║",
            self.total_words
        );
        println!(
            "║ Parts:                {:>8}                        ║",
            self.parts
        );
        println!("║                                                       ║");
        println!(
            "║ Files Written:        {:>8}                        ║",
            self.files_written
        );
        println!("║ Output Folder:                                        ║");
        println!("║   {}", self.output_folder);
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Selecting:        {:>8.2}s                     ║",
            self.select_duration.as_secs_f64()
        );
        println!(
            "║   - Assembling:       {:>8.2}s                     ║",
            self.assemble_duration.as_secs_f64()
        );
        println!(
            "║   - Writing:          {:>8.2}s                     ║",
            self.write_duration.as_secs_f64()
        );
        println!(
            "║   - Rendering:        {:>8.2}s                     ║",
            self.render_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// What a finished export produced.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// Markdown, CSV or JSON files written
    pub saved_paths: Vec<PathBuf>,

    /// Typeset documents produced by the compiler
    pub rendered_paths: Vec<PathBuf>,

    /// Folder that received the files
    pub output_folder: PathBuf,

    /// Human-readable notes for the caller
    pub messages: Vec<String>,

    /// Scenes recovered with a placeholder or a zero word count
    pub scene_failures: Vec<Error>,

    /// Counts and timings
    pub stats: ExportStats,
}

/// One planned output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPart {
    /// 1-based part index
    pub index: usize,

    /// Positions within the full ordered list
    pub range: SceneRange,

    /// File name the part will be written to
    pub filename: String,
}

/// Dry-run view of an export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPreview {
    /// Ordering, range and filter in one line
    pub description: String,

    /// Selected scene titles in export order
    pub titles: Vec<String>,

    /// Planned output files
    pub parts: Vec<PlannedPart>,

    /// Folder the files would be written to
    pub output_folder: PathBuf,
}

impl ExportPreview {
    /// Prints the preview to stdout.
    pub fn print(&self) {
        println!("\n{}", self.description);
        println!("{} scene(s):", self.titles.len());
        for (index, title) in self.titles.iter().enumerate() {
            println!("  {:>3}. {}", index + 1, title);
        }
        println!("\nOutput folder: {}", self.output_folder.display());
        for part in &self.parts {
            println!(
                "  [{}] scenes {}-{} → {}",
                part.index, part.range.start, part.range.end, part.filename
            );
        }
        println!();
    }
}

struct ExportPlan {
    selection: OrderedSelection,
    parts: Vec<(OrderedSelection, String)>,
    layout: Option<ResolvedLayout>,
}

struct PartOutput {
    text: String,
    words: usize,
    failures: Vec<Error>,
}

/// Main export orchestrator.
///
/// Every precondition (empty selection, infeasible split, unusable layout template) is
/// checked before the first file is written.
pub struct Exporter<'a> {
    vault: &'a dyn Vault,
    settings: ExportSettings,
    runner: &'a dyn CompilerRunner,
    cancel: CancellationToken,
    timestamp: Option<NaiveDateTime>,
}

impl<'a> Exporter<'a> {
    /// Creates an exporter over `vault`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings fail validation.
    pub fn new(vault: &'a dyn Vault, settings: ExportSettings) -> Result<Self> {
        settings.validate()?;

        Ok(Self {
            vault,
            settings,
            runner: &SystemRunner,
            cancel: CancellationToken::new(),
            timestamp: None,
        })
    }

    /// Replaces the compiler runner.
    #[must_use]
    pub fn with_runner(mut self, runner: &'a dyn CompilerRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stamps file names with `timestamp` instead of the current local time.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The settings this exporter runs with.
    #[must_use]
    pub const fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Resolves the selection and planned file names without writing anything.
    ///
    /// # Errors
    ///
    /// Returns the same precondition errors as [`run`](Self::run).
    pub fn preview(&self, job: &ExportJob) -> Result<ExportPreview> {
        let plan = self.plan(job)?;

        Ok(ExportPreview {
            description: plan.selection.description(),
            titles: plan
                .selection
                .scenes
                .iter()
                .map(|s| s.title.clone())
                .collect(),
            parts: plan
                .parts
                .iter()
                .enumerate()
                .map(|(i, (part, filename))| PlannedPart {
                    index: i + 1,
                    range: absolute_range(part),
                    filename: filename.clone(),
                })
                .collect(),
            output_folder: self.settings.output_folder.clone(),
        })
    }

    /// Executes the export and returns what it produced.
    ///
    /// # Process
    ///
    /// 1. **Select**: loads, filters, orders and range-restricts scenes
    /// 2. **Plan**: splits into parts and validates the layout template
    /// 3. **Assemble**: builds each part's manuscript or outline
    /// 4. **Write**: saves each part atomically, then renders typeset parts
    ///
    /// # Errors
    ///
    /// Returns a precondition error before any write, [`Error::Cancelled`] if the token
    /// fires, or the first IO, template or compiler error. Unreadable scenes are not
    /// errors; they are listed in [`ExportReport::scene_failures`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use manuscript_forge::{ExportJob, ExportSettings, Exporter, FsVault, SortOrder};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let vault = FsVault::open("./vault")?;
    /// let job = ExportJob::builder()
    ///     .order(SortOrder::Chronological)
    ///     .build()?;
    ///
    /// let report = Exporter::new(&vault, ExportSettings::default())?.run(&job)?;
    /// report.stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self, job), fields(order = job.selection.order.id(), kind = job.target.category()))]
    pub fn run(&self, job: &ExportJob) -> Result<ExportReport> {
        let start_time = Instant::now();

        info!("Starting export");

        info!("Stage 1/3: Selecting scenes...");
        let select_start = Instant::now();
        let plan = self.plan(job)?;
        let select_duration = select_start.elapsed();

        info!(
            "✓ Selected {} scene(s) in {} part(s): {}",
            plan.selection.len(),
            plan.parts.len(),
            plan.selection.description()
        );

        let writer = Writer::new(&self.settings.output_folder);
        let sanitizer = Sanitizer::new(job.cleanup_policy(&self.settings));
        let program = self.settings.compiler_program();
        let typesetter = Typesetter::new(self.runner, program, self.settings.compiler_locator());

        let mut saved_paths = Vec::new();
        let mut rendered_paths = Vec::new();
        let mut messages = Vec::new();
        let mut scene_failures = Vec::new();
        let mut total_words = 0;
        let mut assemble_duration = Duration::ZERO;
        let mut write_duration = Duration::ZERO;
        let mut render_duration = Duration::ZERO;

        info!("Stage 2/3: Assembling and writing {} part(s)...", plan.parts.len());
        for (index, (part, filename)) in plan.parts.iter().enumerate() {
            let assemble_start = Instant::now();
            let output = self.assemble(job, sanitizer, part)?;
            assemble_duration += assemble_start.elapsed();

            debug!(
                "Part {}/{}: {} scene(s), {} words",
                index + 1,
                plan.parts.len(),
                part.len(),
                output.words
            );
            total_words += output.words;
            scene_failures.extend(output.failures);

            let write_start = Instant::now();
            let saved = match &job.target {
                ExportTarget::Typeset { .. } => writer.write(&markdown_name(filename), &output.text)?,
                _ => writer.write(filename, &output.text)?,
            };
            write_duration += write_start.elapsed();
            messages.push(format!("Saved {}", display_name(&saved)));
            saved_paths.push(saved);

            if let Some(layout) = &plan.layout {
                info!("Stage 3/3: Rendering {}...", filename);
                let render_start = Instant::now();
                writer.prepare()?;
                let target = writer.path_for(filename);
                let selection = typesetter.render(&output.text, layout, &target, &self.cancel)?;
                render_duration += render_start.elapsed();

                messages.push(format!(
                    "Rendered {} with {} using layout '{}'",
                    display_name(&target),
                    selection.engine.id(),
                    layout.template.name
                ));
                if selection.path.is_none() {
                    warn!(
                        "No TeX engine found in the search directories; relied on '{}' from PATH",
                        selection.engine.id()
                    );
                }
                rendered_paths.push(target);
            }
        }

        if !scene_failures.is_empty() {
            let message = format!(
                "{} scene(s) could not be read and were replaced with placeholders",
                scene_failures.len()
            );
            warn!("{}", message);
            messages.push(message);
        }

        let total_duration = start_time.elapsed();
        let stats = ExportStats {
            total_scenes: plan.selection.len(),
            total_words,
            parts: plan.parts.len(),
            failed_scenes: scene_failures.len(),
            files_written: saved_paths.len() + rendered_paths.len(),
            duration: total_duration,
            select_duration,
            assemble_duration,
            write_duration,
            render_duration,
            output_folder: writer.output_dir().display().to_string(),
        };

        info!(
            "✓ Export completed in {:.2}s",
            total_duration.as_secs_f64()
        );

        Ok(ExportReport {
            saved_paths,
            rendered_paths,
            output_folder: writer.output_dir().to_path_buf(),
            messages,
            scene_failures,
            stats,
        })
    }

    fn plan(&self, job: &ExportJob) -> Result<ExportPlan> {
        job.validate()?;
        self.cancel.check()?;

        let selection = SceneSelector::load(self.vault, &job.selection)?;
        if selection.is_empty() {
            return Err(Error::SelectionEmpty {
                subplot: job.selection.subplot.clone(),
            });
        }

        let pieces: Vec<OrderedSelection> = match job.parts {
            Some(parts) => plan_parts(selection.len(), parts)?
                .ranges
                .into_iter()
                .map(|range| selection.part(range))
                .collect(),
            None => vec![selection.clone()],
        };

        let layout = match &job.target {
            ExportTarget::Typeset { preset, layout } => {
                let layouts = &self.settings.layouts;
                let template = match layouts.for_preset(*preset).find(|t| t.id == *layout) {
                    Some(template) => template,
                    None => {
                        let reason = layouts.get(layout).map_or_else(
                            || "not found in the layout registry".to_string(),
                            |other| {
                                format!(
                                    "belongs to the {} preset, not {}",
                                    other.preset.id(),
                                    preset.id()
                                )
                            },
                        );
                        return Err(Error::template_invalid(layout, reason));
                    }
                };
                Some(ResolvedLayout::resolve(template, self.vault)?)
            }
            _ => None,
        };

        let names = FilenameBuilder::new(
            self.timestamp
                .unwrap_or_else(|| Local::now().naive_local()),
        )
        .book_title(self.settings.book_title.clone());
        let count = pieces.len();
        let parts = pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let part = job.parts.map(|_| (i + 1, count));
                let filename = names.build(
                    &job.target,
                    job.selection.order,
                    job.selection.subplot.is_some(),
                    part,
                );
                (piece, filename)
            })
            .collect();

        Ok(ExportPlan {
            selection,
            parts,
            layout,
        })
    }

    fn assemble(
        &self,
        job: &ExportJob,
        sanitizer: Sanitizer,
        part: &OrderedSelection,
    ) -> Result<PartOutput> {
        match &job.target {
            ExportTarget::Manuscript { .. } | ExportTarget::Typeset { .. } => {
                let manuscript =
                    Assembler::new(self.vault, sanitizer, job.assembly).assemble(part, &self.cancel)?;
                Ok(PartOutput {
                    text: manuscript.text,
                    words: manuscript.total_words,
                    failures: manuscript.failures,
                })
            }
            ExportTarget::Outline { preset } => {
                let document =
                    OutlineGenerator::new(self.vault, sanitizer, self.settings.planning, job.outline)?
                        .generate(part, *preset, &self.cancel)?;
                Ok(PartOutput {
                    text: document.text,
                    words: document.total_words,
                    failures: document.failures,
                })
            }
        }
    }
}

fn absolute_range(part: &OrderedSelection) -> SceneRange {
    part.range
        .unwrap_or_else(|| SceneRange::new(part.first_position(), part.first_position() + part.len() - 1))
}

fn markdown_name(filename: &str) -> String {
    Path::new(filename)
        .with_extension("md")
        .to_string_lossy()
        .to_string()
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manuscript::TocMode;
    use crate::preset::{ManuscriptPreset, OutlinePreset};
    use crate::scene::RawSceneRecord;
    use crate::selector::SortOrder;
    use crate::typeset::invoke::CompileRequest;
    use crate::typeset::layout::{LayoutRegistry, LayoutTemplate};
    use crate::vault::MemoryVault;
    use assert_fs::prelude::*;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::fs;

    #[derive(Default)]
    struct FakeRunner {
        requests: RefCell<Vec<CompileRequest>>,
    }

    impl CompilerRunner for FakeRunner {
        fn run(&self, request: &CompileRequest) -> Result<()> {
            fs::write(&request.output, b"%PDF-1.7").unwrap();
            self.requests.borrow_mut().push(request.clone());
            Ok(())
        }
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 0)
            .unwrap()
    }

    fn scene(path: &str, title: &str, when: &str, subplot: &str) -> RawSceneRecord {
        RawSceneRecord {
            item_type: Some("Scene".to_string()),
            path: path.to_string(),
            title: Some(title.to_string()),
            when: Some(when.to_string()),
            subplot: Some(subplot.to_string()),
            ..RawSceneRecord::default()
        }
    }

    fn vault() -> MemoryVault {
        MemoryVault::new()
            .with_record(scene("1 Arrival.md", "1 Arrival", "2024-01-03", "Main Plot"), "The train pulls in.")
            .with_record(scene("2 Storm.md", "2 Storm", "2024-01-01", "Weather"), "Rain everywhere.")
            .with_record(scene("3 Letter.md", "3 Letter", "2024-01-02", "Main Plot"), "A letter %%draft%% arrives.")
    }

    fn settings(temp: &assert_fs::TempDir) -> ExportSettings {
        ExportSettings {
            output_folder: temp.path().join("out"),
            ..ExportSettings::default()
        }
    }

    #[test]
    fn test_cancellation_token_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(token.check().is_ok());

        clone.cancel();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_manuscript_export_writes_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let job = ExportJob::builder().toc(TocMode::Plain).build().unwrap();

        let report = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .with_timestamp(stamp())
            .run(&job)
            .unwrap();

        assert_eq!(report.saved_paths.len(), 1);
        assert!(report.rendered_paths.is_empty());
        assert_eq!(
            report.saved_paths[0],
            temp.path().join("out/Manuscript Nov Narr Mar 5 @ 2.07PM.md")
        );

        let text = fs::read_to_string(&report.saved_paths[0]).unwrap();
        let arrival = text.find("The train pulls in.").unwrap();
        let storm = text.find("Rain everywhere.").unwrap();
        assert!(arrival < storm);
        assert!(!text.contains("draft"));
        assert_eq!(report.stats.total_scenes, 3);
        assert!(report.scene_failures.is_empty());
    }

    #[test]
    fn test_subplot_filter_and_chronological_order() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let job = ExportJob::builder()
            .order(SortOrder::Chronological)
            .subplot("Main Plot")
            .build()
            .unwrap();

        let preview = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .with_timestamp(stamp())
            .preview(&job)
            .unwrap();

        assert_eq!(preview.titles, vec!["3 Letter", "1 Arrival"]);
        assert_eq!(preview.parts.len(), 1);
        assert!(preview.parts[0].filename.contains("Sub-Chro"));
        assert!(!temp.child("out").exists());
    }

    #[test]
    fn test_empty_selection_aborts_before_write() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let job = ExportJob::builder().subplot("Nobody").build().unwrap();

        let err = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .run(&job)
            .unwrap_err();

        assert!(matches!(err, Error::SelectionEmpty { subplot: Some(ref s) } if s == "Nobody"));
        assert!(!temp.child("out").exists());
    }

    #[test]
    fn test_split_writes_each_part() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let job = ExportJob::builder().parts(2).build().unwrap();

        let report = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .with_timestamp(stamp())
            .run(&job)
            .unwrap();

        assert_eq!(report.saved_paths.len(), 2);
        assert!(report.saved_paths[0].ends_with("Manuscript Nov Narr Mar 5 @ 2.07PM Part 1 of 2.md"));
        assert!(report.saved_paths[1].ends_with("Manuscript Nov Narr Mar 5 @ 2.07PM Part 2 of 2.md"));

        let first = fs::read_to_string(&report.saved_paths[0]).unwrap();
        let second = fs::read_to_string(&report.saved_paths[1]).unwrap();
        assert!(first.contains("Arrival") && first.contains("Storm"));
        assert!(second.contains("Letter") && !second.contains("Arrival"));
        assert_eq!(report.stats.parts, 2);
    }

    #[test]
    fn test_split_infeasible_aborts_before_write() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let job = ExportJob::builder().parts(5).build().unwrap();

        let err = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .run(&job)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::SplitInfeasible {
                requested: 5,
                available: 3
            }
        ));
        assert!(!temp.child("out").exists());
    }

    #[test]
    fn test_unreadable_scene_does_not_abort() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault().with_unreadable("2 Storm.md");
        let job = ExportJob::builder().build().unwrap();

        let report = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .run(&job)
            .unwrap();

        let text = fs::read_to_string(&report.saved_paths[0]).unwrap();
        assert!(text.contains("The train pulls in."));
        assert!(text.contains("could not be read"));
        assert!(text.contains("arrives."));
        assert_eq!(report.scene_failures.len(), 1);
        assert!(report.messages.iter().any(|m| m.contains("placeholders")));
    }

    #[test]
    fn test_outline_export() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let job = ExportJob::builder()
            .outline(OutlinePreset::IndexCardsCsv)
            .build()
            .unwrap();

        let report = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .with_timestamp(stamp())
            .run(&job)
            .unwrap();

        let path = &report.saved_paths[0];
        assert!(path.ends_with("Outline IC Narr Mar 5 @ 2.07PM.csv"));
        let csv = fs::read_to_string(path).unwrap();
        assert!(csv.starts_with("Scene,Title,When,Subplot,Runtime,Words"));
        assert_eq!(report.stats.total_words, 9);
    }

    #[test]
    fn test_typeset_missing_layout_is_template_invalid() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let runner = FakeRunner::default();
        let job = ExportJob::builder()
            .typeset(ManuscriptPreset::Novel, "classic")
            .build()
            .unwrap();

        let err = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .with_runner(&runner)
            .run(&job)
            .unwrap_err();

        assert!(matches!(err, Error::TemplateInvalid { .. }));
        assert!(runner.requests.borrow().is_empty());
        assert!(!temp.child("out").exists());
    }

    #[test]
    fn test_typeset_layout_of_other_preset_is_template_invalid() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("script.tex");
        template.write_str("\\documentclass{article}").unwrap();
        let vault = vault().with_file("Templates/script.tex", template.path());

        let mut settings = settings(&temp);
        settings.layouts = LayoutRegistry::new().with_template(LayoutTemplate::new(
            "script",
            "Script",
            ManuscriptPreset::Screenplay,
            "Templates/script.tex",
        ));

        let runner = FakeRunner::default();
        let job = ExportJob::builder()
            .typeset(ManuscriptPreset::Novel, "script")
            .build()
            .unwrap();

        let err = Exporter::new(&vault, settings)
            .unwrap()
            .with_runner(&runner)
            .run(&job)
            .unwrap_err();

        assert!(matches!(err, Error::TemplateInvalid { .. }));
        assert!(err.to_string().contains("screenplay"));
        assert!(runner.requests.borrow().is_empty());
        assert!(!temp.child("out").exists());
    }

    #[test]
    fn test_typeset_export_renders_document() {
        let temp = assert_fs::TempDir::new().unwrap();
        let template = temp.child("classic.tex");
        template.write_str("\\documentclass{book}").unwrap();
        let vault = vault().with_file("Templates/classic.tex", template.path());

        let mut settings = settings(&temp);
        settings.book_title = Some("storm-front".to_string());
        settings.search_dirs = Some(vec![]);
        settings.layouts = LayoutRegistry::new().with_template(LayoutTemplate::new(
            "classic",
            "Classic",
            ManuscriptPreset::Novel,
            "Templates/classic.tex",
        ));

        let runner = FakeRunner::default();
        let job = ExportJob::builder()
            .typeset(ManuscriptPreset::Novel, "classic")
            .build()
            .unwrap();

        let report = Exporter::new(&vault, settings)
            .unwrap()
            .with_runner(&runner)
            .with_timestamp(stamp())
            .run(&job)
            .unwrap();

        assert_eq!(report.rendered_paths.len(), 1);
        assert!(report.rendered_paths[0].ends_with("storm front Nov Narr Mar 5 @ 2.07PM.pdf"));
        assert!(report.rendered_paths[0].exists());
        assert!(report.saved_paths[0].ends_with("storm front Nov Narr Mar 5 @ 2.07PM.md"));

        let markdown = fs::read_to_string(&report.saved_paths[0]).unwrap();
        assert!(markdown.contains("\\section*{Arrival}"));

        let requests = runner.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].template.as_deref(), Some(template.path()));
        assert!(report.messages.iter().any(|m| m.contains("layout 'Classic'")));
    }

    #[test]
    fn test_cancelled_before_load() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = vault();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .with_cancellation(cancel)
            .run(&ExportJob::builder().build().unwrap())
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_provider_failure_propagates() {
        let temp = assert_fs::TempDir::new().unwrap();
        let vault = MemoryVault::new().failing("index unavailable");

        let err = Exporter::new(&vault, settings(&temp))
            .unwrap()
            .run(&ExportJob::builder().build().unwrap())
            .unwrap_err();

        assert!(matches!(err, Error::SelectionLoad { .. }));
    }
}
