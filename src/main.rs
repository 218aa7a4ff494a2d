use anyhow::Context;
use clap::Parser;
use manuscript_forge::{
    ExportJob, ExportSettings, Exporter, FsVault, HeadingMode, ManuscriptPreset, OutlinePreset,
    SortOrder, TocMode,
};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "manuscript-forge",
    version,
    author,
    about = "Assemble scene notes into manuscripts, outlines and typeset documents",
    long_about = "Assemble a vault of scene notes into a manuscript, an outline or a typeset document.\n\n\
    Scenes are markdown notes with YAML frontmatter (Class: Scene, When, Subplot, Synopsis, \
    Runtime, Words). They are ordered, optionally filtered by subplot and range, and written \
    to the output folder.\n\n\
    USAGE EXAMPLES:\n  \
      # Narrative manuscript of the whole vault\n  \
      manuscript-forge --vault ./novel\n\n  \
      # Chronological manuscript of scenes 10-20, split into two files\n  \
      manuscript-forge --vault ./novel --order chronological --start 10 --end 20 --parts 2\n\n  \
      # Beat sheet for one subplot\n  \
      manuscript-forge --vault ./novel --outline beat-sheet --subplot \"The Heist\"\n\n  \
      # Typeset PDF with a registered layout\n  \
      manuscript-forge --vault ./novel --settings export.json --pdf --layout classic"
)]
struct Cli {
    /// Vault directory containing the scene notes
    #[arg(long, default_value = ".", value_name = "PATH")]
    vault: PathBuf,

    /// JSON settings file (output folder, layouts, planning, compiler)
    #[arg(long, value_name = "FILE", env = "MANUSCRIPT_FORGE_SETTINGS")]
    settings: Option<PathBuf>,

    /// Output folder; relative folders from the settings resolve against the vault
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Scene ordering
    #[arg(long, value_enum, default_value = "narrative")]
    order: CliOrder,

    /// Only export scenes of this subplot
    #[arg(long, value_name = "NAME")]
    subplot: Option<String>,

    /// First scene position to export (1-based)
    #[arg(long, value_name = "N")]
    start: Option<usize>,

    /// Last scene position to export (1-based, inclusive)
    #[arg(long, value_name = "N")]
    end: Option<usize>,

    /// Manuscript preset
    #[arg(short, long, value_enum, default_value = "novel")]
    preset: CliPreset,

    /// Export an outline instead of a manuscript
    #[arg(long, value_enum, conflicts_with = "pdf")]
    outline: Option<CliOutline>,

    /// Typeset the manuscript to PDF
    #[arg(long, requires = "layout")]
    pdf: bool,

    /// Layout template id from the settings' registry
    #[arg(long, value_name = "ID")]
    layout: Option<String>,

    /// Split the export into this many files (2-20)
    #[arg(long, value_name = "K")]
    parts: Option<usize>,

    /// Scene heading style
    #[arg(long, value_enum, default_value = "title-only")]
    heading: CliHeading,

    /// Table of contents style
    #[arg(long, value_enum, default_value = "none")]
    toc: CliToc,

    /// Include front and back matter notes
    #[arg(long)]
    matter: bool,

    /// Add synopses to outlines
    #[arg(long)]
    synopsis: bool,

    /// Glob patterns of notes to skip (vault-relative, repeatable)
    #[arg(long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Show the ordered selection and planned files without writing
    #[arg(long)]
    preview: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOrder {
    Narrative,
    ReverseNarrative,
    Chronological,
    ReverseChronological,
}

impl From<CliOrder> for SortOrder {
    fn from(o: CliOrder) -> Self {
        match o {
            CliOrder::Narrative => Self::Narrative,
            CliOrder::ReverseNarrative => Self::ReverseNarrative,
            CliOrder::Chronological => Self::Chronological,
            CliOrder::ReverseChronological => Self::ReverseChronological,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliPreset {
    Novel,
    Screenplay,
    Podcast,
}

impl From<CliPreset> for ManuscriptPreset {
    fn from(p: CliPreset) -> Self {
        match p {
            CliPreset::Novel => Self::Novel,
            CliPreset::Screenplay => Self::Screenplay,
            CliPreset::Podcast => Self::Podcast,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutline {
    /// Markdown beat sheet
    BeatSheet,
    /// Markdown episode rundown with runtimes
    EpisodeRundown,
    /// Markdown shooting schedule table in selection order
    ShootingSchedule,
    /// Index cards as CSV
    IndexCardsCsv,
    /// Index cards as JSON
    IndexCardsJson,
}

impl From<CliOutline> for OutlinePreset {
    fn from(p: CliOutline) -> Self {
        match p {
            CliOutline::BeatSheet => Self::BeatSheet,
            CliOutline::EpisodeRundown => Self::EpisodeRundown,
            CliOutline::ShootingSchedule => Self::ShootingSchedule,
            CliOutline::IndexCardsCsv => Self::IndexCardsCsv,
            CliOutline::IndexCardsJson => Self::IndexCardsJson,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliHeading {
    TitleOnly,
    SceneNumber,
    SceneNumberTitle,
}

impl From<CliHeading> for HeadingMode {
    fn from(h: CliHeading) -> Self {
        match h {
            CliHeading::TitleOnly => Self::TitleOnly,
            CliHeading::SceneNumber => Self::SceneNumber,
            CliHeading::SceneNumberTitle => Self::SceneNumberTitle,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliToc {
    Markdown,
    Plain,
    None,
}

impl From<CliToc> for TocMode {
    fn from(t: CliToc) -> Self {
        match t {
            CliToc::Markdown => Self::Markdown,
            CliToc::Plain => Self::Plain,
            CliToc::None => Self::None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let vault = FsVault::open(&cli.vault)
        .and_then(|v| v.exclude(&cli.exclude))
        .with_context(|| format!("Failed to open vault {}", cli.vault.display()))?;

    let mut settings = match &cli.settings {
        Some(path) => ExportSettings::from_json_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ExportSettings::default(),
    };

    if let Some(out) = cli.out {
        settings.output_folder = out;
    } else if settings.output_folder.is_relative() {
        settings.output_folder = vault.root().join(&settings.output_folder);
    }

    let mut builder = ExportJob::builder()
        .order(cli.order.into())
        .heading(cli.heading.into())
        .toc(cli.toc.into())
        .include_matter(cli.matter)
        .include_synopsis(cli.synopsis);

    builder = match (cli.outline, cli.pdf, cli.layout) {
        (Some(outline), _, _) => builder.outline(outline.into()),
        (None, true, Some(layout)) => builder.typeset(cli.preset.into(), layout),
        _ => builder.manuscript(cli.preset.into()),
    };

    if let Some(subplot) = cli.subplot {
        builder = builder.subplot(subplot);
    }

    if cli.start.is_some() || cli.end.is_some() {
        builder = builder.range(cli.start.unwrap_or(1), cli.end.unwrap_or(usize::MAX));
    }

    if let Some(parts) = cli.parts {
        builder = builder.parts(parts);
    }

    let job = builder.build().context("Failed to build export job")?;

    let exporter = Exporter::new(&vault, settings).context("Failed to create exporter")?;

    if cli.preview {
        exporter
            .preview(&job)
            .context("Failed to preview export")?
            .print();
        return Ok(());
    }

    let report = exporter.run(&job).context("Export failed")?;

    for message in &report.messages {
        println!("{message}");
    }
    report.stats.print_summary();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("manuscript_forge=info"),
        1 => EnvFilter::new("manuscript_forge=debug"),
        _ => EnvFilter::new("manuscript_forge=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
