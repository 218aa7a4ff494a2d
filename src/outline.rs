//! Structured outline views over a selection.
//!
//! Beat sheets, rundowns and schedules are markdown rendered through Tera; index cards
//! come out as CSV or JSON. Planning metrics are derived from the drafting rate and
//! daily writing minutes in [`PlanningSettings`].

use crate::{
    config::PlanningSettings,
    error::{Error, Result},
    pipeline::CancellationToken,
    preset::OutlinePreset,
    sanitize::Sanitizer,
    scene::SceneRecord,
    selector::OrderedSelection,
    template::TemplateEngine,
    token::{count_words, group_thousands},
    vault::Vault,
};
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Generated outline text and where it should go.
#[derive(Debug, Clone)]
pub struct OutlineDocument {
    /// Preset that produced the document
    pub preset: OutlinePreset,
    /// Generated text
    pub text: String,
    /// File extension, without the dot
    pub extension: &'static str,
    /// Words across the outlined scenes
    pub total_words: usize,
    /// Scenes whose word count could not be computed
    pub failures: Vec<Error>,
}

/// Optional columns and blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineOptions {
    /// Add each scene's synopsis
    pub include_synopsis: bool,
    /// Show word counts in the beat sheet
    pub include_word_counts: bool,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        Self {
            include_synopsis: false,
            include_word_counts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OutlineRow {
    number: String,
    title: String,
    when: Option<String>,
    subplot: String,
    runtime: Option<String>,
    runtime_seconds: Option<u64>,
    words: usize,
    writing_hours: Option<f64>,
    synopsis: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct PlanningView {
    wpm: String,
    hours: String,
    daily_minutes: Option<String>,
    sessions: Option<u64>,
}

#[derive(Serialize)]
struct OutlineView<'a> {
    rows: &'a [OutlineRow],
    include_synopsis: bool,
    include_words: bool,
    total_scenes: usize,
    total_words: usize,
    total_runtime: String,
    planning: Option<PlanningView>,
    planning_line: Option<String>,
}

#[derive(Serialize)]
struct IndexCardDocument<'a> {
    preset: &'static str,
    generated_at: String,
    summary: OutlineSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    planning: Option<PlanningSummary>,
    scenes: Vec<IndexCard<'a>>,
}

#[derive(Serialize)]
struct OutlineSummary {
    total_scenes: usize,
    total_words: usize,
    total_runtime_seconds: u64,
    total_runtime: String,
}

/// Session planning derived from the drafting settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanningSummary {
    /// Drafting rate in words per minute
    pub drafting_wpm: f64,
    /// Daily writing minutes, if configured
    pub daily_minutes: Option<f64>,
    /// `total words / wpm / 60`
    pub estimated_hours: f64,
    /// Sessions needed at the daily rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sessions: Option<u64>,
}

impl PlanningSummary {
    /// Derives the plan for `total_words`, or `None` without a drafting rate.
    #[must_use]
    pub fn compute(planning: &PlanningSettings, total_words: usize) -> Option<Self> {
        let wpm = planning.drafting_wpm.filter(|w| *w > 0.0)?;
        #[allow(clippy::cast_precision_loss)]
        let estimated_hours = total_words as f64 / wpm / 60.0;

        let daily_minutes = planning.daily_minutes;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sessions = daily_minutes
            .filter(|m| *m > 0.0)
            .map(|m| (estimated_hours / (m / 60.0)).ceil() as u64);

        Some(Self {
            drafting_wpm: wpm,
            daily_minutes,
            estimated_hours,
            sessions,
        })
    }
}

#[derive(Serialize)]
struct IndexCard<'a> {
    scene: &'a str,
    title: &'a str,
    when: Option<&'a str>,
    subplot: &'a str,
    runtime: Option<&'a str>,
    runtime_seconds: Option<u64>,
    words: usize,
    writing_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synopsis: Option<&'a str>,
}

/// Produces outline documents for a selection.
pub struct OutlineGenerator<'a> {
    vault: &'a dyn Vault,
    sanitizer: Sanitizer,
    planning: PlanningSettings,
    options: OutlineOptions,
    generated_at: DateTime<Local>,
    engine: TemplateEngine,
}

impl<'a> OutlineGenerator<'a> {
    /// Creates a generator. Word counts missing from records are computed from note bodies.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in templates fail to load.
    pub fn new(
        vault: &'a dyn Vault,
        sanitizer: Sanitizer,
        planning: PlanningSettings,
        options: OutlineOptions,
    ) -> Result<Self> {
        Ok(Self {
            vault,
            sanitizer,
            planning,
            options,
            generated_at: Local::now(),
            engine: TemplateEngine::new()?,
        })
    }

    /// Overrides the generation timestamp.
    #[must_use]
    pub fn generated_at(mut self, at: DateTime<Local>) -> Self {
        self.generated_at = at;
        self
    }

    /// Generates the outline for `preset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if cancelled between scene reads, or a template or
    /// serialization error.
    pub fn generate(
        &self,
        selection: &OrderedSelection,
        preset: OutlinePreset,
        cancel: &CancellationToken,
    ) -> Result<OutlineDocument> {
        let mut failures = Vec::new();
        let mut rows = Vec::with_capacity(selection.len());

        for (index, scene) in selection.scenes.iter().enumerate() {
            cancel.check()?;
            let words = self.word_count(scene, &mut failures);
            rows.push(self.row(scene, selection.first_position() + index, words));
        }

        let text = match preset {
            OutlinePreset::IndexCardsCsv => self.csv(&rows),
            OutlinePreset::IndexCardsJson => self.json(&rows)?,
            _ => self.markdown(preset, &rows)?,
        };

        debug!("Generated {} outline for {} scene(s)", preset.id(), rows.len());

        Ok(OutlineDocument {
            preset,
            text,
            extension: preset.extension(),
            total_words: rows.iter().map(|r| r.words).sum(),
            failures,
        })
    }

    fn word_count(&self, scene: &SceneRecord, failures: &mut Vec<Error>) -> usize {
        if let Some(words) = scene.word_count {
            return words;
        }
        match self.vault.read_note(&scene.path) {
            Ok(raw) => count_words(&self.sanitizer.sanitize(&raw)),
            Err(e) => {
                warn!("Could not count words in '{}': {}", scene.path, e);
                failures.push(Error::scene_read(&scene.path, &e));
                0
            }
        }
    }

    fn row(&self, scene: &SceneRecord, position: usize, words: usize) -> OutlineRow {
        #[allow(clippy::cast_precision_loss)]
        let writing_hours = self
            .planning
            .drafting_wpm
            .filter(|w| *w > 0.0)
            .map(|wpm| round2(words as f64 / wpm / 60.0));

        OutlineRow {
            number: scene
                .prefix
                .clone()
                .unwrap_or_else(|| position.to_string()),
            title: scene.title.clone(),
            when: scene.when.map(format_when),
            subplot: scene.subplot.clone(),
            runtime: scene.runtime_secs.map(format_runtime),
            runtime_seconds: scene.runtime_secs,
            words,
            writing_hours,
            synopsis: self
                .options
                .include_synopsis
                .then(|| scene.synopsis.as_deref().map(fold_whitespace))
                .flatten(),
        }
    }

    fn markdown(&self, preset: OutlinePreset, rows: &[OutlineRow]) -> Result<String> {
        let total_words = rows.iter().map(|r| r.words).sum();
        let planning = PlanningSummary::compute(&self.planning, total_words);

        let view = OutlineView {
            rows,
            include_synopsis: self.options.include_synopsis,
            include_words: self.options.include_word_counts,
            total_scenes: rows.len(),
            total_words,
            total_runtime: format_runtime(total_runtime(rows)),
            planning_line: planning.map(|p| planning_line(&p, total_words)),
            planning: planning.map(|p| PlanningView {
                wpm: format_number(p.drafting_wpm),
                hours: format!("{:.1}", p.estimated_hours),
                daily_minutes: p.daily_minutes.map(format_number),
                sessions: p.sessions,
            }),
        };

        let rendered = self.engine.render(preset, &view)?;
        let mut text = rendered.trim_end().to_string();
        text.push('\n');
        Ok(text)
    }

    fn csv(&self, rows: &[OutlineRow]) -> String {
        let mut header = vec!["Scene", "Title", "When", "Subplot", "Runtime", "Words"];
        if self.options.include_synopsis {
            header.push("Synopsis");
        }

        let mut out = header.join(",");
        out.push('\n');

        for row in rows {
            let mut fields = vec![
                csv_field(&row.number),
                csv_field(&row.title),
                csv_field(row.when.as_deref().unwrap_or("")),
                csv_field(&row.subplot),
                csv_field(row.runtime.as_deref().unwrap_or("")),
                row.words.to_string(),
            ];
            if self.options.include_synopsis {
                fields.push(csv_field(row.synopsis.as_deref().unwrap_or("")));
            }
            out.push_str(&fields.join(","));
            out.push('\n');
        }

        out
    }

    fn json(&self, rows: &[OutlineRow]) -> Result<String> {
        let total_words = rows.iter().map(|r| r.words).sum();
        let total_runtime_seconds = total_runtime(rows);

        let document = IndexCardDocument {
            preset: OutlinePreset::IndexCardsJson.id(),
            generated_at: self.generated_at.to_rfc3339(),
            summary: OutlineSummary {
                total_scenes: rows.len(),
                total_words,
                total_runtime_seconds,
                total_runtime: format_runtime(total_runtime_seconds),
            },
            planning: PlanningSummary::compute(&self.planning, total_words).map(|p| {
                PlanningSummary {
                    estimated_hours: round2(p.estimated_hours),
                    ..p
                }
            }),
            scenes: rows
                .iter()
                .map(|r| IndexCard {
                    scene: &r.number,
                    title: &r.title,
                    when: r.when.as_deref(),
                    subplot: &r.subplot,
                    runtime: r.runtime.as_deref(),
                    runtime_seconds: r.runtime_seconds,
                    words: r.words,
                    writing_hours: r.writing_hours,
                    synopsis: r.synopsis.as_deref(),
                })
                .collect(),
        };

        let mut text = serde_json::to_string_pretty(&document)?;
        text.push('\n');
        Ok(text)
    }
}

fn total_runtime(rows: &[OutlineRow]) -> u64 {
    rows.iter().filter_map(|r| r.runtime_seconds).sum()
}

fn planning_line(plan: &PlanningSummary, total_words: usize) -> String {
    let mut line = format!(
        "Planning: {} words at {} wpm is about {:.1} hours of drafting",
        group_thousands(total_words),
        format_number(plan.drafting_wpm),
        plan.estimated_hours
    );
    if let (Some(sessions), Some(minutes)) = (plan.sessions, plan.daily_minutes) {
        line.push_str(&format!(
            " ({sessions} sessions of {} minutes)",
            format_number(minutes)
        ));
    }
    line
}

/// Formats seconds as `M:SS`, or `H:MM:SS` from one hour up.
#[must_use]
pub fn format_runtime(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours == 0 {
        format!("{minutes}:{secs:02}")
    } else {
        format!("{hours}:{minutes:02}:{secs:02}")
    }
}

/// Quotes a CSV field when it contains a comma, quote or line break.
#[must_use]
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn format_when(when: NaiveDateTime) -> String {
    if when.num_seconds_from_midnight() == 0 {
        when.format("%Y-%m-%d").to_string()
    } else {
        when.format("%Y-%m-%d %H:%M").to_string()
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

fn fold_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
