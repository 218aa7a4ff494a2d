//! Manuscript assembly.
//!
//! Turns an [`OrderedSelection`] into one document: a heading per scene, the sanitized
//! body below it, and an optional table of contents up front. A scene that cannot be
//! read is replaced by a placeholder so the rest of the manuscript still comes out.

use crate::{
    error::{Error, Result},
    pipeline::CancellationToken,
    sanitize::Sanitizer,
    scene::SceneRecord,
    selector::OrderedSelection,
    token::{count_words, group_thousands},
    vault::Vault,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How a scene's heading label is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeadingMode {
    /// The title without its numeric prefix
    #[default]
    TitleOnly,
    /// `Scene {n}`
    SceneNumber,
    /// `{n}. {title}`
    SceneNumberTitle,
}

impl HeadingMode {
    /// Returns the ID string for this mode.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::TitleOnly => "title-only",
            Self::SceneNumber => "scene-number",
            Self::SceneNumberTitle => "scene-number-title",
        }
    }

    /// Builds the label for a scene with the given display number.
    #[must_use]
    pub fn label(self, scene: &SceneRecord, number: &str) -> String {
        match self {
            Self::TitleOnly => scene.clean_title(),
            Self::SceneNumber => format!("Scene {number}"),
            Self::SceneNumberTitle => format!("{number}. {}", scene.clean_title()),
        }
    }
}

/// How a heading is written into the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeadingRender {
    /// A markdown `##` heading
    #[default]
    MarkdownHeading,
    /// A raw `\section*` opener plus a page-style reset, for the typeset pipeline
    LatexSectionStarred,
}

/// Table of contents rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TocMode {
    /// Numbered entries linking to in-document anchors
    Markdown,
    /// Numbered plain-text entries
    Plain,
    /// No table of contents
    #[default]
    None,
}

impl TocMode {
    /// Returns the ID string for this mode.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Plain => "plain",
            Self::None => "none",
        }
    }
}

/// Layout choices for one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    /// Heading label style
    pub heading: HeadingMode,
    /// Heading output form
    pub render: HeadingRender,
    /// Table of contents style
    pub toc: TocMode,
    /// Emit front and back matter around the scenes
    pub include_matter: bool,
}

/// One scene as it landed in the manuscript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledScene {
    /// Vault path of the scene note
    pub path: String,
    /// Original title
    pub title: String,
    /// Heading label emitted
    pub label: String,
    /// Anchor used by the markdown table of contents
    pub anchor: String,
    /// Words in the sanitized body
    pub words: usize,
    /// True if the body was replaced with a placeholder
    pub failed: bool,
}

/// The assembled document and its counts.
#[derive(Debug, Clone)]
pub struct AssembledManuscript {
    /// Full document text
    pub text: String,
    /// Words across scenes and any included matter
    pub total_words: usize,
    /// Number of scenes (matter excluded)
    pub total_scenes: usize,
    /// Per-scene details, in order
    pub scenes: Vec<AssembledScene>,
    /// Description of the ordering and filter used
    pub sort_order: String,
    /// Scene reads that failed and were replaced
    pub failures: Vec<Error>,
}

impl AssembledManuscript {
    /// Returns true if any scene was replaced with a placeholder.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Concatenates sanitized scene bodies into a manuscript.
pub struct Assembler<'a> {
    vault: &'a dyn Vault,
    sanitizer: Sanitizer,
    options: AssemblyOptions,
}

impl<'a> Assembler<'a> {
    /// Creates an assembler reading notes from `vault`.
    #[must_use]
    pub fn new(vault: &'a dyn Vault, sanitizer: Sanitizer, options: AssemblyOptions) -> Self {
        Self {
            vault,
            sanitizer,
            options,
        }
    }

    /// Assembles the selection.
    ///
    /// Unreadable scenes are recovered with a placeholder and listed in
    /// [`AssembledManuscript::failures`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires between scene reads.
    pub fn assemble(
        &self,
        selection: &OrderedSelection,
        cancel: &CancellationToken,
    ) -> Result<AssembledManuscript> {
        let mut failures = Vec::new();
        let mut scenes = Vec::with_capacity(selection.len());
        let mut blocks = Vec::new();
        let mut total_words = 0;

        if self.options.include_matter {
            for note in &selection.front_matter {
                cancel.check()?;
                if let Some(body) = self.read_matter(note, &mut failures) {
                    total_words += count_words(&body);
                    blocks.push(body);
                }
            }
        }

        for (index, scene) in selection.scenes.iter().enumerate() {
            cancel.check()?;

            let number = scene
                .prefix
                .clone()
                .unwrap_or_else(|| (selection.first_position() + index).to_string());
            let label = self.options.heading.label(scene, &number);

            let (body, failed) = match self.vault.read_note(&scene.path) {
                Ok(raw) => (self.sanitizer.sanitize(&raw), false),
                Err(e) => {
                    warn!("Could not read scene '{}': {}", scene.path, e);
                    let placeholder = placeholder(&scene.title, &e.to_string());
                    failures.push(Error::scene_read(&scene.path, &e));
                    (placeholder, true)
                }
            };

            let words = if failed { 0 } else { count_words(&body) };
            total_words += words;

            let mut block = self.heading(&label);
            if !body.is_empty() {
                block.push_str("\n\n");
                block.push_str(&body);
            }
            blocks.push(block);

            scenes.push(AssembledScene {
                path: scene.path.clone(),
                title: scene.title.clone(),
                anchor: slugify(&label),
                label,
                words,
                failed,
            });
        }

        if self.options.include_matter {
            for note in &selection.back_matter {
                cancel.check()?;
                if let Some(body) = self.read_matter(note, &mut failures) {
                    total_words += count_words(&body);
                    blocks.push(body);
                }
            }
        }

        if let Some(toc) = table_of_contents(self.options.toc, &scenes) {
            blocks.insert(0, toc);
        }

        let mut text = blocks.join("\n\n");
        text.push('\n');

        debug!(
            "Assembled {} scene(s), {} words, {} failure(s)",
            scenes.len(),
            total_words,
            failures.len()
        );

        Ok(AssembledManuscript {
            text,
            total_words,
            total_scenes: scenes.len(),
            scenes,
            sort_order: selection.description(),
            failures,
        })
    }

    fn read_matter(&self, note: &SceneRecord, failures: &mut Vec<Error>) -> Option<String> {
        match self.vault.read_note(&note.path) {
            Ok(raw) => Some(self.sanitizer.sanitize(&raw)).filter(|b| !b.is_empty()),
            Err(e) => {
                warn!("Could not read matter '{}': {}", note.path, e);
                failures.push(Error::scene_read(&note.path, &e));
                Some(placeholder(&note.title, &e.to_string()))
            }
        }
    }

    fn heading(&self, label: &str) -> String {
        match self.options.render {
            HeadingRender::MarkdownHeading => format!("## {label}"),
            HeadingRender::LatexSectionStarred => format!(
                "```{{=latex}}\n\\section*{{{}}}\n\\thispagestyle{{plain}}\n```",
                latex_escape(label)
            ),
        }
    }
}

fn placeholder(title: &str, reason: &str) -> String {
    format!("> [Scene \"{title}\" could not be read: {reason}]")
}

fn table_of_contents(mode: TocMode, scenes: &[AssembledScene]) -> Option<String> {
    let mut lines = match mode {
        TocMode::None => return None,
        TocMode::Markdown => vec!["## Contents".to_string(), String::new()],
        TocMode::Plain => vec!["Contents".to_string(), String::new()],
    };

    for (i, scene) in scenes.iter().enumerate() {
        let words = group_thousands(scene.words);
        lines.push(match mode {
            TocMode::Markdown => format!(
                "{}. [{}](#{}) — {} words",
                i + 1,
                scene.title,
                scene.anchor,
                words
            ),
            _ => format!("{}. {} ({} words)", i + 1, scene.title, words),
        });
    }

    Some(lines.join("\n"))
}

/// Lowercase anchor slug of a heading label, as markdown renderers generate it.
#[must_use]
pub fn slugify(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('-'),
            _ => None,
        })
        .collect()
}

/// Escapes text for use inside a LaTeX command argument.
#[must_use]
pub fn latex_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '$' => out.push_str("\\$"),
            '&' => out.push_str("\\&"),
            '#' => out.push_str("\\#"),
            '^' => out.push_str("\\^{}"),
            '_' => out.push_str("\\_"),
            '%' => out.push_str("\\%"),
            '~' => out.push_str("\\~{}"),
            _ => out.push(c),
        }
    }
    out
}
