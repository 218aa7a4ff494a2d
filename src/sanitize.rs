//! Note body cleanup.
//!
//! Frontmatter is always removed. Everything else is governed by a [`CleanupPolicy`],
//! and there are two of those because a plain-text export and a typeset export want
//! different things left in.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PERCENT_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)%%.*?%%").expect("valid regex"));
static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static EMBED: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[\[[^\]\n]*\]\]").expect("valid regex"));
static WIKILINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|\n]*)(?:\|([^\]\n]*))?\]\]").expect("valid regex"));
static MD_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[([^\]\n]*)\]\([^)\n]*\)").expect("valid regex"));
static MD_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]\n]*)\]\([^)\n]*\)").expect("valid regex"));
static BLOCK_ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:^|[ \t]+)\^[A-Za-z0-9-]+(?:[ \t]+\^[A-Za-z0-9-]+)*[ \t]*$")
        .expect("valid regex")
});
static EXCESS_BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid regex"));

/// Markup classes to strip from a note body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicy {
    /// Remove `%% … %%` and `<!-- … -->` spans
    pub strip_comments: bool,
    /// Replace links with their visible label
    pub strip_links: bool,
    /// Remove `> [!note]` callout blocks
    pub strip_callouts: bool,
    /// Remove `^block-id` anchors
    pub strip_block_anchors: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self::all()
    }
}

impl CleanupPolicy {
    /// Strips every markup class.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            strip_comments: true,
            strip_links: true,
            strip_callouts: true,
            strip_block_anchors: true,
        }
    }

    /// Leaves all markup in place (frontmatter is still removed).
    #[must_use]
    pub const fn none() -> Self {
        Self {
            strip_comments: false,
            strip_links: false,
            strip_callouts: false,
            strip_block_anchors: false,
        }
    }
}

/// Destination of a sanitized body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupTarget {
    /// Markdown or other plain-text output
    Plain,
    /// Input to the typesetting pipeline
    Typeset,
}

/// The two independent policies kept by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupPolicies {
    /// Policy for plain-text targets
    pub plain: CleanupPolicy,
    /// Policy for typeset targets
    pub typeset: CleanupPolicy,
}

impl Default for CleanupPolicies {
    fn default() -> Self {
        Self {
            // callouts often carry the writer's own notes, but plain exports keep them readable
            plain: CleanupPolicy {
                strip_callouts: false,
                ..CleanupPolicy::all()
            },
            typeset: CleanupPolicy::all(),
        }
    }
}

impl CleanupPolicies {
    /// Returns the policy for a destination.
    #[must_use]
    pub const fn for_target(&self, target: CleanupTarget) -> CleanupPolicy {
        match target {
            CleanupTarget::Plain => self.plain,
            CleanupTarget::Typeset => self.typeset,
        }
    }
}

/// Splits a leading `---` delimited metadata block from a note.
///
/// Returns `(metadata, body)`, or `None` when the note has no complete block.
#[must_use]
pub fn split_frontmatter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_end = rest.find('\n')?;
    if rest[..first_end].trim_end() != "---" {
        return None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in rest[yaml_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some((&rest[yaml_start..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Removes frontmatter plus whatever the policy enables.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    policy: CleanupPolicy,
}

impl Sanitizer {
    /// Creates a sanitizer for one policy.
    #[must_use]
    pub const fn new(policy: CleanupPolicy) -> Self {
        Self { policy }
    }

    /// Returns the active policy.
    #[must_use]
    pub const fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Produces the clean, trimmed body of a raw note.
    ///
    /// Never fails: unterminated markup is left as it is.
    #[must_use]
    pub fn sanitize(&self, raw: &str) -> String {
        let mut text = split_frontmatter(raw).map_or(raw, |(_, body)| body).to_string();

        // Stripping one class can expose another (a link label that reads like a
        // callout opener), so passes repeat until nothing changes. Every change
        // shortens the text, which bounds the loop.
        loop {
            let next = self.strip_pass(&text);
            if next == text {
                return next;
            }
            text = next;
        }
    }

    fn strip_pass(&self, text: &str) -> String {
        let mut text = text.to_string();

        if self.policy.strip_comments {
            text = PERCENT_COMMENT.replace_all(&text, "").into_owned();
            text = HTML_COMMENT.replace_all(&text, "").into_owned();
        }

        if self.policy.strip_links {
            text = strip_links(&text);
        }

        if self.policy.strip_callouts {
            text = strip_callouts(&text);
        }

        if self.policy.strip_block_anchors {
            text = BLOCK_ANCHOR.replace_all(&text, "").into_owned();
        }

        EXCESS_BLANK_LINES
            .replace_all(&text, "\n\n")
            .trim()
            .to_string()
    }
}

fn strip_links(text: &str) -> String {
    let text = EMBED.replace_all(text, "");
    let text = WIKILINK.replace_all(&text, |caps: &regex::Captures<'_>| {
        if let Some(label) = caps.get(2) {
            return label.as_str().to_string();
        }
        let target = caps.get(1).map_or("", |m| m.as_str());
        target
            .split(['#', '^'])
            .next()
            .unwrap_or(target)
            .trim()
            .to_string()
    });
    let text = MD_IMAGE.replace_all(&text, "$1");
    MD_LINK.replace_all(&text, "$1").into_owned()
}

fn is_callout_start(line: &str) -> bool {
    line.trim_start()
        .strip_prefix('>')
        .is_some_and(|rest| rest.trim_start().starts_with("[!"))
}

fn strip_callouts(text: &str) -> String {
    let mut kept = Vec::new();
    let mut in_callout = false;

    for line in text.lines() {
        if is_callout_start(line) {
            in_callout = true;
            continue;
        }
        if in_callout && line.trim_start().starts_with('>') {
            continue;
        }
        in_callout = false;
        kept.push(line);
    }

    kept.join("\n")
}
