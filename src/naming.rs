use crate::{config::ExportTarget, selector::SortOrder};
use chrono::NaiveDateTime;
use std::path::Path;

const ILLEGAL_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Builds deterministic output file names.
///
/// Shape: `{category} {preset} {Sub-}{order} {timestamp}[ Part i of k].{ext}`.
#[derive(Debug, Clone)]
pub struct FilenameBuilder {
    timestamp: NaiveDateTime,
    book_title: Option<String>,
}

impl FilenameBuilder {
    /// Creates a builder stamping names with `timestamp`.
    #[must_use]
    pub fn new(timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            book_title: None,
        }
    }

    /// Uses the book title in place of the category for typeset output.
    #[must_use]
    pub fn book_title(mut self, title: Option<impl Into<String>>) -> Self {
        self.book_title = title.map(Into::into);
        self
    }

    /// File name for one artifact; `part` is `(index, count)` with a 1-based index.
    #[must_use]
    pub fn build(
        &self,
        target: &ExportTarget,
        order: SortOrder,
        subplot_filtered: bool,
        part: Option<(usize, usize)>,
    ) -> String {
        let category = match (target, self.book_title.as_deref().map(book_stem)) {
            (ExportTarget::Typeset { .. }, Some(stem)) if !stem.is_empty() => stem,
            _ => target.category().to_string(),
        };

        let mut stem = format!(
            "{} {} {}{} {}",
            category,
            target.preset_acronym(),
            if subplot_filtered { "Sub-" } else { "" },
            order.acronym(),
            friendly_timestamp(self.timestamp)
        );

        if let Some((index, count)) = part {
            stem.push_str(&format!(" Part {index} of {count}"));
        }

        format!("{}.{}", sanitize_filename(&stem), target.extension())
    }
}

/// Formats a timestamp as `Mar 5 @ 2.07PM`.
#[must_use]
pub fn friendly_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format("%b %-d @ %-I.%M%p").to_string()
}

/// Readable stem of a book title or file name: extension dropped, `-` and `_` as spaces.
#[must_use]
pub fn book_stem(title: &str) -> String {
    let trimmed = title.trim();
    let stem = Path::new(trimmed)
        .file_stem()
        .filter(|_| Path::new(trimmed).extension().is_some_and(|e| e.len() <= 4))
        .map_or_else(|| trimmed.to_string(), |s| s.to_string_lossy().to_string());

    stem.replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Replaces characters that are not allowed in file names with `-`.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { '-' } else { c })
        .collect()
}
