//! Scene ordering, filtering and range restriction.

use crate::{
    error::Result,
    scene::{ItemKind, RawSceneRecord, SceneRecord},
    vault::Vault,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::iter::Peekable;
use std::str::Chars;
use tracing::debug;

/// Order in which scenes are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    /// By the numeric title prefix
    #[default]
    Narrative,
    /// Narrative order, reversed
    ReverseNarrative,
    /// By in-story timestamp
    Chronological,
    /// Chronological order, reversed
    ReverseChronological,
}

impl SortOrder {
    /// Returns the ID string for this order.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Narrative => "narrative",
            Self::ReverseNarrative => "reverse-narrative",
            Self::Chronological => "chronological",
            Self::ReverseChronological => "reverse-chronological",
        }
    }

    /// Short token used in output filenames.
    #[must_use]
    pub const fn acronym(self) -> &'static str {
        match self {
            Self::Narrative => "Narr",
            Self::ReverseNarrative => "RevNarr",
            Self::Chronological => "Chro",
            Self::ReverseChronological => "RevChro",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Narrative => "Narrative order",
            Self::ReverseNarrative => "Reverse narrative order",
            Self::Chronological => "Chronological order",
            Self::ReverseChronological => "Reverse chronological order",
        }
    }

    /// Returns all orders.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Narrative,
            Self::ReverseNarrative,
            Self::Chronological,
            Self::ReverseChronological,
        ]
    }

    /// Parse order from string ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|o| o.id() == id)
    }
}

/// Inclusive, 1-based range over an ordered scene list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRange {
    /// First position (1-based)
    pub start: usize,
    /// Last position (1-based, inclusive)
    pub end: usize,
}

impl SceneRange {
    /// Creates a range without validation; see [`SceneRange::clamp`].
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of positions covered.
    #[must_use]
    pub const fn len(self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    /// Always false for a clamped range.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.end < self.start
    }

    /// Clamps a requested range to a list of `total` items.
    ///
    /// Out-of-bounds requests clamp silently and `end < start` collapses to the single
    /// position `start`. Returns `None` only when `total` is zero.
    #[must_use]
    pub fn clamp(requested: Option<Self>, total: usize) -> Option<Self> {
        if total == 0 {
            return None;
        }
        let (requested_start, requested_end) = requested.map_or((1, total), |r| (r.start, r.end));

        let start = requested_start.max(1);
        let end = start.max(requested_end.min(total));
        let start = start.min(total);
        let end = end.min(total).max(start);

        Some(Self { start, end })
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionRequest {
    /// Ordering mode
    pub order: SortOrder,
    /// Keep only scenes with this subplot
    pub subplot: Option<String>,
    /// Restrict to this range of the ordered list
    pub range: Option<SceneRange>,
}

/// Ordered, filtered and range-restricted scenes for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedSelection {
    /// Ordering mode used
    pub order: SortOrder,
    /// Subplot filter used
    pub subplot: Option<String>,
    /// Clamped range, `None` when nothing matched
    pub range: Option<SceneRange>,
    /// Scenes matching the filter before range restriction
    pub available: usize,
    /// The selected scenes, in order
    pub scenes: Vec<SceneRecord>,
    /// Notes emitted before the first scene when matter is included
    pub front_matter: Vec<SceneRecord>,
    /// Notes emitted after the last scene when matter is included
    pub back_matter: Vec<SceneRecord>,
}

impl OrderedSelection {
    /// Number of selected scenes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// Returns true if no scene was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Position of the first selected scene within the full ordered list.
    #[must_use]
    pub fn first_position(&self) -> usize {
        self.range.map_or(1, |r| r.start)
    }

    /// Restricts the selection to a sub-range given in selection-relative positions.
    ///
    /// Front matter stays with a part that starts at position 1 and back matter with a part
    /// that ends at the last position.
    #[must_use]
    pub fn part(&self, part: SceneRange) -> Self {
        let Some(clamped) = SceneRange::clamp(Some(part), self.len()) else {
            return self.clone();
        };
        let offset = self.first_position() - 1;

        Self {
            order: self.order,
            subplot: self.subplot.clone(),
            range: Some(SceneRange::new(clamped.start + offset, clamped.end + offset)),
            available: self.available,
            scenes: self.scenes[clamped.start - 1..clamped.end].to_vec(),
            front_matter: if clamped.start == 1 {
                self.front_matter.clone()
            } else {
                Vec::new()
            },
            back_matter: if clamped.end == self.len() {
                self.back_matter.clone()
            } else {
                Vec::new()
            },
        }
    }

    /// One-line description of ordering, range and filter.
    #[must_use]
    pub fn description(&self) -> String {
        let mut out = self.order.label().to_string();
        if let Some(range) = self.range {
            if range.len() != self.available {
                out.push_str(&format!(
                    ", scenes {}-{} of {}",
                    range.start, range.end, self.available
                ));
            }
        }
        if let Some(subplot) = &self.subplot {
            out.push_str(&format!(", subplot: {subplot}"));
        }
        out
    }
}

/// Resolves provider records into an [`OrderedSelection`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneSelector;

impl SceneSelector {
    /// Loads records from the vault and selects from them.
    ///
    /// # Errors
    ///
    /// Propagates provider failures unchanged.
    pub fn load(vault: &dyn Vault, request: &SelectionRequest) -> Result<OrderedSelection> {
        let records = vault.records()?;
        Ok(Self::select(records, request))
    }

    /// Deduplicates, filters, orders and range-restricts the records.
    #[must_use]
    pub fn select(records: Vec<RawSceneRecord>, request: &SelectionRequest) -> OrderedSelection {
        let mut seen = HashSet::new();
        let records: Vec<SceneRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.path.clone()))
            .map(SceneRecord::from_raw)
            .collect();

        let mut front_matter = Vec::new();
        let mut back_matter = Vec::new();
        let mut scenes = Vec::new();

        for record in records {
            match record.kind {
                ItemKind::Scene => {
                    if request
                        .subplot
                        .as_deref()
                        .is_none_or(|wanted| record.subplot == wanted)
                    {
                        scenes.push(record);
                    }
                }
                ItemKind::FrontMatter => front_matter.push(record),
                ItemKind::BackMatter => back_matter.push(record),
                ItemKind::Other(_) => {}
            }
        }

        sort_scenes(&mut scenes, request.order);
        front_matter.sort_by(narrative_cmp);
        back_matter.sort_by(narrative_cmp);

        let available = scenes.len();
        let range = SceneRange::clamp(request.range, available);
        let scenes = match range {
            Some(r) => scenes.drain(r.start - 1..r.end).collect(),
            None => Vec::new(),
        };

        debug!(
            "Selected {} of {} scene(s) in {} order",
            scenes.len(),
            available,
            request.order.id()
        );

        OrderedSelection {
            order: request.order,
            subplot: request.subplot.clone(),
            range,
            available,
            scenes,
            front_matter,
            back_matter,
        }
    }
}

/// Sorts scenes in place. Reverse orders reverse the forward-sorted list.
pub fn sort_scenes(scenes: &mut [SceneRecord], order: SortOrder) {
    scenes.sort_by(narrative_cmp);

    match order {
        SortOrder::Narrative => {}
        SortOrder::ReverseNarrative => scenes.reverse(),
        SortOrder::Chronological => scenes.sort_by(chronological_cmp),
        SortOrder::ReverseChronological => {
            scenes.sort_by(chronological_cmp);
            scenes.reverse();
        }
    }
}

fn narrative_cmp(a: &SceneRecord, b: &SceneRecord) -> Ordering {
    let by_prefix = match (&a.prefix, &b.prefix) {
        (Some(pa), Some(pb)) => natural_cmp(pa, pb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_prefix
        .then_with(|| natural_cmp(&a.title, &b.title))
        .then_with(|| a.path.cmp(&b.path))
}

// Undated scenes sort after dated ones; stable sort keeps narrative order among ties.
fn chronological_cmp(a: &SceneRecord, b: &SceneRecord) -> Ordering {
    match (a.when, b.when) {
        (Some(wa), Some(wb)) => wa.cmp(&wb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compares strings treating runs of digits as numbers ("2" < "10").
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    // Zero padding only decides ties: "007" sorts after "7" but before "8".
    let mut padding = Ordering::Equal;

    loop {
        let ordering = match (left.peek().copied(), right.peek().copied()) {
            (None, None) => break,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                padding = padding.then(ln.len().cmp(&rn.len()));
                compare_digit_runs(&ln, &rn)
            }
            (Some(l), Some(r)) => {
                left.next();
                right.next();
                l.to_lowercase().cmp(r.to_lowercase())
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    padding.then_with(|| a.cmp(b))
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a_trimmed = a.trim_start_matches('0');
    let b_trimmed = b.trim_start_matches('0');
    a_trimmed
        .len()
        .cmp(&b_trimmed.len())
        .then_with(|| a_trimmed.cmp(b_trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(title: &str) -> RawSceneRecord {
        RawSceneRecord {
            item_type: Some("Scene".to_string()),
            path: format!("{title}.md"),
            title: Some(title.to_string()),
            ..RawSceneRecord::default()
        }
    }

    fn dated(title: &str, when: &str) -> RawSceneRecord {
        RawSceneRecord {
            when: Some(when.to_string()),
            ..scene(title)
        }
    }

    fn titles(selection: &OrderedSelection) -> Vec<&str> {
        selection.scenes.iter().map(|s| s.title.as_str()).collect()
    }

    fn request(order: SortOrder) -> SelectionRequest {
        SelectionRequest {
            order,
            ..SelectionRequest::default()
        }
    }

    #[test]
    fn test_natural_narrative_order() {
        let records = vec![scene("10 End"), scene("2 Middle"), scene("1 Intro")];
        let selection = SceneSelector::select(records, &request(SortOrder::Narrative));
        assert_eq!(titles(&selection), vec!["1 Intro", "2 Middle", "10 End"]);
    }

    #[test]
    fn test_reverse_is_reverse_of_sorted() {
        let mut twin_a = scene("2 Same");
        twin_a.path = "a/2 Same.md".to_string();
        let mut twin_b = scene("2 Same");
        twin_b.path = "b/2 Same.md".to_string();
        let records = vec![
            scene("2b Fork"),
            twin_b,
            scene("1 Start"),
            twin_a,
            scene("2a Fork"),
            scene("Coda"),
        ];

        let forward = SceneSelector::select(records.clone(), &request(SortOrder::Narrative));
        let reverse = SceneSelector::select(records, &request(SortOrder::ReverseNarrative));

        let mut expected: Vec<&str> = forward.scenes.iter().map(|s| s.path.as_str()).collect();
        expected.reverse();
        let actual: Vec<&str> = reverse.scenes.iter().map(|s| s.path.as_str()).collect();
        assert_eq!(actual, expected);
        assert_eq!(actual.first(), Some(&"Coda.md"));
        assert_eq!(actual.last(), Some(&"1 Start.md"));
    }

    #[test]
    fn test_chronological_and_reverse() {
        let records = vec![
            dated("1 Late", "2024-05-01"),
            dated("2 Early", "2024-01-01"),
            scene("3 Undated"),
            dated("4 Middle", "2024-03-01 12:00"),
        ];

        let chrono = SceneSelector::select(records.clone(), &request(SortOrder::Chronological));
        assert_eq!(
            titles(&chrono),
            vec!["2 Early", "4 Middle", "1 Late", "3 Undated"]
        );

        let reverse =
            SceneSelector::select(records, &request(SortOrder::ReverseChronological));
        assert_eq!(
            titles(&reverse),
            vec!["3 Undated", "1 Late", "4 Middle", "2 Early"]
        );
    }

    #[test]
    fn test_dedupe_and_scene_only() {
        let mut duplicate = scene("1 Intro");
        duplicate.title = Some("1 Intro (copy)".to_string());
        let character = RawSceneRecord {
            item_type: Some("Character".to_string()),
            path: "Ada.md".to_string(),
            ..RawSceneRecord::default()
        };
        let records = vec![scene("1 Intro"), duplicate, character];

        let selection = SceneSelector::select(records, &SelectionRequest::default());
        assert_eq!(titles(&selection), vec!["1 Intro"]);
    }

    #[test]
    fn test_subplot_filter_before_or_after_sort_is_identical() {
        let mut a = scene("1 A");
        a.subplot = Some("Heist".to_string());
        let b = scene("2 B");
        let mut c = scene("3 C");
        c.subplot = Some("Heist".to_string());

        let filtered = SceneSelector::select(
            vec![c.clone(), b.clone(), a.clone()],
            &SelectionRequest {
                subplot: Some("Heist".to_string()),
                ..SelectionRequest::default()
            },
        );
        assert_eq!(titles(&filtered), vec!["1 A", "3 C"]);

        let all = SceneSelector::select(vec![c, b, a], &SelectionRequest::default());
        let post: Vec<&str> = all
            .scenes
            .iter()
            .filter(|s| s.subplot == "Heist")
            .map(|s| s.title.as_str())
            .collect();
        assert_eq!(titles(&filtered), post);

        let main = SceneSelector::select(
            vec![scene("9 Z")],
            &SelectionRequest {
                subplot: Some(crate::scene::MAIN_PLOT.to_string()),
                ..SelectionRequest::default()
            },
        );
        assert_eq!(main.len(), 1);
    }

    #[test]
    fn test_range_clamping() {
        assert_eq!(
            SceneRange::clamp(Some(SceneRange::new(0, 999)), 5),
            Some(SceneRange::new(1, 5))
        );
        assert_eq!(
            SceneRange::clamp(Some(SceneRange::new(4, 2)), 5),
            Some(SceneRange::new(4, 4))
        );
        assert_eq!(
            SceneRange::clamp(Some(SceneRange::new(7, 9)), 5),
            Some(SceneRange::new(5, 5))
        );
        assert_eq!(SceneRange::clamp(None, 3), Some(SceneRange::new(1, 3)));
        assert_eq!(SceneRange::clamp(Some(SceneRange::new(1, 2)), 0), None);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = SceneRange::new(4, 2);
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert_eq!(SceneRange::new(2, 4).len(), 3);
        assert_eq!(SceneRange::new(1, usize::MAX).len(), usize::MAX);
    }

    #[test]
    fn test_range_applied_to_selection() {
        let records: Vec<_> = (1..=5).map(|i| scene(&format!("{i} S"))).collect();

        let all = SceneSelector::select(
            records.clone(),
            &SelectionRequest {
                range: Some(SceneRange::new(0, 999)),
                ..SelectionRequest::default()
            },
        );
        assert_eq!(all.len(), 5);

        let single = SceneSelector::select(
            records,
            &SelectionRequest {
                range: Some(SceneRange::new(4, 2)),
                ..SelectionRequest::default()
            },
        );
        assert_eq!(titles(&single), vec!["4 S"]);
        assert_eq!(single.first_position(), 4);
    }

    #[test]
    fn test_empty_selection_is_valid() {
        let selection = SceneSelector::select(
            vec![scene("1 A")],
            &SelectionRequest {
                subplot: Some("Nope".to_string()),
                ..SelectionRequest::default()
            },
        );
        assert!(selection.is_empty());
        assert!(selection.range.is_none());
    }

    #[test]
    fn test_matter_collected_separately() {
        let front = RawSceneRecord {
            item_type: Some("Frontmatter".to_string()),
            path: "Dedication.md".to_string(),
            ..RawSceneRecord::default()
        };
        let back = RawSceneRecord {
            item_type: Some("Backmatter".to_string()),
            path: "Acknowledgements.md".to_string(),
            ..RawSceneRecord::default()
        };
        let selection = SceneSelector::select(
            vec![front, scene("1 A"), back, scene("2 B")],
            &SelectionRequest::default(),
        );
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.front_matter.len(), 1);
        assert_eq!(selection.back_matter.len(), 1);

        let head = selection.part(SceneRange::new(1, 1));
        assert_eq!(head.front_matter.len(), 1);
        assert!(head.back_matter.is_empty());
        let tail = selection.part(SceneRange::new(2, 2));
        assert!(tail.front_matter.is_empty());
        assert_eq!(tail.back_matter.len(), 1);
        assert_eq!(tail.first_position(), 2);
    }

    #[test]
    fn test_natural_cmp() {
        assert_eq!(natural_cmp("2", "10"), Ordering::Less);
        assert_eq!(natural_cmp("007", "7"), Ordering::Greater);
        assert_eq!(natural_cmp("007", "8"), Ordering::Less);
        assert_eq!(natural_cmp("Scene 01a", "Scene 1b"), Ordering::Less);
        assert_eq!(natural_cmp("Scene 9", "scene 10"), Ordering::Less);
        assert_eq!(natural_cmp("2a", "2b"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abc"), Ordering::Equal);
    }

    #[test]
    fn test_description() {
        let records: Vec<_> = (1..=4).map(|i| scene(&format!("{i} S"))).collect();
        let selection = SceneSelector::select(
            records,
            &SelectionRequest {
                order: SortOrder::Chronological,
                subplot: None,
                range: Some(SceneRange::new(2, 3)),
            },
        );
        assert_eq!(
            selection.description(),
            "Chronological order, scenes 2-3 of 4"
        );
    }
}
