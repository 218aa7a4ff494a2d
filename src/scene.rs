use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use tracing::debug;

/// Subplot assigned to scenes that do not name one.
pub const MAIN_PLOT: &str = "Main Plot";

static NUMERIC_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)").expect("valid prefix regex"));

static PREFIX_WITH_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\d+(?:\.\d+)?[a-zA-Z]?[\s.:\-_)]*").expect("valid prefix regex"));

static RUNTIME_UNITS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(h|hr|hrs|hours?|m|min|mins|minutes?|s|sec|secs|seconds?)\b")
        .expect("valid runtime regex")
});

/// Classification of a note supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// A narrative scene
    Scene,
    /// Material placed before the first scene
    FrontMatter,
    /// Material placed after the last scene
    BackMatter,
    /// Anything else the provider reports
    Other(String),
}

impl ItemKind {
    /// Classifies a provider item type string. Matching is case-insensitive.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        let Some(raw) = value.map(str::trim) else {
            return Self::Other(String::new());
        };
        match raw.to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "scene" => Self::Scene,
            "frontmatter" => Self::FrontMatter,
            "backmatter" => Self::BackMatter,
            _ => Self::Other(raw.to_string()),
        }
    }
}

/// Loosely-typed record as handed over by the scene data provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSceneRecord {
    /// Provider classification, e.g. "Scene"
    #[serde(alias = "Class", alias = "itemType", deserialize_with = "lenient_string")]
    pub item_type: Option<String>,
    /// Stable path or reference id
    pub path: String,
    /// Display title; falls back to the file stem
    #[serde(alias = "Title", deserialize_with = "lenient_string")]
    pub title: Option<String>,
    /// In-story timestamp
    #[serde(alias = "When", deserialize_with = "lenient_string")]
    pub when: Option<String>,
    /// Subplot label
    #[serde(alias = "Subplot", deserialize_with = "lenient_string")]
    pub subplot: Option<String>,
    /// Short synopsis
    #[serde(alias = "Synopsis", deserialize_with = "lenient_string")]
    pub synopsis: Option<String>,
    /// Runtime as seconds or a duration string
    #[serde(alias = "Runtime", deserialize_with = "lenient_string")]
    pub runtime: Option<String>,
    /// Precomputed word count
    #[serde(alias = "Words", alias = "wordCount")]
    pub word_count: Option<usize>,
}

/// Accepts strings, numbers and booleans where hosts are inconsistent about scalar types.
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(Option::<Loose>::deserialize(deserializer)?.map(|v| match v {
        Loose::Text(s) => s,
        Loose::Int(i) => i.to_string(),
        Loose::Float(f) => f.to_string(),
        Loose::Flag(b) => b.to_string(),
    }))
}

/// Fully-typed, defaulted scene snapshot.
///
/// Built once at the selector boundary from a [`RawSceneRecord`]; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneRecord {
    /// Stable path or reference id
    pub path: String,
    /// Classification
    pub kind: ItemKind,
    /// Display title
    pub title: String,
    /// Leading numeric token of the title
    pub prefix: Option<String>,
    /// In-story timestamp
    pub when: Option<NaiveDateTime>,
    /// Subplot label, [`MAIN_PLOT`] when blank
    pub subplot: String,
    /// Short synopsis
    pub synopsis: Option<String>,
    /// Runtime in seconds
    pub runtime_secs: Option<u64>,
    /// Word count if the provider already knows it
    pub word_count: Option<usize>,
}

impl SceneRecord {
    /// Validates a provider record and fills in defaults.
    #[must_use]
    pub fn from_raw(raw: RawSceneRecord) -> Self {
        let title = raw
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map_or_else(|| title_from_path(&raw.path), str::to_string);

        let when = raw.when.as_deref().and_then(|w| {
            let parsed = parse_when(w);
            if parsed.is_none() {
                debug!("Ignoring unparseable When '{}' on {}", w, raw.path);
            }
            parsed
        });

        let subplot = raw
            .subplot
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(MAIN_PLOT)
            .to_string();

        Self {
            kind: ItemKind::parse(raw.item_type.as_deref()),
            prefix: numeric_prefix(&title),
            runtime_secs: raw.runtime.as_deref().and_then(parse_runtime),
            synopsis: raw
                .synopsis
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            word_count: raw.word_count,
            path: raw.path,
            title,
            when,
            subplot,
        }
    }

    /// Creates a scene with only a path and title, mainly for programmatic callers.
    #[must_use]
    pub fn scene(path: impl Into<String>, title: impl Into<String>) -> Self {
        Self::from_raw(RawSceneRecord {
            item_type: Some("Scene".to_string()),
            path: path.into(),
            title: Some(title.into()),
            ..RawSceneRecord::default()
        })
    }

    /// Returns true if this record is a scene.
    #[must_use]
    pub fn is_scene(&self) -> bool {
        self.kind == ItemKind::Scene
    }

    /// Title without its numeric prefix.
    #[must_use]
    pub fn clean_title(&self) -> String {
        if self.prefix.is_none() {
            return self.title.clone();
        }
        let stripped = PREFIX_WITH_SEPARATOR.replace(&self.title, "");
        if stripped.trim().is_empty() {
            self.title.clone()
        } else {
            stripped.trim().to_string()
        }
    }
}

/// Extracts the leading numeric token of a title ("12 Storm" → "12", "3.5 Aside" → "3.5").
#[must_use]
pub fn numeric_prefix(title: &str) -> Option<String> {
    NUMERIC_PREFIX
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn title_from_path(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map_or_else(|| path.to_string(), |s| s.to_string_lossy().to_string())
}

/// Parses an in-story timestamp.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` and the `T`-separated variants.
#[must_use]
pub fn parse_when(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
    ];
    FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parses a runtime into seconds.
///
/// Accepts plain seconds (`"150"`), clock form (`"2:30"`, `"1:02:03"`) and unit
/// strings (`"1h 2m"`, `"90 sec"`).
#[must_use]
pub fn parse_runtime(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }

    if value.contains(':') {
        let parts: Option<Vec<u64>> = value.split(':').map(|p| p.trim().parse().ok()).collect();
        return match parts?.as_slice() {
            [m, s] => m.checked_mul(60)?.checked_add(*s),
            [h, m, s] => h
                .checked_mul(3600)?
                .checked_add(m.checked_mul(60)?)?
                .checked_add(*s),
            _ => None,
        };
    }

    let mut total = 0.0_f64;
    let mut matched = false;
    for caps in RUNTIME_UNITS.captures_iter(value) {
        let amount: f64 = caps[1].parse().ok()?;
        let unit = caps[2].to_ascii_lowercase();
        let factor = match unit.chars().next() {
            Some('h') => 3600.0,
            Some('m') => 60.0,
            _ => 1.0,
        };
        total += amount * factor;
        matched = true;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let seconds = total.round() as u64;
    matched.then_some(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str) -> RawSceneRecord {
        RawSceneRecord {
            item_type: Some("Scene".to_string()),
            path: format!("Scenes/{title}.md"),
            title: Some(title.to_string()),
            ..RawSceneRecord::default()
        }
    }

    #[test]
    fn test_defaults_applied_at_boundary() {
        let scene = SceneRecord::from_raw(RawSceneRecord {
            path: "Book/7 Harbor.md".to_string(),
            item_type: Some("scene".to_string()),
            subplot: Some("   ".to_string()),
            ..RawSceneRecord::default()
        });

        assert_eq!(scene.title, "7 Harbor");
        assert_eq!(scene.prefix.as_deref(), Some("7"));
        assert_eq!(scene.subplot, MAIN_PLOT);
        assert!(scene.is_scene());
        assert!(scene.when.is_none());
    }

    #[test]
    fn test_item_kind_parse() {
        assert_eq!(ItemKind::parse(Some("Scene")), ItemKind::Scene);
        assert_eq!(ItemKind::parse(Some("Front Matter")), ItemKind::FrontMatter);
        assert_eq!(ItemKind::parse(Some("backmatter")), ItemKind::BackMatter);
        assert_eq!(
            ItemKind::parse(Some("Character")),
            ItemKind::Other("Character".to_string())
        );
    }

    #[test]
    fn test_numeric_prefix() {
        assert_eq!(numeric_prefix("12 The Storm").as_deref(), Some("12"));
        assert_eq!(numeric_prefix("3.5 Aside").as_deref(), Some("3.5"));
        assert_eq!(numeric_prefix("2a Fork").as_deref(), Some("2"));
        assert_eq!(numeric_prefix("Prologue"), None);
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(SceneRecord::from_raw(raw("12 The Storm")).clean_title(), "The Storm");
        assert_eq!(SceneRecord::from_raw(raw("4. Arrival")).clean_title(), "Arrival");
        assert_eq!(SceneRecord::from_raw(raw("Prologue")).clean_title(), "Prologue");
        assert_eq!(SceneRecord::from_raw(raw("42")).clean_title(), "42");
    }

    #[test]
    fn test_parse_when() {
        let dt = parse_when("2024-03-05 14:30").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-03-05 14:30");
        assert!(parse_when("2024-03-05").is_some());
        assert!(parse_when("2024-03-05T09:15:00").is_some());
        assert!(parse_when("next tuesday").is_none());
    }

    #[test]
    fn test_raw_record_accepts_numeric_scalars() {
        let raw: RawSceneRecord = serde_json::from_str(
            r#"{"Class": "Scene", "path": "a.md", "Runtime": 150, "Words": 900, "Title": 3}"#,
        )
        .unwrap();
        let scene = SceneRecord::from_raw(raw);
        assert_eq!(scene.runtime_secs, Some(150));
        assert_eq!(scene.word_count, Some(900));
        assert_eq!(scene.title, "3");
    }

    #[test]
    fn test_parse_runtime() {
        assert_eq!(parse_runtime("150"), Some(150));
        assert_eq!(parse_runtime("2:30"), Some(150));
        assert_eq!(parse_runtime("1:02:03"), Some(3723));
        assert_eq!(parse_runtime("1h 2m 3s"), Some(3723));
        assert_eq!(parse_runtime("90 sec"), Some(90));
        assert_eq!(parse_runtime("1.5 min"), Some(90));
        assert_eq!(parse_runtime("soon"), None);
        assert_eq!(parse_runtime(""), None);
    }

    #[test]
    fn test_parse_runtime_overflow_is_none() {
        assert_eq!(parse_runtime("307445734561825861:00"), None);
        assert_eq!(parse_runtime("5124095576030432:00:00"), None);
        assert_eq!(parse_runtime("1:18446744073709551615"), None);
    }
}
