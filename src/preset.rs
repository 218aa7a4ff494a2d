//! Export preset families.
//!
//! A manuscript preset selects the structural family a layout template belongs to;
//! an outline preset selects one of the non-manuscript structured views.

use serde::{Deserialize, Serialize};

/// Manuscript structural family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManuscriptPreset {
    /// Prose manuscript
    Novel,
    /// Screenplay manuscript
    Screenplay,
    /// Podcast or audio script
    Podcast,
}

impl ManuscriptPreset {
    /// Returns the ID string for this preset.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Novel => "novel",
            Self::Screenplay => "screenplay",
            Self::Podcast => "podcast",
        }
    }

    /// Short token used in output filenames.
    #[must_use]
    pub const fn acronym(self) -> &'static str {
        match self {
            Self::Novel => "Nov",
            Self::Screenplay => "Scr",
            Self::Podcast => "Pod",
        }
    }

    /// Returns all available manuscript presets.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Novel, Self::Screenplay, Self::Podcast]
    }

    /// Parse preset from string ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.id() == id)
    }
}

/// Structured outline view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutlinePreset {
    /// Numbered list of beats
    BeatSheet,
    /// Numbered rundown with dates and runtimes
    EpisodeRundown,
    /// Production table with session planning
    ShootingSchedule,
    /// One CSV row per scene
    IndexCardsCsv,
    /// One JSON object per scene
    IndexCardsJson,
}

impl OutlinePreset {
    /// Returns the ID string for this preset.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::BeatSheet => "beat-sheet",
            Self::EpisodeRundown => "episode-rundown",
            Self::ShootingSchedule => "shooting-schedule",
            Self::IndexCardsCsv => "index-cards-csv",
            Self::IndexCardsJson => "index-cards-json",
        }
    }

    /// Short token used in output filenames.
    #[must_use]
    pub const fn acronym(self) -> &'static str {
        match self {
            Self::BeatSheet => "BS",
            Self::EpisodeRundown => "ER",
            Self::ShootingSchedule => "SS",
            Self::IndexCardsCsv | Self::IndexCardsJson => "IC",
        }
    }

    /// Output file extension, without the dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::BeatSheet | Self::EpisodeRundown | Self::ShootingSchedule => "md",
            Self::IndexCardsCsv => "csv",
            Self::IndexCardsJson => "json",
        }
    }

    /// Returns all available outline presets.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::BeatSheet,
            Self::EpisodeRundown,
            Self::ShootingSchedule,
            Self::IndexCardsCsv,
            Self::IndexCardsJson,
        ]
    }

    /// Parse preset from string ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::all().iter().copied().find(|p| p.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_ids_round_trip() {
        for preset in OutlinePreset::all() {
            assert_eq!(OutlinePreset::from_id(preset.id()), Some(*preset));
        }
        assert_eq!(OutlinePreset::from_id("storyboard"), None);
    }

    #[test]
    fn test_manuscript_ids_round_trip() {
        for preset in ManuscriptPreset::all() {
            assert_eq!(ManuscriptPreset::from_id(preset.id()), Some(*preset));
        }
    }

    #[test]
    fn test_extensions() {
        assert_eq!(OutlinePreset::BeatSheet.extension(), "md");
        assert_eq!(OutlinePreset::IndexCardsCsv.extension(), "csv");
        assert_eq!(OutlinePreset::IndexCardsJson.extension(), "json");
    }

    #[test]
    fn test_serde_ids_match() {
        let json = serde_json::to_string(&OutlinePreset::ShootingSchedule).unwrap();
        assert_eq!(json, "\"shooting-schedule\"");
        let parsed: ManuscriptPreset = serde_json::from_str("\"screenplay\"").unwrap();
        assert_eq!(parsed, ManuscriptPreset::Screenplay);
    }
}
