//! Scene data providers.
//!
//! The host application owns note storage. The exporter only needs three things from it:
//! the raw scene records, the text of a note, and a way to check that a referenced note exists.

use crate::{
    error::{Error, Result},
    sanitize::split_frontmatter,
    scene::RawSceneRecord,
};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Read-only view of the host's notes.
pub trait Vault {
    /// Returns every record the provider knows about.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelectionLoad`] if the provider itself fails.
    fn records(&self) -> Result<Vec<RawSceneRecord>>;

    /// Reads the raw text of a note.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error; callers recover per scene.
    fn read_note(&self, path: &str) -> io::Result<String>;

    /// Looks up a vault-relative path in the note index, returning its on-disk location.
    fn resolve(&self, path: &str) -> Option<PathBuf>;
}

/// In-memory vault for programmatic callers and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    records: Vec<RawSceneRecord>,
    notes: HashMap<String, String>,
    unreadable: HashSet<String>,
    files: HashMap<String, PathBuf>,
    load_failure: Option<String>,
}

impl MemoryVault {
    /// Creates an empty vault.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record together with its note text.
    #[must_use]
    pub fn with_record(mut self, record: RawSceneRecord, text: impl Into<String>) -> Self {
        self.notes.insert(record.path.clone(), text.into());
        self.records.push(record);
        self
    }

    /// Adds a scene record built from a title, with the path `"{title}.md"`.
    #[must_use]
    pub fn with_scene(self, title: &str, text: impl Into<String>) -> Self {
        self.with_record(
            RawSceneRecord {
                item_type: Some("Scene".to_string()),
                path: format!("{title}.md"),
                title: Some(title.to_string()),
                ..RawSceneRecord::default()
            },
            text,
        )
    }

    /// Makes reads of the given note fail.
    #[must_use]
    pub fn with_unreadable(mut self, path: impl Into<String>) -> Self {
        self.unreadable.insert(path.into());
        self
    }

    /// Registers a non-scene file (such as a layout template) in the note index.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, on_disk: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into(), on_disk.into());
        self
    }

    /// Makes [`Vault::records`] fail with the given message.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.load_failure = Some(message.into());
        self
    }
}

impl Vault for MemoryVault {
    fn records(&self) -> Result<Vec<RawSceneRecord>> {
        match &self.load_failure {
            Some(message) => Err(Error::selection_load(message.clone())),
            None => Ok(self.records.clone()),
        }
    }

    fn read_note(&self, path: &str) -> io::Result<String> {
        if self.unreadable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "note is not readable",
            ));
        }
        self.notes
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "note not found"))
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        self.files.get(path).cloned()
    }
}

/// Vault backed by a directory of markdown notes with YAML frontmatter.
#[derive(Debug, Clone)]
pub struct FsVault {
    root: PathBuf,
    excludes: GlobSet,
}

impl FsVault {
    /// Opens a vault rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::config(format!(
                "Vault root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            excludes: GlobSet::empty(),
        })
    }

    /// Skips notes whose vault-relative path matches any of the glob patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid glob.
    pub fn exclude(mut self, patterns: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                Error::config(format!("Invalid glob pattern '{pattern}': {e}"))
            })?;
            builder.add(glob);
        }
        self.excludes = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build glob set: {e}")))?;
        Ok(self)
    }

    /// Vault root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn parse_note(relative: &str, text: &str) -> Option<RawSceneRecord> {
        let (yaml, _) = split_frontmatter(text)?;
        match serde_yaml::from_str::<RawSceneRecord>(yaml) {
            Ok(mut record) => {
                record.path = relative.to_string();
                Some(record)
            }
            Err(e) => {
                warn!("Skipping {}: unreadable frontmatter ({})", relative, e);
                None
            }
        }
    }
}

impl Vault for FsVault {
    fn records(&self) -> Result<Vec<RawSceneRecord>> {
        let mut records = Vec::new();

        debug!("Scanning vault {}", self.root.display());

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .follow_links(false)
            .build();

        for entry in walker {
            let entry = entry.map_err(|e| Error::selection_load(e.to_string()))?;
            let path = entry.path();

            if !entry.file_type().is_some_and(|ft| ft.is_file())
                || path.extension().and_then(|e| e.to_str()) != Some("md")
            {
                continue;
            }

            let relative = self.relative_path(path);
            if self.excludes.is_match(&relative) {
                trace!("Excluded by pattern: {}", relative);
                continue;
            }

            let text = fs::read_to_string(path)
                .map_err(|e| Error::selection_load(format!("{}: {e}", path.display())))?;

            if let Some(record) = Self::parse_note(&relative, &text) {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Found {} notes with frontmatter", records.len());
        Ok(records)
    }

    fn read_note(&self, path: &str) -> io::Result<String> {
        fs::read_to_string(self.root.join(path))
    }

    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let candidate = self.root.join(path);
        candidate.is_file().then_some(candidate)
    }
}
