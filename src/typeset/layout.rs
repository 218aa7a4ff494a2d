use crate::{
    error::{Error, Result},
    preset::ManuscriptPreset,
    typeset::prepare::LEGACY_SECTION_PATCH,
    vault::Vault,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A typesetting template bound to a manuscript preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTemplate {
    /// Stable identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Preset the template belongs to
    pub preset: ManuscriptPreset,

    /// Template file, vault-relative or absolute
    pub path: String,

    /// Raw LaTeX injected ahead of the document for templates that need it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compat_directives: Option<String>,
}

impl LayoutTemplate {
    /// Creates a template entry.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        preset: ManuscriptPreset,
        path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            preset,
            path: path.into(),
            compat_directives: None,
        }
    }

    /// Attaches compatibility directives.
    #[must_use]
    pub fn with_compat_directives(mut self, directives: impl Into<String>) -> Self {
        self.compat_directives = Some(directives.into());
        self
    }

    /// Checks that the template file can be read.
    ///
    /// Absolute paths are checked on the filesystem; relative paths are looked up in the
    /// vault's note index.
    #[must_use]
    pub fn validate(&self, vault: &dyn Vault) -> TemplateValidation {
        let path = Path::new(&self.path);

        if path.is_absolute() {
            return match fs::File::open(path) {
                Ok(_) if path.is_file() => TemplateValidation::valid(path.to_path_buf()),
                Ok(_) => TemplateValidation::invalid(format!(
                    "Template path is not a file: {}",
                    path.display()
                )),
                Err(e) => TemplateValidation::invalid(format!(
                    "Template file is not readable: {} ({e})",
                    path.display()
                )),
            };
        }

        match vault.resolve(&self.path) {
            Some(resolved) => TemplateValidation::valid(resolved),
            None => TemplateValidation::invalid(format!(
                "Template file not found in vault: {}",
                self.path
            )),
        }
    }
}

/// Outcome of [`LayoutTemplate::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateValidation {
    /// True if the template can be used
    pub valid: bool,

    /// Why the template cannot be used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// On-disk location of a valid template
    #[serde(skip)]
    pub resolved: Option<PathBuf>,
}

impl TemplateValidation {
    fn valid(resolved: PathBuf) -> Self {
        Self {
            valid: true,
            error: None,
            resolved: Some(resolved),
        }
    }

    fn invalid(error: String) -> Self {
        Self {
            valid: false,
            error: Some(error),
            resolved: None,
        }
    }

    /// Converts into the resolved path, or [`Error::TemplateInvalid`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateInvalid`] when validation failed.
    pub fn into_result(self, template: &str) -> Result<PathBuf> {
        match (self.valid, self.resolved) {
            (true, Some(path)) => Ok(path),
            _ => Err(Error::template_invalid(
                template,
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

/// The host's layout template registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutRegistry {
    templates: Vec<LayoutTemplate>,
}

impl LayoutRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a template, replacing any existing entry with the same id.
    #[must_use]
    pub fn with_template(mut self, template: LayoutTemplate) -> Self {
        self.templates.retain(|t| t.id != template.id);
        self.templates.push(template);
        self
    }

    /// Attaches [`LEGACY_SECTION_PATCH`] to the template with this id.
    #[must_use]
    pub fn with_legacy_patch(mut self, id: &str) -> Self {
        if let Some(template) = self.templates.iter_mut().find(|t| t.id == id) {
            debug!("Attaching legacy section patch to layout '{}'", id);
            template.compat_directives = Some(LEGACY_SECTION_PATCH.to_string());
        }
        self
    }

    /// Looks up a template by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&LayoutTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Templates associated with a preset, in registration order.
    pub fn for_preset(&self, preset: ManuscriptPreset) -> impl Iterator<Item = &LayoutTemplate> {
        self.templates.iter().filter(move |t| t.preset == preset)
    }

    /// All templates.
    pub fn iter(&self) -> impl Iterator<Item = &LayoutTemplate> {
        self.templates.iter()
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if no template is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
