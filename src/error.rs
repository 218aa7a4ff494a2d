use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for manuscript and outline exports.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// No scenes remained after filtering and range restriction.
    #[error("No scenes matched the requested selection{}", describe_filter(.subplot))]
    SelectionEmpty {
        /// Subplot filter that was active, if any
        subplot: Option<String>,
    },

    /// The requested part count exceeds the number of selected scenes.
    #[error("Cannot split {available} scene(s) into {requested} parts")]
    SplitInfeasible {
        /// Requested number of parts
        requested: usize,
        /// Scenes available in the selection
        available: usize,
    },

    /// Layout template is missing or unreadable.
    #[error("Layout template '{template}' is not usable: {reason}")]
    TemplateInvalid {
        /// Template id or path
        template: String,
        /// Why validation failed
        reason: String,
    },

    /// A single scene could not be read. Recovered locally during assembly.
    #[error("Could not read scene '{path}': {message}")]
    SceneRead {
        /// Vault path of the scene note
        path: String,
        /// Error message
        message: String,
    },

    /// The document compiler could not be spawned or exited unsuccessfully.
    #[error("Document compiler '{program}' failed: {message}")]
    CompilerInvocation {
        /// Program that was invoked
        program: String,
        /// Captured error output or spawn failure
        message: String,
    },

    /// The scene data provider itself failed.
    #[error("Failed to load scenes: {message}")]
    SelectionLoad {
        /// Error message from the provider
        message: String,
    },

    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },

    /// The export was cancelled by the caller.
    #[error("Export cancelled")]
    Cancelled,
}

fn describe_filter(subplot: &Option<String>) -> String {
    subplot
        .as_ref()
        .map(|s| format!(" (subplot '{s}')"))
        .unwrap_or_default()
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        // tera keeps the useful part of the message in the source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(&source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = std::error::Error::source(inner);
        }
        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates a layout template validation error.
    #[must_use]
    pub fn template_invalid(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TemplateInvalid {
            template: template.into(),
            reason: reason.into(),
        }
    }

    /// Creates a scene read error.
    #[must_use]
    pub fn scene_read(path: impl Into<String>, source: &std::io::Error) -> Self {
        Self::SceneRead {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a compiler invocation error.
    #[must_use]
    pub fn compiler(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CompilerInvocation {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Creates a provider failure.
    #[must_use]
    pub fn selection_load(message: impl Into<String>) -> Self {
        Self::SelectionLoad {
            message: message.into(),
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true for job-level precondition failures that block any write.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::SelectionEmpty { .. } | Self::SplitInfeasible { .. } | Self::TemplateInvalid { .. }
        )
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::template("unknown", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}
