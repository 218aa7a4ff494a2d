use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Document converter invoked when no compiler path is configured.
pub const DEFAULT_PROGRAM: &str = "pandoc";

static FONT_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\\usepackage\s*(?:\[[^\]]*\])?\s*\{fontspec\}|\\(?:setmainfont|setsansfont|setmonofont|newfontfamily|defaultfontfeatures)\b",
    )
    .expect("valid font directive regex")
});

/// LaTeX engines the converter can hand the document to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Baseline engine, no system font support
    PdfLatex,
    /// Unicode-capable engine
    XeLatex,
    /// Unicode-capable engine
    LuaLatex,
}

impl Engine {
    /// Executable name without extension.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::PdfLatex => "pdflatex",
            Self::XeLatex => "xelatex",
            Self::LuaLatex => "lualatex",
        }
    }

    /// Returns true for engines that can embed system fonts.
    #[must_use]
    pub const fn is_unicode(self) -> bool {
        matches!(self, Self::XeLatex | Self::LuaLatex)
    }

    /// Executable file name on this platform.
    #[must_use]
    pub fn binary_name(self) -> String {
        executable_name(self.id())
    }

    /// Engines in the order they should be tried.
    #[must_use]
    pub const fn preference(requires_unicode: bool) -> [Self; 3] {
        if requires_unicode {
            [Self::XeLatex, Self::LuaLatex, Self::PdfLatex]
        } else {
            [Self::PdfLatex, Self::XeLatex, Self::LuaLatex]
        }
    }
}

fn executable_name(stem: &str) -> String {
    if cfg!(windows) {
        format!("{stem}.exe")
    } else {
        stem.to_string()
    }
}

/// Returns true if the template declares custom fonts, which need a Unicode engine.
#[must_use]
pub fn uses_custom_fonts(template: &str) -> bool {
    FONT_DIRECTIVE.is_match(template)
}

/// Install locations probed for TeX engines and the converter on this platform.
#[must_use]
pub fn platform_search_dirs() -> Vec<PathBuf> {
    let dirs: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Library/TeX/texbin",
            "/usr/local/bin",
            "/opt/homebrew/bin",
            "/usr/texbin",
        ]
    } else if cfg!(windows) {
        &[
            r"C:\Program Files\MiKTeX\miktex\bin\x64",
            r"C:\texlive\bin\windows",
            r"C:\Program Files\Pandoc",
        ]
    } else {
        &[
            "/usr/bin",
            "/usr/local/bin",
            "/usr/local/texlive/bin/x86_64-linux",
            "/opt/texlive/bin/x86_64-linux",
        ]
    };
    dirs.iter().map(PathBuf::from).collect()
}

/// The engine chosen for one render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompilerSelection {
    /// Engine to pass to the converter
    pub engine: Engine,

    /// Absolute path of the engine, or `None` to rely on the search path
    pub path: Option<PathBuf>,

    /// Every engine found on disk
    pub available: Vec<Engine>,

    /// True if the template needs a Unicode engine
    pub requires_unicode: bool,
}

impl CompilerSelection {
    /// Value for the converter's engine argument.
    #[must_use]
    pub fn engine_arg(&self) -> String {
        self.path
            .as_ref()
            .map_or_else(|| self.engine.id().to_string(), |p| p.display().to_string())
    }
}

/// Finds TeX engines in a fixed list of directories.
#[derive(Debug, Clone)]
pub struct CompilerLocator {
    search_dirs: Vec<PathBuf>,
}

impl Default for CompilerLocator {
    fn default() -> Self {
        Self::new(platform_search_dirs())
    }
}

impl CompilerLocator {
    /// Creates a locator over the given directories.
    #[must_use]
    pub fn new(search_dirs: Vec<PathBuf>) -> Self {
        Self { search_dirs }
    }

    /// Directories probed, in order.
    #[must_use]
    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Returns the first install of `engine` in the search directories.
    #[must_use]
    pub fn find(&self, engine: Engine) -> Option<PathBuf> {
        let name = engine.binary_name();
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&name))
            .find(|candidate| candidate.is_file())
    }

    /// Picks an engine for a template.
    ///
    /// Falls back to the bare name of the most preferred engine when none is installed in
    /// the known locations.
    #[must_use]
    pub fn select(&self, template: Option<&str>) -> CompilerSelection {
        let requires_unicode = template.is_some_and(uses_custom_fonts);
        let order = Engine::preference(requires_unicode);

        let found: Vec<(Engine, PathBuf)> = order
            .iter()
            .filter_map(|&engine| self.find(engine).map(|path| (engine, path)))
            .collect();

        let selection = match found.first() {
            Some((engine, path)) => CompilerSelection {
                engine: *engine,
                path: Some(path.clone()),
                available: found.iter().map(|(e, _)| *e).collect(),
                requires_unicode,
            },
            None => CompilerSelection {
                engine: order[0],
                path: None,
                available: Vec::new(),
                requires_unicode,
            },
        };

        debug!(
            "Compiler preference {:?} (custom fonts: {}), found {:?}",
            order, requires_unicode, selection.available
        );
        info!("Using {} engine", selection.engine_arg());

        selection
    }
}

/// Resolves the converter program from the configured path.
#[must_use]
pub fn resolve_program(configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(path) if !path.as_os_str().is_empty() => recover_leading_separator(path),
        _ => PathBuf::from(executable_name(DEFAULT_PROGRAM)),
    }
}

/// Restores a leading `/` lost when the path was stored, if the corrected path exists.
///
/// Only applies to slash-rooted platforms; paths that already exist are left as they are.
#[must_use]
pub fn recover_leading_separator(path: &Path) -> PathBuf {
    if cfg!(windows) || path.is_absolute() || path.exists() {
        return path.to_path_buf();
    }

    // a bare program name is meant to be found on the search path
    if path.components().count() < 2 {
        return path.to_path_buf();
    }

    let candidate = Path::new("/").join(path);
    if candidate.is_file() {
        debug!(
            "Recovered compiler path {} -> {}",
            path.display(),
            candidate.display()
        );
        candidate
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    fn install(dir: &assert_fs::TempDir, engine: Engine) {
        dir.child(engine.binary_name()).write_str("#!/bin/sh\n").unwrap();
    }

    #[test]
    fn test_font_directives() {
        assert!(uses_custom_fonts("\\usepackage{fontspec}"));
        assert!(uses_custom_fonts("\\usepackage[no-math]{fontspec}"));
        assert!(uses_custom_fonts("\\setmainfont{EB Garamond}"));
        assert!(uses_custom_fonts("\\newfontfamily\\headingfont{Futura}"));
        assert!(!uses_custom_fonts("\\usepackage{geometry}"));
    }

    #[test]
    fn test_unicode_engine_preferred_for_fonts() {
        let dir = assert_fs::TempDir::new().unwrap();
        install(&dir, Engine::PdfLatex);
        install(&dir, Engine::XeLatex);

        let locator = CompilerLocator::new(vec![dir.path().to_path_buf()]);
        let selection = locator.select(Some("\\setmainfont{Garamond}"));

        assert_eq!(selection.engine, Engine::XeLatex);
        assert!(selection.requires_unicode);
        assert_eq!(selection.available, vec![Engine::XeLatex, Engine::PdfLatex]);
        assert_eq!(
            selection.path.as_deref(),
            Some(dir.path().join(Engine::XeLatex.binary_name()).as_path())
        );
    }

    #[test]
    fn test_baseline_engine_without_fonts() {
        let dir = assert_fs::TempDir::new().unwrap();
        install(&dir, Engine::PdfLatex);
        install(&dir, Engine::LuaLatex);

        let locator = CompilerLocator::new(vec![dir.path().to_path_buf()]);
        let selection = locator.select(Some("\\documentclass{book}"));
        assert_eq!(selection.engine, Engine::PdfLatex);
        assert!(!selection.requires_unicode);
    }

    #[test]
    fn test_falls_back_to_bare_name() {
        let dir = assert_fs::TempDir::new().unwrap();
        let locator = CompilerLocator::new(vec![dir.path().to_path_buf()]);

        let selection = locator.select(Some("\\usepackage{fontspec}"));
        assert_eq!(selection.engine, Engine::XeLatex);
        assert!(selection.path.is_none());
        assert_eq!(selection.engine_arg(), "xelatex");
    }

    #[test]
    fn test_search_dirs_probed_in_order() {
        let first = assert_fs::TempDir::new().unwrap();
        let second = assert_fs::TempDir::new().unwrap();
        install(&first, Engine::PdfLatex);
        install(&second, Engine::PdfLatex);

        let locator =
            CompilerLocator::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert!(locator.find(Engine::PdfLatex).unwrap().starts_with(first.path()));
    }

    #[test]
    fn test_default_program() {
        assert_eq!(resolve_program(None), PathBuf::from(executable_name("pandoc")));
        assert_eq!(
            resolve_program(Some(Path::new(""))),
            PathBuf::from(executable_name("pandoc"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_recovers_missing_leading_separator() {
        let dir = assert_fs::TempDir::new().unwrap();
        let binary = dir.child("pandoc");
        binary.write_str("#!/bin/sh\n").unwrap();

        let mangled = binary.path().strip_prefix("/").unwrap();
        assert_eq!(resolve_program(Some(mangled)), binary.path());

        let unknown = Path::new("no/such/dir/pandoc");
        assert_eq!(recover_leading_separator(unknown), unknown);
        assert_eq!(recover_leading_separator(Path::new("pandoc")), Path::new("pandoc"));
    }

    #[test]
    fn test_platform_dirs_not_empty() {
        assert!(!platform_search_dirs().is_empty());
    }
}
