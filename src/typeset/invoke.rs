use crate::error::{Error, Result};
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

/// Arguments for one converter run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Converter program
    pub program: PathBuf,
    /// Markdown input file
    pub input: PathBuf,
    /// Rendered output file
    pub output: PathBuf,
    /// Output format, e.g. `pdf`
    pub format: String,
    /// Engine name or absolute path
    pub engine: String,
    /// Layout template file
    pub template: Option<PathBuf>,
    /// Directories added to the subprocess search path
    pub search_dirs: Vec<PathBuf>,
}

impl CompileRequest {
    /// Command-line arguments, program excluded.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-f".into(),
            "markdown".into(),
            "-t".into(),
            self.format.clone().into(),
            "-o".into(),
            self.output.clone().into(),
            self.input.clone().into(),
            "--pdf-engine".into(),
            self.engine.clone().into(),
        ];
        if let Some(template) = &self.template {
            args.push("--template".into());
            args.push(template.clone().into());
        }
        args
    }
}

/// Runs the document converter.
pub trait CompilerRunner {
    /// Runs one conversion to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CompilerInvocation`] if the program cannot be spawned or exits
    /// unsuccessfully.
    fn run(&self, request: &CompileRequest) -> Result<()>;
}

/// Runs the converter as a child process and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CompilerRunner for SystemRunner {
    fn run(&self, request: &CompileRequest) -> Result<()> {
        let program = request.program.display().to_string();
        let mut command = Command::new(&request.program);
        command.args(request.args());

        if let Some(path) = augmented_search_path(&request.search_dirs) {
            command.env("PATH", path);
        }

        debug!("Running {} {:?}", program, request.args());

        let output = command
            .output()
            .map_err(|e| Error::compiler(&program, format!("failed to start: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            warn!("{} failed: {}", program, message);
            return Err(Error::compiler(program, message));
        }

        Ok(())
    }
}

/// The current `PATH` with `dirs` appended, skipping entries already present.
#[must_use]
pub fn augmented_search_path(dirs: &[PathBuf]) -> Option<OsString> {
    let mut entries: Vec<PathBuf> = env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect())
        .unwrap_or_default();

    for dir in dirs {
        if !entries.iter().any(|e| e == dir) {
            entries.push(dir.clone());
        }
    }

    env::join_paths(entries).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn on_search_path(path: &Path, dirs: &[PathBuf]) -> bool {
        augmented_search_path(dirs)
            .is_some_and(|joined| env::split_paths(&joined).any(|entry| entry == path))
    }

    fn request() -> CompileRequest {
        CompileRequest {
            program: PathBuf::from("pandoc"),
            input: PathBuf::from("/tmp/in.md"),
            output: PathBuf::from("/out/Book.pdf"),
            format: "pdf".to_string(),
            engine: "xelatex".to_string(),
            template: Some(PathBuf::from("/t/book.tex")),
            search_dirs: vec![PathBuf::from("/opt/texlive/bin")],
        }
    }

    #[test]
    fn test_argument_shape() {
        let args: Vec<String> = request()
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect();
        assert_eq!(
            args,
            vec![
                "-f",
                "markdown",
                "-t",
                "pdf",
                "-o",
                "/out/Book.pdf",
                "/tmp/in.md",
                "--pdf-engine",
                "xelatex",
                "--template",
                "/t/book.tex"
            ]
        );
    }

    #[test]
    fn test_template_optional() {
        let mut req = request();
        req.template = None;
        let args = req.args();
        assert_eq!(args.len(), 9);
        assert!(!args.iter().any(|a| a == "--template"));
    }

    #[test]
    fn test_search_path_augmented() {
        let extra = PathBuf::from("/opt/manuscript-forge-test/bin");
        assert!(on_search_path(&extra, &[extra.clone()]));
        assert!(!on_search_path(&extra, &[]));
    }

    #[test]
    fn test_missing_program_is_compiler_error() {
        let mut req = request();
        req.program = PathBuf::from("/nonexistent/manuscript-forge/pandoc");
        let err = SystemRunner.run(&req).unwrap_err();
        assert!(matches!(err, Error::CompilerInvocation { .. }));
    }
}
