//! Typesetting through an external document converter.
//!
//! The flow for one render is: validate the layout template, pick a TeX engine that can
//! handle the template's fonts, prepend the raw LaTeX the converter needs, write the
//! result to a temporary file and run the converter on it. The temporary file is removed
//! when the render returns, whether it succeeded or not.

pub mod compiler;
pub mod invoke;
pub mod layout;
pub mod prepare;

use crate::{
    error::{Error, Result},
    pipeline::CancellationToken,
};
use compiler::{CompilerLocator, CompilerSelection};
use invoke::{CompileRequest, CompilerRunner};
use layout::LayoutTemplate;
use prepare::prepare_content;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output format requested from the converter.
pub const OUTPUT_FORMAT: &str = "pdf";

const TEMP_PREFIX: &str = "manuscript-forge-";
const TEMP_SUFFIX: &str = ".md";

/// A layout template that passed validation, with its file contents.
#[derive(Debug, Clone)]
pub struct ResolvedLayout {
    /// Registry entry
    pub template: LayoutTemplate,
    /// On-disk template file
    pub path: PathBuf,
    /// Template source, used to detect font requirements
    pub source: String,
}

impl ResolvedLayout {
    /// Validates `template` and reads its source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TemplateInvalid`] if the file is missing or unreadable.
    pub fn resolve(template: &LayoutTemplate, vault: &dyn crate::vault::Vault) -> Result<Self> {
        let path = template.validate(vault).into_result(&template.id)?;
        let source = fs::read_to_string(&path)
            .map_err(|e| Error::template_invalid(&template.id, e.to_string()))?;

        Ok(Self {
            template: template.clone(),
            path,
            source,
        })
    }
}

/// Renders assembled manuscripts to typeset documents.
pub struct Typesetter<'a> {
    runner: &'a dyn CompilerRunner,
    program: PathBuf,
    locator: CompilerLocator,
}

impl<'a> Typesetter<'a> {
    /// Creates a typesetter running `program` through `runner`.
    #[must_use]
    pub fn new(runner: &'a dyn CompilerRunner, program: PathBuf, locator: CompilerLocator) -> Self {
        Self {
            runner,
            program,
            locator,
        }
    }

    /// Chooses the engine for a layout.
    #[must_use]
    pub fn select(&self, layout: &ResolvedLayout) -> CompilerSelection {
        self.locator.select(Some(&layout.source))
    }

    /// Renders `content` with `layout` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if cancelled before launch, an IO error if the
    /// temporary input cannot be written, or the runner's [`Error::CompilerInvocation`].
    pub fn render(
        &self,
        content: &str,
        layout: &ResolvedLayout,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<CompilerSelection> {
        let selection = self.select(layout);
        let prepared = prepare_content(content, layout.template.compat_directives.as_deref());

        let mut input = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        input
            .write_all(prepared.as_bytes())
            .and_then(|()| input.flush())
            .map_err(|e| Error::io(input.path(), e))?;

        let request = CompileRequest {
            program: self.program.clone(),
            input: input.path().to_path_buf(),
            output: output.to_path_buf(),
            format: OUTPUT_FORMAT.to_string(),
            engine: selection.engine_arg(),
            template: Some(layout.path.clone()),
            search_dirs: self.locator.search_dirs().to_vec(),
        };

        cancel.check()?;
        debug!("Compiling {} via {}", input.path().display(), self.program.display());
        self.runner.run(&request)?;

        info!("Rendered {}", output.display());
        Ok(selection)
    }
}
