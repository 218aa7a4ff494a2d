use crate::error::{Error, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Writes export artifacts into the output folder with atomic operations.
#[derive(Debug, Clone)]
pub(crate) struct Writer {
    output_dir: PathBuf,
}

impl Writer {
    /// Creates a writer for `output_dir`.
    pub(crate) fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// The output folder.
    pub(crate) fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Full path an artifact with this file name will be written to.
    pub(crate) fn path_for(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Creates the output folder if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created.
    pub(crate) fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| Error::io(&self.output_dir, e))?;
        debug!("Output folder ready: {}", self.output_dir.display());
        Ok(())
    }

    /// Writes one artifact and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be created or the write fails.
    pub(crate) fn write(&self, filename: &str, content: &str) -> Result<PathBuf> {
        self.prepare()?;
        let path = self.path_for(filename);
        Self::write_file_atomic(&path, content)?;
        info!("Wrote {} ({} bytes)", path.display(), content.len());
        Ok(path)
    }

    /// Writes a file atomically.
    ///
    /// # Process
    ///
    /// 1. Writes content to a hidden temporary file next to the target
    /// 2. Syncs the temporary file to disk
    /// 3. Renames the temporary file onto the target path
    fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::config(format!("Invalid output path: {}", path.display())))?
            .to_string_lossy();
        let temp_path = path.with_file_name(format!(".{file_name}.tmp"));

        let mut temp_file = fs::File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;

        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| Error::io(&temp_path, e))?;

        temp_file
            .sync_all()
            .map_err(|e| Error::io(&temp_path, e))?;

        drop(temp_file);

        fs::rename(&temp_path, path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            Error::io(path, e)
        })?;

        Ok(())
    }
}
