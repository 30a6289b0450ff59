//! Artifact persistence
//!
//! Every rendered template is kept under `test-artifacts/` so a failing run
//! can be replayed with Terraform by hand.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::ARTIFACT_DIR;

/// Artifact failures; any of them stops the run
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Invalid artifact name '{0}'")]
    InvalidName(String),

    #[error("Refusing to write empty artifact {}", .0.display())]
    Empty(PathBuf),

    #[error("Error creating directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error creating file {}: {source}", path.display())]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error writing to file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes rendered templates into the artifact directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    enabled: bool,
}

impl Default for ArtifactWriter {
    fn default() -> Self {
        Self::new(ARTIFACT_DIR, true)
    }
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
        }
    }

    /// A writer that never touches the file system
    pub fn disabled() -> Self {
        Self::new(ARTIFACT_DIR, false)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Path the artifact `name` is written to
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Persist `content` as `<dir>/<name>`, replacing any previous artifact
    ///
    /// Returns the written path, or `None` when writing is disabled.
    pub fn write(&self, name: &str, content: &[u8]) -> Result<Option<PathBuf>, ArtifactError> {
        debug!(%name, bytes = content.len(), enabled = self.enabled, "ArtifactWriter::write: called");
        if !self.enabled {
            return Ok(None);
        }

        validate_name(name)?;
        let path = self.artifact_path(name);
        if content.is_empty() {
            return Err(ArtifactError::Empty(path));
        }

        // create_dir_all tolerates a directory created concurrently by another test
        fs::create_dir_all(&self.dir).map_err(|source| ArtifactError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let file = fs::File::create(&path).map_err(|source| ArtifactError::CreateFile {
            path: path.clone(),
            source,
        })?;

        let mut writer = BufWriter::new(file);
        writer
            .write_all(content)
            .and_then(|_| writer.flush())
            .map_err(|source| ArtifactError::Write {
                path: path.clone(),
                source,
            })?;

        info!("Wrote artifact: {}", path.display());
        Ok(Some(path))
    }
}

fn validate_name(name: &str) -> Result<(), ArtifactError> {
    let invalid = name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']);
    if invalid {
        return Err(ArtifactError::InvalidName(name.to_string()));
    }
    Ok(())
}
