use anyhow::{Context, Result};
use std::path::Path;

/// Project id stored in a plain text file, one id on the first non-empty
/// line:
/// ```text
/// my-drought-project-123
/// ```
pub struct ProjectFile {
    project: String,
}

impl ProjectFile {
    /// Loads the project id from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read project file {}", path.display()))?;

        let project = content
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| anyhow::anyhow!("project file {} is empty", path.display()))?;

        Ok(Self {
            project: project.to_string(),
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn into_project(self) -> String {
        self.project
    }
}
