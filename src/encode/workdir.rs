use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::CastResult;

/// Per-job scratch directory. Removed with everything in it when dropped.
#[derive(Debug)]
pub struct JobWorkDir {
    path: PathBuf,
}

impl JobWorkDir {
    /// Create `<root>/scenecast-<job_id>`.
    pub fn create(root: &Path, job_id: &str) -> CastResult<Self> {
        let path = root.join(format!("scenecast-{job_id}"));
        std::fs::create_dir_all(&path)
            .with_context(|| format!("create job work directory '{}'", path.display()))?;
        Ok(Self { path })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of `name` inside the directory.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now, reporting failure.
    pub fn remove(mut self) -> CastResult<()> {
        let path = std::mem::take(&mut self.path);
        if path.exists() {
            std::fs::remove_dir_all(&path)
                .with_context(|| format!("remove job work directory '{}'", path.display()))?;
        }
        Ok(())
    }
}

impl Drop for JobWorkDir {
    fn drop(&mut self) {
        if !self.path.as_os_str().is_empty()
            && self.path.exists()
            && let Err(e) = std::fs::remove_dir_all(&self.path)
        {
            tracing::warn!(dir = %self.path.display(), error = %e, "failed to remove work directory");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/workdir.rs"]
mod tests;
