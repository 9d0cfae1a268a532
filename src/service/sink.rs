//! Downstream receivers of generated patches.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::ServiceError;
use crate::models::Patch;

/// Receives the ordered patches of each completed run. Applying them is
/// up to the receiver.
#[async_trait]
pub trait PatchSink: Send + Sync {
    async fn accept(&self, run_id: &str, patches: &[Patch]) -> Result<(), ServiceError>;
}

/// Writes `<root>/<run-id>/<finding-id>.patch` files.
#[derive(Debug, Clone)]
pub struct DirectoryPatchSink {
    root: PathBuf,
}

impl DirectoryPatchSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PatchSink for DirectoryPatchSink {
    async fn accept(&self, run_id: &str, patches: &[Patch]) -> Result<(), ServiceError> {
        if patches.is_empty() {
            return Ok(());
        }
        let dir = self.root.join(sanitize(run_id));
        let sink_err = |path: &Path, e: std::io::Error| ServiceError::Sink {
            path: path.display().to_string(),
            source: e,
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| sink_err(&dir, e))?;

        for patch in patches {
            let path = dir.join(format!("{}.patch", sanitize(&patch.finding_id)));
            tokio::fs::write(&path, &patch.diff)
                .await
                .map_err(|e| sink_err(&path, e))?;
        }
        tracing::info!(run_id, count = patches.len(), dir = %dir.display(), "wrote patches");
        Ok(())
    }
}

/// Keep file names to a safe character set.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatchKind;

    fn patch(id: &str) -> Patch {
        Patch {
            finding_id: id.into(),
            kind: PatchKind::WeakHash,
            file: "a.py".into(),
            line: 1,
            diff: format!("--- a/a.py\n+++ b/a.py\n# {id}\n"),
            applicable: true,
        }
    }

    #[tokio::test]
    async fn writes_one_file_per_patch() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryPatchSink::new(dir.path());
        sink.accept("run-1", &[patch("sec-1"), patch("sec-2")]).await.unwrap();

        let first = std::fs::read_to_string(dir.path().join("run-1").join("sec-1.patch")).unwrap();
        assert!(first.contains("# sec-1"));
        assert!(dir.path().join("run-1").join("sec-2.patch").exists());
    }

    #[tokio::test]
    async fn no_patches_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectoryPatchSink::new(dir.path());
        sink.accept("run-1", &[]).await.unwrap();
        assert!(!dir.path().join("run-1").exists());
    }

    #[test]
    fn sanitize_strips_path_separators() {
        assert_eq!(sanitize("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitize("sec-1"), "sec-1");
    }
}
