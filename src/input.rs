//! Building an [`AnalysisContext`] from disk.
//!
//! Either a serialized context file, or a file/directory whose text
//! files become the snippets. Hidden entries and files that are not
//! valid UTF-8 are skipped.

use std::path::Path;

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::models::{AnalysisContext, CodeSnippet, InputMode};

/// Files above this size are not sent for analysis.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid context file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: String,
        source: walkdir::Error,
    },
}

/// Identity of a change analyzed from a plain path.
#[derive(Debug, Clone)]
pub struct ChangeIdentity {
    pub repo: String,
    pub change_id: String,
    pub author: String,
}

/// Resolve `mode` into a context. The result is not validated.
pub async fn load(mode: &InputMode, identity: &ChangeIdentity) -> Result<AnalysisContext, InputError> {
    match mode {
        InputMode::ContextFile(path) => load_context_file(path).await,
        InputMode::DirectPath(path) => scan_path(path, identity).await,
    }
}

pub async fn load_context_file(path: &Path) -> Result<AnalysisContext, InputError> {
    let display = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Read { path: display.clone(), source })?;
    serde_json::from_str(&content).map_err(|source| InputError::Parse { path: display, source })
}

/// Collect the text files under `path` as snippets, in path order.
pub async fn scan_path(path: &Path, identity: &ChangeIdentity) -> Result<AnalysisContext, InputError> {
    if !path.exists() {
        return Err(InputError::PathNotFound(path.display().to_string()));
    }

    let mut context = AnalysisContext::new(&identity.repo, &identity.change_id, &identity.author);

    if path.is_file() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        if let Some(snippet) = read_snippet(path, name).await? {
            context.snippets.push(snippet);
        }
        return Ok(context);
    }

    let walker = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(|source| InputError::Walk {
            path: path.display().to_string(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(path)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if let Some(snippet) = read_snippet(entry.path(), relative).await? {
            context.snippets.push(snippet);
        }
    }

    Ok(context)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|s| s.starts_with('.'))
}

async fn read_snippet(path: &Path, name: String) -> Result<Option<CodeSnippet>, InputError> {
    let read_err = |source| InputError::Read {
        path: path.display().to_string(),
        source,
    };
    let metadata = tokio::fs::metadata(path).await.map_err(read_err)?;
    if metadata.len() > MAX_FILE_BYTES {
        tracing::debug!(file = %path.display(), "skipping large file");
        return Ok(None);
    }
    let bytes = tokio::fs::read(path).await.map_err(read_err)?;
    // Binary or non-UTF-8 files are not analyzable.
    let Ok(content) = String::from_utf8(bytes) else {
        return Ok(None);
    };
    if content.is_empty() || content.contains('\0') {
        return Ok(None);
    }
    Ok(Some(CodeSnippet::new(name, content)))
}
