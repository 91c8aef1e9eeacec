//! Per-(connection, project) working directory resolution.
//!
//! A project-scoped request runs with its cwd under `session_root/<projectId>`
//! so the backend's own session state (e.g. a coding assistant's git-style
//! working tree) persists across requests on the same connection. The
//! resolved path is re-verified against the session root even though the
//! wire codec already rejected characters that would build a traversal —
//! belt and suspenders against anything that slipped through.

use std::path::{Path, PathBuf};

use crate::error::RunnerError;

pub fn resolve_working_dir(
    session_root: &Path,
    project_id: Option<&str>,
) -> Result<Option<PathBuf>, RunnerError> {
    let Some(project_id) = project_id else {
        return Ok(None);
    };

    let dir = session_root.join(project_id);
    std::fs::create_dir_all(&dir)?;

    let canonical_root = session_root.canonicalize()?;
    let canonical_dir = dir.canonicalize()?;
    if !canonical_dir.starts_with(&canonical_root) {
        return Err(RunnerError::SessionPathEscapes);
    }

    Ok(Some(canonical_dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_under_session_root() {
        let tmp = tempfile::tempdir().unwrap();
        let resolved = resolve_working_dir(tmp.path(), Some("proj-1")).unwrap().unwrap();
        assert!(resolved.starts_with(tmp.path().canonicalize().unwrap()));
    }

    #[test]
    fn no_project_id_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(resolve_working_dir(tmp.path(), None).unwrap().is_none());
    }
}
