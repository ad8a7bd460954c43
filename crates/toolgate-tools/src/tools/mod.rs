//! Builtin tool implementations

pub mod command;
pub mod git_status;
pub mod list_files;
pub mod read_file;
pub mod write_file;

use crate::fault::{Fault, FaultKind};
use crate::validator::check_relative_path;
use std::path::{Path, PathBuf};
use toolgate_core::Parameters;

/// Read a string parameter; validation guarantees presence for required ones.
pub(crate) fn str_param<'a>(params: &'a Parameters, name: &str) -> Result<&'a str, Fault> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| Fault::new(FaultKind::Key, format!("Missing required parameter: {}", name)))
}

/// Join a project-relative path onto the root after re-running the lexical
/// path check.
pub(crate) fn resolve(root: &Path, path: &str) -> Result<PathBuf, Fault> {
    check_relative_path(path).map_err(|e| Fault::new(FaultKind::PermissionDenied, e.to_string()))?;
    Ok(root.join(path))
}

/// Cut `s` to at most `max` characters, on a char boundary.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!(
            "{}\n... [truncated, {} total chars]",
            &s[..idx],
            s.chars().count()
        ),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "ééééé";
        let out = truncate_chars(s, 2);
        assert!(out.starts_with("éé\n"));
        assert!(out.contains("5 total chars"));
    }

    #[test]
    fn short_strings_untouched() {
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 3), "abc");
    }

    #[test]
    fn resolve_rejects_escape() {
        let root = Path::new("/project");
        assert_eq!(resolve(root, "a/b.txt").unwrap(), root.join("a/b.txt"));
        let err = resolve(root, "../x").unwrap_err();
        assert_eq!(err.kind, FaultKind::PermissionDenied);
        assert!(resolve(root, "/etc").is_err());
    }
}
