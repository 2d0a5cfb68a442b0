//! External tool lookup
//!
//! Each tool is resolved in this order:
//!
//! 1. An explicit path set in [`ToolPaths`]
//! 2. The first match on `PATH`
//! 3. The per-user tool directory ([`default_tool_dir`])
//! 4. The bare program name (spawning will report it missing)

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// MIT LM estimator
pub const ESTIMATE_NGRAM: &str = "estimate-ngram";

/// Phonetisaurus g2p predictor
pub const PHONETISAURUS_APPLY: &str = "phonetisaurus-apply";

/// Locations of the external tools used during training.
#[derive(Debug, Clone, Default)]
pub struct ToolPaths {
    /// Explicit `estimate-ngram` path
    pub estimate_ngram: Option<PathBuf>,
    /// Explicit `phonetisaurus-apply` path
    pub phonetisaurus_apply: Option<PathBuf>,
    /// Extra directory searched after `PATH`, instead of [`default_tool_dir`]
    pub tool_dir: Option<PathBuf>,
}

impl ToolPaths {
    pub fn estimate_ngram(&self) -> PathBuf {
        self.resolve(ESTIMATE_NGRAM, self.estimate_ngram.as_deref())
    }

    pub fn phonetisaurus_apply(&self) -> PathBuf {
        self.resolve(PHONETISAURUS_APPLY, self.phonetisaurus_apply.as_deref())
    }

    fn resolve(&self, name: &str, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        if let Some(found) = env::var_os("PATH").and_then(|p| find_in_path(name, &p)) {
            return found;
        }

        let tool_dir = self.tool_dir.clone().unwrap_or_else(default_tool_dir);
        let candidate = tool_dir.join(name);
        if candidate.is_file() {
            return candidate;
        }

        PathBuf::from(name)
    }
}

/// Get the default tool directory in the user's data directory
pub fn default_tool_dir() -> PathBuf {
    let data_dir = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("memo-asr-train").join("bin")
}

fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_override_wins() {
        let tools = ToolPaths {
            estimate_ngram: Some(PathBuf::from("/opt/mitlm/estimate-ngram")),
            ..Default::default()
        };
        assert_eq!(
            tools.estimate_ngram(),
            PathBuf::from("/opt/mitlm/estimate-ngram")
        );
    }

    #[test]
    fn test_tool_dir_used_when_not_on_path() {
        let temp_dir = TempDir::new().unwrap();
        let name = "memo-asr-train-test-tool";
        fs::write(temp_dir.path().join(name), "").unwrap();

        let tools = ToolPaths {
            tool_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };

        assert_eq!(tools.resolve(name, None), temp_dir.path().join(name));
    }

    #[test]
    fn test_falls_back_to_bare_name() {
        let temp_dir = TempDir::new().unwrap();
        let tools = ToolPaths {
            tool_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        };
        let name = "memo-asr-train-no-such-tool";
        assert_eq!(tools.resolve(name, None), PathBuf::from(name));
    }

    #[test]
    fn test_find_in_path() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        fs::write(second.path().join("tool"), "").unwrap();

        let path_var = env::join_paths([first.path(), second.path()]).unwrap();
        assert_eq!(
            find_in_path("tool", &path_var),
            Some(second.path().join("tool"))
        );
        assert_eq!(find_in_path("missing", &path_var), None);
    }

    #[test]
    fn test_default_tool_dir() {
        let dir = default_tool_dir();
        assert!(dir.ends_with("memo-asr-train/bin"));
    }
}
