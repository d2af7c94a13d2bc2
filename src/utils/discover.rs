//! Feature file discovery

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Find files matching a glob pattern such as `./**/*.feature`.
///
/// Directories are skipped and unreadable entries are logged and ignored.
/// Results are sorted.
pub fn discover_features(pattern: &str) -> Result<Vec<String>> {
    let entries =
        glob::glob(pattern).with_context(|| format!("Invalid feature pattern: {pattern}"))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path.to_string_lossy().into_owned()),
            Ok(path) => debug!("Skipping non-file {}", path.display()),
            Err(e) => warn!("Unreadable path while matching {}: {}", pattern, e),
        }
    }

    files.sort();
    Ok(files)
}

/// Prefix a discovered file with the base directory
pub fn feature_path(base_dir: &str, file: &str) -> String {
    if base_dir.is_empty() {
        return file.to_string();
    }
    Path::new(base_dir).join(file).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_discover_features() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("features/nested.feature")).unwrap();
        std::fs::create_dir_all(dir.path().join("features/admin")).unwrap();
        std::fs::write(dir.path().join("features/login.feature"), "Feature: Login").unwrap();
        std::fs::write(dir.path().join("features/admin/users.feature"), "Feature: Users").unwrap();
        std::fs::write(dir.path().join("features/notes.txt"), "").unwrap();

        let pattern = format!("{}/**/*.feature", dir.path().display());
        let files = discover_features(&pattern).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("admin/users.feature"));
        assert!(files[1].ends_with("login.feature"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(discover_features("features/[*.feature").is_err());
    }

    #[test]
    fn test_feature_path() {
        assert_eq!(feature_path("", "a.feature"), "a.feature");
        assert_eq!(
            feature_path("./", "features/a.feature"),
            "./features/a.feature"
        );
        assert_eq!(feature_path("tests", "a.feature"), "tests/a.feature");
        assert_eq!(feature_path("tests", "/abs/a.feature"), "/abs/a.feature");
    }
}
