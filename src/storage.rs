//! Destination paths for bodies that are streamed to disk.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::Error;

/// Allocates the file a response body is written to.
///
/// With a `filename`, the path is `dir/filename` and an existing file is
/// overwritten. Without one, a fresh uniquely named file is created in `dir`
/// and kept after the call.
///
/// # Errors
///
/// Returns [`Error::Usage`] when `dir` is missing or `filename` escapes the
/// directory, and [`Error::Io`] when the directory or file cannot be
/// created.
pub fn allocate_body_path(
    dir: Option<&Path>,
    filename: Option<&str>,
    create_dir: bool,
) -> Result<PathBuf, Error> {
    let Some(dir) = dir else {
        return Err(Error::usage(
            "body_storage_dir is required when body_inmemory is false",
        ));
    };

    if create_dir {
        std::fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    }

    let path = match filename {
        Some(name) => {
            if name.is_empty() || !is_safe_filename_segment(name) {
                return Err(Error::usage(format!("unsafe body_storage_filename: {name}")));
            }
            dir.join(name)
        }
        None => {
            let file = tempfile::Builder::new()
                .prefix("snare-")
                .suffix(".body")
                .tempfile_in(dir)
                .map_err(|e| Error::io(dir, e))?;
            let (_, path) = file.keep().map_err(|e| Error::io(dir, e.error))?;
            path
        }
    };
    debug!(path = %path.display(), "allocated body storage path");
    Ok(path)
}

fn is_safe_filename_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_named_file_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = allocate_body_path(Some(dir.path()), Some("page.html"), false).unwrap();
        assert_eq!(path, dir.path().join("page.html"));
    }

    #[test]
    fn test_unique_file_when_no_name() {
        let dir = tempfile::tempdir().unwrap();
        let first = allocate_body_path(Some(dir.path()), None, false).unwrap();
        let second = allocate_body_path(Some(dir.path()), None, false).unwrap();
        assert_ne!(first, second);
        assert!(first.exists());
        assert!(first.starts_with(dir.path()));
    }

    #[test]
    fn test_create_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let path = allocate_body_path(Some(&nested), Some("x"), true).unwrap();
        assert!(nested.is_dir());
        assert_eq!(path, nested.join("x"));
    }

    #[test]
    fn test_missing_dir_and_traversal_are_usage_errors() {
        assert!(matches!(
            allocate_body_path(None, None, false),
            Err(Error::Usage { .. })
        ));
        let dir = tempfile::tempdir().unwrap();
        for name in ["../escape", "/etc/passwd", "a/b", ".."] {
            assert!(
                matches!(
                    allocate_body_path(Some(dir.path()), Some(name), false),
                    Err(Error::Usage { .. })
                ),
                "expected {name} to be rejected"
            );
        }
    }
}
