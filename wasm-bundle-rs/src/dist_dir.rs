use std::io;
use std::path::Path;

use crate::error::{PackageError, PackageResult};

/// Remove `path` with everything in it, then create it again (with parents).
///
/// A directory that does not exist yet is not an error, so calling this any
/// number of times leaves the same empty directory behind.
pub async fn reset_dist_dir(path: &Path) -> PackageResult<()> {
    let to_package_error = |source: io::Error| PackageError::DistDir {
        path: path.to_path_buf(),
        source,
    };

    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(to_package_error(err)),
    }
    tokio::fs::create_dir_all(path)
        .await
        .map_err(to_package_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn entries(path: &Path) -> usize {
        fs::read_dir(path).unwrap().count()
    }

    #[tokio::test]
    async fn test_reset_creates_missing_parents() {
        let root = tempfile::tempdir().unwrap();
        let dist = root.path().join("dist").join("wasm");
        reset_dist_dir(&dist).await.unwrap();
        assert!(dist.is_dir());
        assert_eq!(entries(&dist), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_previous_output() {
        let root = tempfile::tempdir().unwrap();
        let dist = root.path().join("dist");
        fs::create_dir_all(dist.join("nested")).unwrap();
        fs::write(dist.join("index.js"), "stale").unwrap();
        fs::write(dist.join("nested").join("chunk.js"), "stale").unwrap();

        reset_dist_dir(&dist).await.unwrap();
        assert!(dist.is_dir());
        assert_eq!(entries(&dist), 0);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let dist = root.path().join("dist");
        reset_dist_dir(&dist).await.unwrap();
        reset_dist_dir(&dist).await.unwrap();
        assert!(dist.is_dir());
        assert_eq!(entries(&dist), 0);
    }

    #[tokio::test]
    async fn test_reset_fails_when_parent_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let err = reset_dist_dir(&blocker.join("dist")).await.unwrap_err();
        assert!(matches!(err, PackageError::DistDir { .. }), "{err:?}");
    }
}
