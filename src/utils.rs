use log::info;
use std::io;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "weatherprep_cache";

pub fn default_cache_dir() -> io::Result<PathBuf> {
    dirs::cache_dir()
        .map(|p| p.join(CACHE_DIR_NAME))
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "could not determine system cache directory",
            )
        })
}

pub async fn ensure_cache_dir_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => {
            if !metadata.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("cache path exists but is not a directory: {}", path.display()),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("Creating cache directory: {}", path.display());
            tokio::fs::create_dir_all(path).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ensure_cache_dir_creates_missing_directory() {
        let base = tempfile::tempdir().unwrap();
        let target = base.path().join("nested").join("cache");
        ensure_cache_dir_exists(&target).await.unwrap();
        assert!(target.is_dir());
        // Second call is a no-op on an existing directory.
        ensure_cache_dir_exists(&target).await.unwrap();
    }

    #[tokio::test]
    async fn ensure_cache_dir_rejects_files() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("occupied");
        tokio::fs::write(&file, b"x").await.unwrap();
        assert!(ensure_cache_dir_exists(&file).await.is_err());
    }
}
