use fs_extra::dir::CopyOptions;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Remove a directory with all its subtree.
///
/// Returns `false` if the directory was already gone.
pub async fn remove_dir_if_exists(path: impl AsRef<Path>) -> io::Result<bool> {
    match tokio::fs::remove_dir_all(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Move a file or directory to `to`, which must not exist yet.
///
/// Tries a plain rename first and falls back to copy-then-delete when the
/// two paths live on different filesystems.
pub async fn move_path(from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
    let from = from.as_ref().to_path_buf();
    let to = to.as_ref().to_path_buf();

    match tokio::fs::rename(&from, &to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "rename {} -> {} crosses filesystems, copying instead",
                from.display(),
                to.display()
            );
            tokio::task::spawn_blocking(move || move_across_devices(&from, &to))
                .await
                .map_err(io::Error::other)?
        }
        Err(e) => Err(e),
    }
}

fn move_across_devices(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_dir() {
        std::fs::create_dir_all(to)?;
        let mut options = CopyOptions::new();
        options.content_only = true;
        fs_extra::dir::move_dir(from, to, &options).map_err(io::Error::other)?;
    } else {
        fs_extra::file::move_file(from, to, &fs_extra::file::CopyOptions::new())
            .map_err(io::Error::other)?;
    }
    Ok(())
}

/// Copy a single file, keeping its permission bits.
pub async fn copy_file(from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<u64> {
    tokio::fs::copy(from.as_ref(), to.as_ref()).await
}

/// Sorted file names of the entries directly inside `dir`.
pub async fn list_entries(dir: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir.as_ref()).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.push(PathBuf::from(entry.file_name()));
    }
    entries.sort();
    Ok(entries)
}
