use crate::error::OpsError;
use crate::services::storage::{ObjectSummary, StorageService};
use std::path::Path;
use tracing::info;

/// Upload `path` under `key`, then list the whole bucket.
///
/// The file is checked before any storage call so a bad path never reaches
/// the network. A failed upload skips the listing.
pub async fn upload_and_list(
    storage: &dyn StorageService,
    path: &Path,
    key: &str,
) -> Result<Vec<ObjectSummary>, OpsError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(OpsError::FileNotFound(path.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(OpsError::FileNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(OpsError::Unreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    }

    info!("⬆️  Uploading {} as '{}'...", path.display(), key);
    let receipt = storage
        .upload_file(path, key)
        .await
        .map_err(|source| OpsError::Storage {
            step: "upload",
            source,
        })?;
    info!(
        "✅ Uploaded '{}' ({} bytes, sha256 {})",
        receipt.key, receipt.size, receipt.sha256
    );

    info!("📋 Listing objects...");
    let objects = storage
        .list_objects()
        .await
        .map_err(|source| OpsError::Storage {
            step: "list",
            source,
        })?;
    info!("Found {} objects", objects.len());

    Ok(objects)
}

/// Render a listing the way the CLI prints it.
pub fn render_listing(objects: &[ObjectSummary], json: bool) -> serde_json::Result<String> {
    if json {
        return serde_json::to_string_pretty(objects);
    }
    Ok(objects
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n"))
}
