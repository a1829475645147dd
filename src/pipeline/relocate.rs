use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Move `source` into `folder`, keeping its base name.
///
/// Returns the new location, or `None` when the move was skipped because the
/// file already lives in `folder` or a file with that name is already there.
pub async fn relocate(source: &Path, folder: &Path) -> io::Result<Option<PathBuf>> {
    let name = source.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("no file name in {}", source.display()),
        )
    })?;

    if let Some(parent) = source.parent() {
        if same_dir(parent, folder).await {
            debug!(path = %source.display(), "file already in its destination folder");
            return Ok(None);
        }
    }

    let target = folder.join(name);
    if tokio::fs::try_exists(&target).await? {
        warn!(
            source = %source.display(),
            target = %target.display(),
            "destination already holds a file with this name, leaving file in place"
        );
        return Ok(None);
    }

    move_file(source, &target).await?;
    Ok(Some(target))
}

/// Rename, falling back to copy + remove when the rename fails (e.g. across devices)
pub async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    let rename_err = match tokio::fs::rename(from, to).await {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };

    debug!(from = %from.display(), to = %to.display(), "rename failed, copying instead: {rename_err}");
    if tokio::fs::copy(from, to).await.is_err() {
        let _ = tokio::fs::remove_file(to).await;
        return Err(rename_err);
    }
    tokio::fs::remove_file(from).await
}

async fn same_dir(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
