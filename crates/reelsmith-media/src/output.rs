//! Promotion of finished renders out of the request workspace.
//!
//! The workspace usually lives on a scratch filesystem, so a plain rename can
//! fail with EXDEV. In that case the render is staged next to the destination
//! and renamed into place, so callers never observe a half-written file.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Move a finished render to `dst`, replacing any existing file.
pub async fn promote_output(src: &Path, dst: &Path) -> MediaResult<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            debug!(
                src = %src.display(),
                dst = %dst.display(),
                "Render is on another filesystem, copying"
            );
            copy_into_place(src, dst).await
        }
        Err(e) => Err(e.into()),
    }
}

/// EXDEV on Linux and macOS.
fn is_cross_device(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

fn staging_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "render".to_string());
    dst.with_file_name(format!(".{}.partial", name))
}

async fn copy_into_place(src: &Path, dst: &Path) -> MediaResult<()> {
    let staged = staging_path(dst);

    if let Err(e) = fs::copy(src, &staged).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staged, dst).await {
        let _ = fs::remove_file(&staged).await;
        return Err(e.into());
    }

    // The workspace is removed afterwards anyway
    if let Err(e) = fs::remove_file(src).await {
        warn!(src = %src.display(), "Failed to remove render after copy: {}", e);
    }
    Ok(())
}
