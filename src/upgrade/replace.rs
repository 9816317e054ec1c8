//! In-place executable replacement.
//!
//! New bytes are staged in a temp file in the target's directory (same
//! filesystem, so the final rename is atomic), given the target's
//! permissions, then renamed over the target. Platforms that refuse to
//! overwrite a running executable get a swap instead: the old binary is
//! moved aside to `<name>.old`, the staged file is renamed in, and the old
//! binary is restored if that fails.

use crate::TollgateError;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

fn io_error(context: &str, path: &Path, e: io::Error) -> TollgateError {
    TollgateError::IoError(format!("{} {}: {}", context, path.display(), e))
}

/// Path the previous binary is moved to during a swap.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".old");
    target.with_file_name(name)
}

/// Replace `target` with `bytes`.
///
/// # Errors
/// `IoError` if the bytes cannot be staged or moved into place. On error the
/// original target is left as it was.
pub fn replace_executable(target: &Path, bytes: &[u8]) -> Result<(), TollgateError> {
    let dir = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let staged = stage(dir, target, bytes)?;

    let staged = match staged.persist(target) {
        Ok(_) => {
            tracing::info!(path = %target.display(), "executable replaced");
            return Ok(());
        }
        Err(e) => {
            tracing::warn!(path = %target.display(), error = %e.error, "direct replace refused, swapping");
            e.file
        }
    };

    let backup = backup_path(target);
    fs::rename(target, &backup).map_err(|e| io_error("Failed to move aside", target, e))?;

    match staged.persist(target) {
        Ok(_) => {
            // A running executable may still hold the backup open.
            if let Err(e) = fs::remove_file(&backup) {
                tracing::debug!(path = %backup.display(), error = %e, "leaving previous executable in place");
            }
            tracing::info!(path = %target.display(), "executable replaced by swap");
            Ok(())
        }
        Err(e) => {
            if let Err(restore) = fs::rename(&backup, target) {
                tracing::error!(
                    path = %target.display(),
                    backup = %backup.display(),
                    error = %restore,
                    "failed to restore previous executable"
                );
            }
            Err(io_error("Failed to install", target, e.error))
        }
    }
}

fn stage(dir: &Path, target: &Path, bytes: &[u8]) -> Result<NamedTempFile, TollgateError> {
    let mut staged = tempfile::Builder::new()
        .prefix(".tollgate-upgrade-")
        .tempfile_in(dir)
        .map_err(|e| io_error("Failed to create temp file in", dir, e))?;

    staged
        .write_all(bytes)
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| io_error("Failed to write", staged.path(), e))?;

    match fs::metadata(target) {
        Ok(meta) => fs::set_permissions(staged.path(), meta.permissions())
            .map_err(|e| io_error("Failed to set permissions on", staged.path(), e))?,
        Err(_) => make_executable(staged.path())?,
    }

    Ok(staged)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), TollgateError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .map_err(|e| io_error("Failed to set permissions on", path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), TollgateError> {
    Ok(())
}
