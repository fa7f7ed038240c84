use crate::errors::{GitcleanError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Root directory holding the single reusable backup slot.
fn backup_root() -> PathBuf {
    if cfg!(windows) {
        let tmp = std::env::var("TEMP").unwrap_or_else(|_| "C:\\Temp".to_string());
        Path::new(&tmp).join("gitclean-backups")
    } else {
        PathBuf::from("/tmp/gitclean-backups")
    }
}

/// Copy the working tree at `source` into the fixed backup slot, replacing
/// any previous snapshot. Returns the absolute path of the copy.
pub fn backup_repository(source: &Path) -> Result<PathBuf> {
    backup_into(source, &backup_root())
}

fn backup_into(source: &Path, root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(root)
        .map_err(|e| GitcleanError::Backup(format!("cannot create {}: {}", root.display(), e)))?;

    let slot = root.join("active");
    if slot.exists() {
        fs::remove_dir_all(&slot).map_err(|e| {
            GitcleanError::Backup(format!("failed to remove existing backup directory: {}", e))
        })?;
    }

    for entry in WalkDir::new(source) {
        let entry =
            entry.map_err(|e| GitcleanError::Backup(format!("failed to walk tree: {}", e)))?;
        if entry.file_name() == ".gitignore" {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| GitcleanError::Backup(e.to_string()))?;
        let destination = slot.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&destination).map_err(|e| {
                GitcleanError::Backup(format!("cannot create {}: {}", destination.display(), e))
            })?;
            continue;
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GitcleanError::Backup(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &destination)?;
        } else {
            fs::copy(entry.path(), &destination).map_err(|e| {
                GitcleanError::Backup(format!(
                    "failed to copy {}: {}",
                    entry.path().display(),
                    e
                ))
            })?;
        }
    }

    Ok(slot)
}

// Links are recreated as links, dangling ones included, so the snapshot
// restores to the same tree instead of flattening or failing on them.
#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> Result<()> {
    let link_target = fs::read_link(source).map_err(|e| {
        GitcleanError::Backup(format!("failed to read link {}: {}", source.display(), e))
    })?;
    std::os::unix::fs::symlink(&link_target, destination).map_err(|e| {
        GitcleanError::Backup(format!(
            "failed to create link {}: {}",
            destination.display(),
            e
        ))
    })
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, _destination: &Path) -> Result<()> {
    log::warn!("Skipping symlink {} in backup", source.display());
    Ok(())
}
