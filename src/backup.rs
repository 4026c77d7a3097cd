//! Migrations directory backup
//!
//! Regenerating migrations from scratch replaces whatever is in the
//! migrations directory, so the old contents are copied to a timestamped
//! sibling (`migrations.backup-20260118-093012`) first.

use crate::Result;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Sibling path used for a backup taken at `at`
pub fn backup_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    let name = dir
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "migrations".to_string());
    dir.with_file_name(format!("{}.backup-{}", name, at.format("%Y%m%d-%H%M%S")))
}

/// Copy `dir` to a timestamped sibling. Returns `None` when there is nothing to back up.
pub fn backup_dir(dir: &Path) -> Result<Option<PathBuf>> {
    backup_dir_at(dir, Local::now())
}

pub fn backup_dir_at(dir: &Path, at: DateTime<Local>) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        tracing::debug!("No directory at {}, skipping backup", dir.display());
        return Ok(None);
    }

    let target = backup_path(dir, at);
    let mut files = 0usize;

    for entry in WalkDir::new(dir) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
            files += 1;
        }
    }

    tracing::info!("Backed up {} file(s) from {} to {}", files, dir.display(), target.display());
    Ok(Some(target))
}

/// Remove everything inside `dir`, keeping the directory itself.
/// Returns the number of top-level entries removed.
pub fn clear_dir(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        removed += 1;
    }

    tracing::info!("Cleared {} entr(ies) from {}", removed, dir.display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 18, 9, 30, 12).unwrap()
    }

    #[test]
    fn test_backup_path() {
        let path = backup_path(Path::new("/srv/app/migrations"), fixed_time());
        assert_eq!(path, PathBuf::from("/srv/app/migrations.backup-20260118-093012"));
    }

    #[test]
    fn test_backup_copies_tree() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir_all(migrations.join("001_user")).unwrap();
        std::fs::write(migrations.join("001_user/migration.sql"), "CREATE TABLE u();").unwrap();
        std::fs::write(migrations.join("lock.toml"), "provider = \"x\"").unwrap();

        let target = backup_dir_at(&migrations, fixed_time()).unwrap().unwrap();

        assert_eq!(
            std::fs::read_to_string(target.join("001_user/migration.sql")).unwrap(),
            "CREATE TABLE u();"
        );
        assert!(target.join("lock.toml").is_file());
        // original untouched
        assert!(migrations.join("lock.toml").is_file());
    }

    #[test]
    fn test_backup_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(backup_dir(&dir.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn test_clear_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/c.sql"), "").unwrap();
        std::fs::write(dir.path().join("d.sql"), "").unwrap();

        assert_eq!(clear_dir(dir.path()).unwrap(), 2);
        assert!(dir.path().is_dir());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
