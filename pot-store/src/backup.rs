//! Ledger Backups
//!
//! A backup is a plain sled database holding a copy of every tree, written
//! to `<dir>/<timestamp>`. It can be opened with [`LedgerStore::open`].
//! Callers must keep writers out while a backup runs.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::LedgerStore;

/// Directory name format of a backup
pub const BACKUP_NAME_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

impl LedgerStore {
    /// Copy the whole ledger into `dir/<now>`.
    ///
    /// Returns `None` when a backup with the same timestamp already exists.
    pub fn backup_to(&self, dir: &Path, now: DateTime<Utc>) -> StoreResult<Option<PathBuf>> {
        fs::create_dir_all(dir)?;
        let target = dir.join(now.format(BACKUP_NAME_FORMAT).to_string());
        if target.exists() {
            return Ok(None);
        }

        self.flush()?;
        let copy = sled::open(&target)
            .map_err(|e| StoreError::Backup(format!("open {}: {}", target.display(), e)))?;
        let mut copied = 0usize;
        for name in self.db.tree_names() {
            let source = self.db.open_tree(&name)?;
            let dest = copy.open_tree(&name)?;
            for item in source.iter() {
                let (key, value) = item?;
                dest.insert(key, value)?;
                copied += 1;
            }
        }
        copy.flush()?;

        info!(path = %target.display(), records = copied, "Ledger backed up");
        Ok(Some(target))
    }
}

/// Delete backups in `dir` older than `retention`. Returns how many were removed.
///
/// Entries whose name is not a backup timestamp are left alone.
pub fn prune_backups(dir: &Path, now: DateTime<Utc>, retention: Duration) -> StoreResult<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let cutoff = now - retention;
    let mut removed = 0;
    for item in fs::read_dir(dir)? {
        let item = item?;
        let name = item.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Ok(taken) = NaiveDateTime::parse_from_str(name, BACKUP_NAME_FORMAT) else {
            continue;
        };
        if taken.and_utc() >= cutoff {
            continue;
        }
        let path = item.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete backup"),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pot_core::Account;
    use tempfile::tempdir;

    #[test]
    fn test_backup_copies_ledger() {
        let dir = tempdir().unwrap();
        let store = LedgerStore::open(dir.path().join("ledger")).unwrap();
        let mut txn = store.begin();
        txn.put_account(Account::new(1, 1, "addr1"));
        txn.set_last_height(77);
        txn.mark_processed("tx");
        txn.commit().unwrap();

        let now = Utc.with_ymd_and_hms(2021, 11, 20, 23, 30, 0).unwrap();
        let backups = dir.path().join("backups");
        let path = store.backup_to(&backups, now).unwrap().unwrap();
        assert!(path.ends_with("2021-11-20T23-30-00"));
        // same timestamp twice is skipped
        assert!(store.backup_to(&backups, now).unwrap().is_none());
        drop(store);

        let restored = LedgerStore::open(&path).unwrap();
        assert_eq!(restored.last_height().unwrap(), 77);
        assert!(restored.get_account(1).unwrap().is_some());
        assert!(restored.is_processed("tx").unwrap());
    }

    #[test]
    fn test_prune_backups() {
        let dir = tempdir().unwrap();
        for name in ["2021-08-01T23-30-00", "2021-10-01T23-30-00", "2021-11-19T23-30-00", "notes"] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        let now = Utc.with_ymd_and_hms(2021, 11, 20, 23, 30, 0).unwrap();

        let removed = prune_backups(dir.path(), now, Duration::days(60)).unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join("2021-08-01T23-30-00").exists());
        assert!(dir.path().join("2021-10-01T23-30-00").exists());
        assert!(dir.path().join("notes").exists());

        assert_eq!(prune_backups(&dir.path().join("missing"), now, Duration::days(60)).unwrap(), 0);
    }
}
