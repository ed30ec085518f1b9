//! Timestamped state-file backups with bounded retention.
//!
//! # Invariants
//! - Backup names sort lexically in creation order.
//! - Retention only ever deletes files matching the backup name pattern.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const BACKUP_PREFIX: &str = "state-";
const BACKUP_SUFFIX: &str = ".json";
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const MAX_SEQUENCE: u32 = 99;

#[derive(Debug, Clone)]
pub struct BackupService {
    dir: PathBuf,
    max_files: usize,
}

impl BackupService {
    /// `max_files` below one is treated as one.
    pub fn new(dir: impl Into<PathBuf>, max_files: u32) -> Self {
        Self {
            dir: dir.into(),
            max_files: max_files.max(1) as usize,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies `source` into the backup directory, then applies retention.
    pub fn create_backup(&self, source: &Path) -> io::Result<PathBuf> {
        self.create_backup_at(source, Utc::now())
    }

    pub fn create_backup_at(&self, source: &Path, now: DateTime<Utc>) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let target = self.free_name(now)?;

        if let Err(err) = fs::copy(source, &target) {
            warn!(
                "event=backup_create module=doctor status=error error_code=io error={}",
                err
            );
            return Err(err);
        }
        info!(
            "event=backup_create module=doctor status=ok file={}",
            file_name(&target)
        );

        self.prune()?;
        Ok(target)
    }

    /// Existing backups, oldest first.
    pub fn list(&self) -> io::Result<Vec<PathBuf>> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut backups = Vec::new();
        for item in read_dir {
            let path = item?.path();
            if path.is_file() && is_backup_name(&file_name(&path)) {
                backups.push(path);
            }
        }
        backups.sort();
        Ok(backups)
    }

    /// Removes the oldest backups beyond the retention limit.
    pub fn prune(&self) -> io::Result<Vec<PathBuf>> {
        let backups = self.list()?;
        let excess = backups.len().saturating_sub(self.max_files);
        let mut removed = Vec::with_capacity(excess);

        for path in backups.into_iter().take(excess) {
            match fs::remove_file(&path) {
                Ok(()) => removed.push(path),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        if !removed.is_empty() {
            debug!(
                "event=backup_prune module=doctor status=ok removed={} kept={}",
                removed.len(),
                self.max_files
            );
        }
        Ok(removed)
    }

    fn free_name(&self, now: DateTime<Utc>) -> io::Result<PathBuf> {
        let stamp = now.format(STAMP_FORMAT);
        (0..=MAX_SEQUENCE)
            .map(|seq| {
                self.dir
                    .join(format!("{BACKUP_PREFIX}{stamp}-{seq:02}{BACKUP_SUFFIX}"))
            })
            .find(|candidate| !candidate.exists())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("too many backups for timestamp {stamp}"),
                )
            })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Matches `state-<14 digits>-<2 digits>.json`.
fn is_backup_name(name: &str) -> bool {
    let Some(core) = name
        .strip_prefix(BACKUP_PREFIX)
        .and_then(|rest| rest.strip_suffix(BACKUP_SUFFIX))
    else {
        return false;
    };
    let Some((stamp, seq)) = core.split_once('-') else {
        return false;
    };
    stamp.len() == 14
        && seq.len() == 2
        && stamp.bytes().chain(seq.bytes()).all(|b| b.is_ascii_digit())
}
