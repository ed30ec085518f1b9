//! On-disk locations of the state file, backups and logs.
//!
//! `ONE_THING_HOME` overrides the root; otherwise `<home>/.one_thing` is used.

use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "ONE_THING_HOME";
pub const DEFAULT_DIR_NAME: &str = ".one_thing";
pub const STATE_FILE_NAME: &str = "one_thing.json";
pub const BACKUP_DIR_NAME: &str = "backups";
pub const LOG_DIR_NAME: &str = "logs";

/// The home directory could not be determined and no override was given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoHomeDir;

impl Display for NoHomeDir {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot locate a home directory; set {HOME_ENV}")
    }
}

impl Error for NoHomeDir {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub root: PathBuf,
    pub state_file: PathBuf,
    pub backup_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl StorePaths {
    /// Resolves from `ONE_THING_HOME`, falling back to the user's home directory.
    pub fn resolve() -> Result<Self, NoHomeDir> {
        let override_root = env::var_os(HOME_ENV).filter(|value| !value.is_empty());
        Self::resolve_with(override_root.map(PathBuf::from), dirs::home_dir())
    }

    /// Lays out every location under `root`.
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            state_file: root.join(STATE_FILE_NAME),
            backup_dir: root.join(BACKUP_DIR_NAME),
            log_dir: root.join(LOG_DIR_NAME),
            root,
        }
    }

    fn resolve_with(
        override_root: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Result<Self, NoHomeDir> {
        match (override_root, home) {
            (Some(root), _) => Ok(Self::in_dir(root)),
            (None, Some(home)) => Ok(Self::in_dir(home.join(DEFAULT_DIR_NAME))),
            (None, None) => Err(NoHomeDir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NoHomeDir, StorePaths};
    use std::path::PathBuf;

    #[test]
    fn override_wins_over_home() {
        let paths = StorePaths::resolve_with(
            Some(PathBuf::from("/data/ot")),
            Some(PathBuf::from("/home/u")),
        )
        .unwrap();
        assert_eq!(paths.state_file, PathBuf::from("/data/ot/one_thing.json"));
        assert_eq!(paths.backup_dir, PathBuf::from("/data/ot/backups"));
    }

    #[test]
    fn home_fallback_uses_dot_directory() {
        let paths = StorePaths::resolve_with(None, Some(PathBuf::from("/home/u"))).unwrap();
        assert_eq!(paths.root, PathBuf::from("/home/u/.one_thing"));
        assert_eq!(paths.log_dir, PathBuf::from("/home/u/.one_thing/logs"));
        assert_eq!(StorePaths::resolve_with(None, None), Err(NoHomeDir));
    }
}
