//! Configuration file location
//!
//! A `config.yaml` in the working directory wins (handy during development),
//! otherwise the per-user config directory is used
//! (`~/.config/midi-shortcuts/config.yaml` on Linux).

use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory name used under the user config directory
const APP_NAME: &str = "midi-shortcuts";

const CONFIG_FILE: &str = "config.yaml";

/// Resolve the configuration path when none was given on the command line
pub fn default_config_path() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_config_path(&cwd, dirs::config_dir().as_deref())
}

fn resolve_config_path(cwd: &Path, user_config_dir: Option<&Path>) -> PathBuf {
    let local = cwd.join(CONFIG_FILE);
    if local.is_file() {
        debug!("Using config from working directory: {}", local.display());
        return local;
    }

    match user_config_dir {
        Some(dir) => dir.join(APP_NAME).join(CONFIG_FILE),
        None => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_working_directory_config_wins() {
        let cwd = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        std::fs::write(cwd.path().join(CONFIG_FILE), "modes: []").unwrap();

        assert_eq!(
            resolve_config_path(cwd.path(), Some(user.path())),
            cwd.path().join(CONFIG_FILE)
        );
    }

    #[test]
    fn test_falls_back_to_user_config_dir() {
        let cwd = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();

        assert_eq!(
            resolve_config_path(cwd.path(), Some(user.path())),
            user.path().join("midi-shortcuts").join("config.yaml")
        );
        assert_eq!(resolve_config_path(cwd.path(), None), cwd.path().join(CONFIG_FILE));
    }
}
