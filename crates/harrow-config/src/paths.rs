//! Where harrow looks for configuration files.
//!
//! Files are layered lowest precedence first: the per-user file, then
//! [`PROJECT_FILE`] and [`LOCAL_FILE`] in the project directory.

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Checked-in project settings.
pub const PROJECT_FILE: &str = "harrow.toml";

/// Per-checkout overrides, meant to stay out of version control.
pub const LOCAL_FILE: &str = "harrow.local.toml";

const USER_FILE: &str = "config.toml";

/// Resolves the per-user and per-project configuration files.
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("rs", "harrow", "harrow"),
        }
    }

    /// Platform config directory for harrow, `$XDG_CONFIG_HOME/harrow` on Linux.
    ///
    /// Fails when the platform reports no home directory.
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::XdgError("no home directory to hold user config".to_string()))
    }

    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join(USER_FILE))
    }

    /// Project-level files in merge order; later files override earlier ones.
    pub fn project_files(project_dir: impl AsRef<Path>) -> [PathBuf; 2] {
        let dir = project_dir.as_ref();
        [dir.join(PROJECT_FILE), dir.join(LOCAL_FILE)]
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_user_config_file_is_named_for_harrow() {
        // Hosts without a home directory have no user file at all.
        if let Ok(file) = Paths::new().user_config_file() {
            assert!(file.to_string_lossy().contains("harrow"));
            assert!(file.ends_with(USER_FILE));
        }
    }

    #[test]
    fn test_local_file_overrides_project_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        assert_eq!(
            Paths::project_files(project_dir),
            [project_dir.join("harrow.toml"), project_dir.join("harrow.local.toml")]
        );
    }
}
