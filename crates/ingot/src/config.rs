//! Build configuration
//!
//! Configuration is layered: compiled-in defaults, then a user-level
//! `ingot.toml` from the platform config directory, then a project-local
//! `ingot.toml`. The nearest file wins wholesale; CLI flags override
//! individual fields on top of whatever was loaded.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use etcetera::BaseStrategy;
use log::debug;
use serde::{Deserialize, Serialize};

/// Persisted build settings for one project.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Package root directories to collect from.
    pub package_paths: Vec<PathBuf>,
    /// Where generated files land.
    pub working_path: PathBuf,
    /// Major Python version the translator should assume.
    pub language_level: u8,
    /// Emit html annotations alongside each unit.
    pub annotate_html: bool,
    /// Include coverage information in annotations.
    pub annotate_coverage: bool,
    /// Rebuild only when sources are newer than outputs.
    pub check_timestamps: bool,
    /// Translator worker count; `0` auto-detects.
    pub jobs: usize,
    /// Extra include search paths for the link step.
    pub include_dirs: Vec<PathBuf>,
    /// Extra library search paths for the link step.
    pub library_dirs: Vec<PathBuf>,
    /// Libraries to link against.
    pub libraries: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            package_paths: Vec::new(),
            working_path: PathBuf::from("./build/generated"),
            language_level: 3,
            annotate_html: false,
            annotate_coverage: false,
            check_timestamps: true,
            jobs: 0,
            include_dirs: Vec::new(),
            library_dirs: Vec::new(),
            libraries: Vec::new(),
        }
    }
}

/// Name of the config file at either layer.
const CONFIG_FILE_NAME: &str = "ingot.toml";

impl Config {
    /// Parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Load the effective config for a project directory.
    pub fn load(project_root: &Path) -> Result<Self> {
        let project_config = project_root.join(CONFIG_FILE_NAME);
        if project_config.is_file() {
            debug!("using project config {}", project_config.display());
            return Self::from_file(&project_config);
        }

        if let Some(user_config) = user_config_path() {
            if user_config.is_file() {
                debug!("using user config {}", user_config.display());
                return Self::from_file(&user_config);
            }
        }

        Ok(Self::default())
    }
}

fn user_config_path() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("ingot").join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_checks_timestamps() {
        let config = Config::default();
        assert!(config.check_timestamps);
        assert_eq!(config.language_level, 3);
        assert_eq!(config.working_path, PathBuf::from("./build/generated"));
    }

    #[test]
    fn parses_partial_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "package_paths = ['src/pkg']\nlanguage_level = 2\njobs = 4\n",
        )
        .expect("write config");

        let config = Config::from_file(&path).expect("valid config");
        assert_eq!(config.package_paths, vec![PathBuf::from("src/pkg")]);
        assert_eq!(config.language_level, 2);
        assert_eq!(config.jobs, 4);
        // Unspecified fields keep their defaults.
        assert!(config.check_timestamps);
    }

    #[test]
    fn rejects_malformed_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "language_level = 'three'\n").expect("write config");
        assert!(Config::from_file(&path).is_err());
    }
}
