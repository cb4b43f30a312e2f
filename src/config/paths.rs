//! Where the detector keeps its settings and model weights.
//!
//! ```text
//! <config dir>/vowel-detect/settings.toml
//! <local data dir>/vowel-detect/models/vowel/model.safetensors
//! ```
//!
//! `<config dir>` and `<local data dir>` come from `dirs` (e.g.
//! `~/.config` and `~/.local/share` on Linux, `%APPDATA%` and
//! `%LOCALAPPDATA%` on Windows).  A relative `model_path` in the settings is
//! looked up in the models directory.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "vowel-detect";
const SETTINGS_FILE: &str = "settings.toml";
const DEFAULT_MODEL: &str = "vowel/model.safetensors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Root for learned-mode weight files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    /// Platform directories, or the working directory where the platform
    /// has none.
    pub fn new() -> Self {
        let here = || PathBuf::from(".");
        Self::under(
            &dirs::config_dir().unwrap_or_else(here),
            &dirs::data_local_dir().unwrap_or_else(here),
        )
    }

    /// Layout rooted at explicit config and data directories.
    pub fn under(config_root: &Path, data_root: &Path) -> Self {
        let config_dir = config_root.join(APP_DIR);
        Self {
            settings_file: config_dir.join(SETTINGS_FILE),
            config_dir,
            models_dir: data_root.join(APP_DIR).join("models"),
        }
    }

    pub fn default_model_file(&self) -> PathBuf {
        self.models_dir.join(DEFAULT_MODEL)
    }

    /// Resolve a configured model path: absolute paths are kept, relative
    /// ones are taken from the models directory, and `None` means the
    /// bundled default.
    pub fn model_file(&self, configured: Option<&Path>) -> PathBuf {
        match configured {
            None => self.default_model_file(),
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.models_dir.join(p),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
