// src/infra/paths.rs — Config and data locations
//
// PAIRUP_HOME overrides everything: config and data both live under it.
// Otherwise config uses ~/.pairup/ and data uses XDG_DATA_HOME/pairup.

use directories::{BaseDirs, ProjectDirs};
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<Option<ProjectDirs>> = OnceLock::new();

fn project_dirs() -> Option<&'static ProjectDirs> {
    PROJECT_DIRS
        .get_or_init(|| ProjectDirs::from("", "", "pairup"))
        .as_ref()
}

fn pairup_home() -> Option<PathBuf> {
    std::env::var_os("PAIRUP_HOME").map(PathBuf::from)
}

/// Home directory, or the working directory when no home can be determined.
pub fn dirs_home() -> PathBuf {
    BaseDirs::new()
        .map(|b| b.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $PAIRUP_HOME/ or ~/.pairup/
pub fn config_dir() -> PathBuf {
    if let Some(home) = pairup_home() {
        return home;
    }
    dirs_home().join(".pairup")
}

/// Data directory: $PAIRUP_HOME/data/ or ~/.local/share/pairup/
pub fn data_dir() -> PathBuf {
    if let Some(home) = pairup_home() {
        return home.join("data");
    }
    match project_dirs() {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Default database path
pub fn db_path() -> PathBuf {
    data_dir().join("pairup.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

