// src/infra/paths.rs — Path management
//
// All paths respect the REELSCOUT_HOME environment variable for isolation.
// When REELSCOUT_HOME is set, all config and data live under that directory.
// When unset, config uses ~/.reelscout/ and data uses the platform data dir.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "reelscout").expect("Could not determine home directory")
    })
}

/// Returns the REELSCOUT_HOME override, if set.
fn reelscout_home() -> Option<PathBuf> {
    std::env::var_os("REELSCOUT_HOME").map(PathBuf::from)
}

/// Configuration directory: $REELSCOUT_HOME/ or ~/.reelscout/
pub fn config_dir() -> PathBuf {
    if let Some(home) = reelscout_home() {
        return home;
    }
    dirs_home().join(".reelscout")
}

/// Data directory: $REELSCOUT_HOME/data/ or the platform-local data dir.
pub fn data_dir() -> PathBuf {
    if let Some(home) = reelscout_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Home directory
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .to_path_buf()
}

/// Sessions directory: one rows file + meta sidecar per session.
pub fn sessions_dir() -> PathBuf {
    data_dir().join("sessions")
}

/// Master dataset path: the cross-session deduplicated table.
pub fn master_path() -> PathBuf {
    data_dir().join("master.jsonl")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub fn ensure_dirs() -> std::io::Result<()> {
    for dir in [config_dir(), data_dir(), sessions_dir()] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
