//! Resolution of the config root and state root directories.
//!
//! Priority order for each of the two roots `regular` needs:
//!
//!   1. `--config-dir` / `--state-dir` CLI flag
//!   2. `REGULAR_CONFIG_DIR` / `REGULAR_STATE_DIR` environment variable
//!   3. platform config/state directories for app "regular"

use std::path::PathBuf;

use directories::ProjectDirs;

pub fn resolve_config_root(cli_flag: Option<&str>) -> PathBuf {
    resolve(cli_flag, "REGULAR_CONFIG_DIR", |dirs| {
        dirs.config_dir().to_path_buf()
    })
}

pub fn resolve_state_root(cli_flag: Option<&str>) -> PathBuf {
    resolve(cli_flag, "REGULAR_STATE_DIR", |dirs| {
        dirs.data_dir().to_path_buf()
    })
}

fn resolve(
    cli_flag: Option<&str>,
    env_var: &str,
    from_project_dirs: impl FnOnce(&ProjectDirs) -> PathBuf,
) -> PathBuf {
    if let Some(flag) = cli_flag {
        return PathBuf::from(flag);
    }

    if let Ok(value) = std::env::var(env_var) {
        if !value.is_empty() {
            return PathBuf::from(value);
        }
    }

    if let Some(dirs) = ProjectDirs::from("", "dbohdan", "regular") {
        return from_project_dirs(&dirs);
    }

    // Fallback if the platform-dirs lookup fails (e.g. no $HOME).
    PathBuf::from(".regular")
}
