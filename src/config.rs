//! `Config`: global configuration loaded once per session from the config
//! root.
//!
//! Holds a plug-in `notify::Notifier` list: registration happens once at
//! config load, with no global notifier state elsewhere.

use std::path::{Path, PathBuf};

use crate::env::Env;
use crate::error::Result;
use crate::job::Job;
use crate::notify::{LogNotifier, Notifier};

pub struct Config {
    pub config_root: PathBuf,
    pub state_root: PathBuf,
    pub defaults: Job,
    pub max_workers: Option<usize>,
    pub notifiers: Vec<Box<dyn Notifier>>,
    /// The process environment captured once at load time; the `${VAR}`
    /// substitution outer map for `defaults/env` and every job's `env`.
    pub process_env: Env,
}

impl Config {
    /// Load configuration from `config_root`/`state_root`. The `defaults`
    /// directory need not exist; a missing one yields empty default env and
    /// the ordinary field defaults. `defaults/` only ever provides a
    /// fallback `env`; nothing else is read from it.
    pub fn load(config_root: &Path, state_root: &Path) -> Result<Config> {
        let process_env: Env = std::env::vars().collect();
        let defaults = Job::load(
            &config_root.join(crate::job::RESERVED_DEFAULTS_DIR),
            Some(&process_env),
        )?;
        let max_workers = read_max_workers(config_root);

        Ok(Config {
            config_root: config_root.to_path_buf(),
            state_root: state_root.to_path_buf(),
            defaults,
            max_workers,
            notifiers: vec![Box::new(LogNotifier)],
            process_env,
        })
    }

    /// The `${VAR}` substitution outer map for a job's own `env` file:
    /// the process environment with `defaults/env` layered on top, so a
    /// job's substitutions can resolve both process variables and values
    /// `defaults/env` itself defines.
    pub fn job_outer_env(&self) -> Env {
        crate::env::merge([self.process_env.clone(), self.defaults.env.clone()])
    }
}

fn read_max_workers(config_root: &Path) -> Option<usize> {
    std::fs::read_to_string(config_root.join("max-workers"))
        .ok()
        .and_then(|text| text.trim().parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_with_no_config_root() {
        let dir = tempfile::tempdir().unwrap();
        let config_root = dir.path().join("config");
        let state_root = dir.path().join("state");

        let config = Config::load(&config_root, &state_root).unwrap();
        assert!(config.defaults.env.is_empty());
        assert_eq!(config.max_workers, None);
        assert_eq!(config.notifiers.len(), 1);
    }

    #[test]
    fn reads_max_workers_and_defaults_env() {
        let dir = tempfile::tempdir().unwrap();
        let config_root = dir.path().join("config");
        std::fs::create_dir_all(config_root.join("defaults")).unwrap();
        std::fs::write(config_root.join("defaults").join("env"), "A=1\n").unwrap();
        std::fs::write(config_root.join("max-workers"), "4\n").unwrap();

        let config = Config::load(&config_root, &dir.path().join("state")).unwrap();
        assert_eq!(config.max_workers, Some(4));
        assert_eq!(config.defaults.env.get("A"), Some(&"1".to_string()));
    }

    #[test]
    fn defaults_env_substitution_sees_process_environment() {
        // SAFETY: test-only; not run in parallel with other env-mutating tests.
        unsafe {
            std::env::set_var("REGULAR_TEST_OUTER_VAR", "outer-value");
        }
        let dir = tempfile::tempdir().unwrap();
        let config_root = dir.path().join("config");
        std::fs::create_dir_all(config_root.join("defaults")).unwrap();
        std::fs::write(
            config_root.join("defaults").join("env"),
            "GREETING=${REGULAR_TEST_OUTER_VAR}/x\n",
        )
        .unwrap();

        let config = Config::load(&config_root, &dir.path().join("state")).unwrap();
        unsafe {
            std::env::remove_var("REGULAR_TEST_OUTER_VAR");
        }

        assert_eq!(
            config.defaults.env.get("GREETING"),
            Some(&"outer-value/x".to_string())
        );
    }

    #[test]
    fn job_outer_env_layers_defaults_over_process_env() {
        // SAFETY: test-only; not run in parallel with other env-mutating tests.
        unsafe {
            std::env::set_var("REGULAR_TEST_LAYER_VAR", "process-value");
        }
        let dir = tempfile::tempdir().unwrap();
        let config_root = dir.path().join("config");
        std::fs::create_dir_all(config_root.join("defaults")).unwrap();
        std::fs::write(
            config_root.join("defaults").join("env"),
            "REGULAR_TEST_LAYER_VAR=defaults-value\n",
        )
        .unwrap();

        let config = Config::load(&config_root, &dir.path().join("state")).unwrap();
        unsafe {
            std::env::remove_var("REGULAR_TEST_LAYER_VAR");
        }

        let outer = config.job_outer_env();
        assert_eq!(
            outer.get("REGULAR_TEST_LAYER_VAR"),
            Some(&"defaults-value".to_string())
        );
    }
}
