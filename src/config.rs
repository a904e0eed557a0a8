//! Configuration loading and management

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::capture::ExitCombo;

/// Environment variable overriding the exit combination, e.g. "q+esc"
const EXIT_KEYS_ENV: &str = "KEYTRACE_EXIT_KEYS";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Key combination that terminates recording
    pub exit_combo: ExitCombo,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let home = std::env::var("HOME")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("keytrace");

        let socket_path = data_dir.join("daemon.sock");

        let exit_combo = match std::env::var(EXIT_KEYS_ENV) {
            Ok(spec) => ExitCombo::parse(&spec)
                .with_context(|| format!("invalid {} value {:?}", EXIT_KEYS_ENV, spec))?,
            Err(_) => ExitCombo::default(),
        };

        Ok(Self {
            socket_path,
            data_dir,
            exit_combo,
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.socket_path.to_string_lossy().contains("keytrace"));
        assert_eq!(config.exit_combo.keys().len(), 2);
    }
}
