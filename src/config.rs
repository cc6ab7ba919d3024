use crate::error::{Result, SeatingError};
use std::{env, path::PathBuf};

const ENV_WORKSPACE: &str = "SEATINGD_WORKSPACE";
const ENV_LOG: &str = "SEATINGD_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace opened at startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(workspace) = lookup(ENV_WORKSPACE) {
            if !workspace.trim().is_empty() {
                let path = PathBuf::from(workspace);

                // Missing is fine (it gets created); a file in the way is not.
                if path.exists() && !path.is_dir() {
                    return Err(SeatingError::NotADirectory(path));
                }

                config.workspace = Some(path);
            }
        }

        if let Some(filter) = lookup(ENV_LOG) {
            let filter = filter.trim();
            if !filter.is_empty() {
                config.log_filter = filter.to_string();
            }
        }
        Ok(config)
    }
}
