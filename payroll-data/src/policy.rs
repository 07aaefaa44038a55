use std::path::{Path, PathBuf};

use payroll_core::PayrollPolicy;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parses a policy from TOML. Keys left out keep their default values.
pub fn parse_policy(contents: &str) -> Result<PayrollPolicy, PolicyError> {
    Ok(toml::from_str(contents)?)
}

pub fn load_policy(path: &Path) -> Result<PayrollPolicy, PolicyError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_policy(&contents)
}
