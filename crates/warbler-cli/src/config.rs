use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use warbler_auth::{Argon2Hasher, CredentialHasher};

/// Runtime configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub argon2_memory_kib: Option<u32>,
    pub argon2_iterations: Option<u32>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = lookup("WARBLER_DB_PATH").unwrap_or_else(|| "warbler.db".into());

        Ok(Self {
            db_path: db_path.into(),
            argon2_memory_kib: parse_opt(&lookup, "WARBLER_ARGON2_MEMORY_KIB")?,
            argon2_iterations: parse_opt(&lookup, "WARBLER_ARGON2_ITERATIONS")?,
        })
    }

    /// Argon2 defaults unless either cost is overridden.
    pub fn hasher(&self) -> Result<Arc<dyn CredentialHasher>> {
        if self.argon2_memory_kib.is_none() && self.argon2_iterations.is_none() {
            return Ok(Arc::new(Argon2Hasher::default()));
        }

        let hasher = Argon2Hasher::with_cost(
            self.argon2_memory_kib.unwrap_or(19 * 1024),
            self.argon2_iterations.unwrap_or(2),
        )
        .context("invalid Argon2 cost settings")?;
        Ok(Arc::new(hasher))
    }
}

fn parse_opt(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u32>> {
    lookup(key)
        .map(|raw| raw.parse::<u32>().with_context(|| format!("{} must be a number, got '{}'", key, raw)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.db_path, PathBuf::from("warbler.db"));
        assert_eq!(config.argon2_memory_kib, None);
        assert_eq!(config.argon2_iterations, None);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("WARBLER_DB_PATH", "/tmp/w.db"),
            ("WARBLER_ARGON2_MEMORY_KIB", "1024"),
            ("WARBLER_ARGON2_ITERATIONS", "1"),
        ])
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/w.db"));
        assert_eq!(config.argon2_memory_kib, Some(1024));
        assert!(config.hasher().is_ok());
    }

    #[test]
    fn rejects_non_numeric_cost() {
        assert!(config_from(&[("WARBLER_ARGON2_ITERATIONS", "lots")]).is_err());
    }

    #[test]
    fn rejects_impossible_cost() {
        let config = config_from(&[("WARBLER_ARGON2_MEMORY_KIB", "0")]).unwrap();
        assert!(config.hasher().is_err());
    }
}
