use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Interpreter settings, usually read from a YAML file.
///
/// ```yaml
/// recursion_limit: 500
/// library_paths: [lib, /opt/pys]
/// warnings: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Maximum number of nested script calls.
    pub recursion_limit: usize,
    /// Directories searched for modules after the importing file's own.
    pub library_paths: Vec<PathBuf>,
    /// Report legacy escape sequences while lexing.
    pub warnings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recursion_limit: 1000,
            library_paths: Vec::new(),
            warnings: true,
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid interpreter configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("in config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_fields_take_defaults() {
        let config = Config::from_yaml("warnings: false").expect("config should parse");
        assert_eq!(
            config,
            Config {
                warnings: false,
                ..Config::default()
            }
        );
    }

    #[test]
    fn reads_every_field() {
        let config = Config::from_yaml(indoc! {"
            recursion_limit: 50
            library_paths:
              - lib
              - /opt/pys
        "})
        .expect("config should parse");
        assert_eq!(config.recursion_limit, 50);
        assert_eq!(
            config.library_paths,
            vec![PathBuf::from("lib"), PathBuf::from("/opt/pys")]
        );
        assert!(config.warnings);
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = Config::from_yaml("color: true").expect_err("unknown field should fail");
        assert_eq!(error.to_string(), "invalid interpreter configuration");
    }
}
