//! Layered configuration for the `bdocs` binary.
//!
//! Sources, later ones winning: built-in defaults, the optional TOML file,
//! then `BDOCS_*` environment variables. Nested keys use a double underscore,
//! e.g. `BDOCS_CALCULATOR__REMISSION_CAP=one_third`.

use std::path::{Path, PathBuf};

use bdocs_core::config::CalculatorConfig;
use serde::Deserialize;

const ENV_PREFIX: &str = "BDOCS";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
  pub store_path: PathBuf,
  pub calculator: CalculatorConfig,
}

impl Default for CliConfig {
  fn default() -> Self {
    Self {
      store_path: PathBuf::from("~/.local/share/bdocs/sentences.db"),
      calculator: CalculatorConfig::default(),
    }
  }
}

impl CliConfig {
  /// Load from `path` (which need not exist) and the process environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::from_sources(
      config::File::from(path).required(false),
      environment(),
    )
  }

  fn from_sources<F>(
    file: F,
    env: config::Environment,
  ) -> Result<Self, config::ConfigError>
  where
    F: config::Source + Send + Sync + 'static,
  {
    config::Config::builder()
      .add_source(file)
      .add_source(env)
      .build()?
      .try_deserialize()
  }

  /// The store path with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

fn environment() -> config::Environment {
  config::Environment::with_prefix(ENV_PREFIX)
    .prefix_separator("_")
    .separator("__")
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
