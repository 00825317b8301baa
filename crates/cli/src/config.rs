// ==============================================================================
// harness.toml Configuration
// ==============================================================================
//
// Discovers and loads the `harness.toml` file that tells the runner where the
// fixtures live and how to start the language server. Every field has a
// default, so an empty file is valid; command-line flags override it.
//
// Example harness.toml:
//
// ```toml
// cases = "tests/language-service/cases"
//
// [server]
// command = "my-language-server"
// args = ["--stdio"]
// root = "."
// ready_timeout_ms = 5000
// request_timeout_ms = 10000
//
// [names]
// qualified = "data.qName"
// dialect_qualified = "data.pyQName"
//
// [settings]
// strict = true
// ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use lsp_client::{LspOptions, NameField, NameFields};
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_FILE: &str = "harness.toml";

/// Top-level `harness.toml` configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarnessConfig {
    /// Fixture directory, relative to the config file.
    #[serde(default)]
    pub cases: Option<PathBuf>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub names: NamesConfig,

    /// Opaque settings forwarded to the server.
    #[serde(default)]
    pub settings: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Workspace root for the synthetic documents, relative to the config file.
    pub root: PathBuf,
    pub ready_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            command: None,
            args: Vec::new(),
            root: PathBuf::from("."),
            ready_timeout_ms: 5_000,
            request_timeout_ms: 10_000,
        }
    }
}

/// Completion item fields candidate names are read from.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamesConfig {
    pub qualified: NameField,
    pub dialect_qualified: Option<NameField>,
}

impl Default for NamesConfig {
    fn default() -> Self {
        NamesConfig {
            qualified: NameField::Label,
            dialect_qualified: None,
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    #[diagnostic(code(cli::config::read))]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid {}: {source}", .path.display())]
    #[diagnostic(code(cli::config::parse))]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Walk up from `start_dir` looking for `harness.toml`. Returns the first match.
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir;
    loop {
        let candidate = dir.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

/// Read and parse a `harness.toml` file.
pub fn load_config(path: &Path) -> Result<HarnessConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl HarnessConfig {
    /// Cases directory resolved against the config file's directory.
    pub fn cases_dir(&self, config_dir: &Path) -> Option<PathBuf> {
        self.cases.as_ref().map(|cases| config_dir.join(cases))
    }

    pub fn lsp_options(&self, config_dir: &Path) -> LspOptions {
        LspOptions {
            root: config_dir.join(&self.server.root),
            ready_timeout: Duration::from_millis(self.server.ready_timeout_ms),
            request_timeout: Duration::from_millis(self.server.request_timeout_ms),
            names: NameFields {
                qualified: self.names.qualified.clone(),
                dialect_qualified: self.names.dialect_qualified.clone(),
            },
        }
    }
}
