//! Application configuration for ModuleMap.
//!
//! User config lives at `~/.modulemap/modulemap.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModuleMapError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "modulemap.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".modulemap";

// ---------------------------------------------------------------------------
// Completion model enum
// ---------------------------------------------------------------------------

/// The closed set of supported completion models.
///
/// Opaque to the core beyond its wire identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompletionModel {
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
}

impl CompletionModel {
    /// Wire identifier sent to the completion endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Gpt4 => "gpt-4",
        }
    }
}

impl std::fmt::Display for CompletionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CompletionModel {
    type Err = ModuleMapError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gpt-3.5-turbo" => Ok(Self::Gpt35Turbo),
            "gpt-4" => Ok(Self::Gpt4),
            other => Err(ModuleMapError::config(format!(
                "unsupported model '{other}': expected 'gpt-3.5-turbo' or 'gpt-4'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config structs (matching modulemap.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global crawl defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Completion provider settings.
    #[serde(default)]
    pub completion: CompletionConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Maximum pages fetched per seed URL.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Politeness delay before each page fetch, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Maximum crawl depth. Product behavior fixes this at 1
    /// (seed pages plus their direct same-domain links).
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Per-fetch HTTP timeout, in seconds.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            delay_ms: default_delay_ms(),
            max_depth: default_max_depth(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

fn default_max_pages() -> usize {
    100
}
fn default_delay_ms() -> u64 {
    500
}
fn default_max_depth() -> u32 {
    1
}
fn default_fetch_timeout_secs() -> u64 {
    10
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Default completion model.
    #[serde(default = "default_model")]
    pub default_model: CompletionModel,

    /// Base URL of the OpenAI-compatible endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> CompletionModel {
    CompletionModel::Gpt35Turbo
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

// ---------------------------------------------------------------------------
// Runtime options (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl options.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Crawl page budget: `|visited| <= max_pages` always holds.
    pub max_pages: usize,
    /// Politeness delay before each page fetch.
    pub delay: Duration,
    /// BFS depth cap; no link discovery occurs at this depth.
    pub max_depth: u32,
    /// Per-fetch HTTP timeout.
    pub fetch_timeout: Duration,
}

impl From<&AppConfig> for CrawlOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_pages: config.defaults.max_pages,
            delay: Duration::from_millis(config.defaults.delay_ms),
            max_depth: config.defaults.max_depth,
            fetch_timeout: Duration::from_secs(config.defaults.fetch_timeout_secs),
        }
    }
}

/// Runtime extraction options.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Completion model to use.
    pub model: CompletionModel,
    /// Approximate token budget per packaged chunk.
    pub max_chunk_tokens: usize,
    /// Pacing delay between successive completion calls of one job.
    pub pacing: Duration,
    /// Output-size ceiling per completion call.
    pub max_output_tokens: u32,
    /// Sampling temperature for structured extraction.
    pub temperature: f32,
}

impl ExtractOptions {
    /// Defaults for a given model: 6000-token chunks, 1 s pacing,
    /// 4000-token output ceiling, temperature 0.2.
    pub fn for_model(model: CompletionModel) -> Self {
        Self {
            model,
            max_chunk_tokens: 6000,
            pacing: Duration::from_secs(1),
            max_output_tokens: 4000,
            temperature: 0.2,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.modulemap/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ModuleMapError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.modulemap/modulemap.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ModuleMapError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ModuleMapError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ModuleMapError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ModuleMapError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ModuleMapError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the API credential, failing fast when it is absent.
///
/// Checked before any crawling starts so a misconfigured run never spends
/// time fetching pages it cannot process.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.completion.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ModuleMapError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_pages"));
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("gpt-3.5-turbo"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.max_pages, 100);
        assert_eq!(parsed.defaults.max_depth, 1);
        assert_eq!(parsed.completion.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn crawl_options_from_app_config() {
        let app = AppConfig::default();
        let opts = CrawlOptions::from(&app);
        assert_eq!(opts.max_pages, 100);
        assert_eq!(opts.delay, Duration::from_millis(500));
        assert_eq!(opts.max_depth, 1);
    }

    #[test]
    fn model_parses_from_str() {
        assert_eq!(
            "gpt-4".parse::<CompletionModel>().unwrap(),
            CompletionModel::Gpt4
        );
        assert!("gpt-5-nano".parse::<CompletionModel>().is_err());
    }

    #[test]
    fn extract_options_defaults() {
        let opts = ExtractOptions::for_model(CompletionModel::Gpt4);
        assert_eq!(opts.max_chunk_tokens, 6000);
        assert_eq!(opts.max_output_tokens, 4000);
        assert!((opts.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn api_key_resolution_fails_when_unset() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.completion.api_key_env = "MODULEMAP_TEST_NONEXISTENT_KEY_98765".into();
        let result = resolve_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
