//! Startup configuration.
//!
//! Values come from an explicit, ordered list of named sources; the first
//! source that yields a non-empty value wins. The standard order is
//! `.env` file, then process environment, then built-in defaults.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_API_KEY_ALIAS: &str = "GOOGLE_API_KEY";
pub const ENV_BASE_URL: &str = "GEMINI_BASE_URL";
pub const ENV_MODEL: &str = "GEMINI_MODEL";
pub const ENV_TIMEOUT_SECS: &str = "PROMPTFORGE_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_ENV_FILE: &str = ".env";

pub trait ConfigSource: Send + Sync {
    fn name(&self) -> &str;
    fn get(&self, key: &str) -> Option<String>;
}

/// Fixed key/value pairs. Used for built-in defaults and in tests.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    name: String,
    values: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn defaults() -> Self {
        Self::new("default")
            .with(ENV_BASE_URL, DEFAULT_BASE_URL)
            .with(ENV_MODEL, DEFAULT_MODEL)
            .with(ENV_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS.to_string())
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// A dotenv-format override file. A missing file is an empty source.
#[derive(Debug, Clone)]
pub struct DotenvFileSource {
    name: String,
    values: BTreeMap<String, String>,
}

impl DotenvFileSource {
    pub fn load(path: &Path) -> Result<Self> {
        let mut values = BTreeMap::new();
        if path.is_file() {
            let entries = dotenv::from_path_iter(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            for entry in entries {
                let (key, value) =
                    entry.with_context(|| format!("failed to parse {}", path.display()))?;
                values.insert(key, value);
            }
        }
        Ok(Self {
            name: path.display().to_string(),
            values,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigSource for DotenvFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvSource;

impl ConfigSource for ProcessEnvSource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub key: String,
    pub value: String,
    pub source: String,
}

#[derive(Default)]
pub struct ConfigResolver {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `.env` file, process environment, built-in defaults.
    pub fn standard(env_file: &Path) -> Result<Self> {
        let mut resolver = Self::new();
        resolver.push(DotenvFileSource::load(env_file)?);
        resolver.push(ProcessEnvSource);
        resolver.push(MapSource::defaults());
        Ok(resolver)
    }

    pub fn push<S: ConfigSource + 'static>(&mut self, source: S) {
        self.sources.push(Box::new(source));
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| source.name().to_string())
            .collect()
    }

    pub fn resolve(&self, key: &str) -> Option<ResolvedValue> {
        self.resolve_any(&[key])
    }

    /// Walks sources in priority order; within a source, `keys` are tried in
    /// order, so an alias never beats the primary key of the same source.
    pub fn resolve_any(&self, keys: &[&str]) -> Option<ResolvedValue> {
        for source in &self.sources {
            for key in keys {
                let Some(value) = source.get(key) else {
                    continue;
                };
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                return Some(ResolvedValue {
                    key: (*key).to_string(),
                    value: value.to_string(),
                    source: source.name().to_string(),
                });
            }
        }
        None
    }
}

#[derive(Debug)]
pub struct Settings {
    pub api_key: Option<SecretString>,
    pub api_key_source: Option<String>,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Settings {
    pub fn resolve(resolver: &ConfigResolver) -> Result<Self> {
        let api_key = resolver.resolve_any(&[ENV_API_KEY, ENV_API_KEY_ALIAS]);
        let base_url = resolver
            .resolve(ENV_BASE_URL)
            .map(|row| row.value)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = resolver
            .resolve(ENV_MODEL)
            .map(|row| row.value)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout_secs = match resolver.resolve(ENV_TIMEOUT_SECS) {
            Some(row) => row
                .value
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .with_context(|| {
                    format!(
                        "{ENV_TIMEOUT_SECS} from {} must be a positive whole number of seconds, got `{}`",
                        row.source, row.value
                    )
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key_source: api_key
                .as_ref()
                .map(|row| format!("{} ({})", row.key, row.source)),
            api_key: api_key.map(|row| SecretString::from(row.value)),
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let env_file = env_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE));
        Self::resolve(&ConfigResolver::standard(&env_file)?)
    }
}
