use anyhow::{Context, Result};
use facemark_core::MatchConfig;
use std::path::{Path, PathBuf};

/// CLI configuration, loaded from environment variables.
#[derive(Debug)]
pub struct Config {
    /// Path to the SQLite face store.
    pub db_path: PathBuf,
    /// Thresholds and metric weights handed to the engine.
    pub matching: MatchConfig,
}

impl Config {
    /// Load configuration from `FACEMARK_*` environment variables with defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// `FACEMARK_CONFIG` names an optional TOML file for the matching
    /// policy; the threshold variables override whatever it sets.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("facemark");

        let db_path = var("FACEMARK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("faces.db"));

        let mut matching = match var("FACEMARK_CONFIG") {
            Some(path) => MatchConfig::load(Path::new(&path))
                .with_context(|| format!("loading matching config from {path}"))?,
            None => MatchConfig::default(),
        };
        matching.duplicate_threshold = parse_or(
            &var,
            "FACEMARK_DUPLICATE_THRESHOLD",
            matching.duplicate_threshold,
        );
        matching.match_threshold =
            parse_or(&var, "FACEMARK_MATCH_THRESHOLD", matching.match_threshold);
        matching
            .validate()
            .context("invalid threshold override in environment")?;

        Ok(Self { db_path, matching })
    }
}

fn parse_or<F>(var: &F, key: &str, default: f32) -> f32
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "ignoring unparsable value");
            default
        }),
        None => default,
    }
}
