use std::{env, error::Error, fmt::Display, path::PathBuf};

use dotenvy::dotenv;
use serde::{Deserialize, Serialize};

const DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Clone)]
pub enum ConfigError {
    DbUrlNotFound,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::DbUrlNotFound => write!(
                f,
                "Database URL not found, please set the {DATABASE_URL} environment variable."
            ),
        }
    }
}

impl Error for ConfigError {}

/// Which emitter turns the enriched descriptions into output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Emitter {
    Json,
    Typescript,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuerySource {
    Single(PathBuf),
    List(Vec<PathBuf>),
}

/// The on-disk `pgbind.toml` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[must_use]
pub struct TomlConfig {
    path: QuerySource,
    target: PathBuf,
    mode: Emitter,
}

#[derive(Debug, Clone)]
pub struct PgbindConfig {
    pub source: Vec<PathBuf>,
    pub target: PathBuf,
    pub mode: Emitter,
}

impl From<TomlConfig> for PgbindConfig {
    fn from(config: TomlConfig) -> Self {
        let source = match config.path {
            QuerySource::Single(item) => vec![item],
            QuerySource::List(items) => items,
        };
        Self {
            source,
            target: config.target,
            mode: config.mode,
        }
    }
}

pub fn db_url() -> Result<String, ConfigError> {
    // A missing .env file is fine; the variable may come from the
    // environment itself.
    dotenv().ok();
    env::var(DATABASE_URL).map_err(|_| ConfigError::DbUrlNotFound)
}

#[cfg(test)]
mod tests {
    use super::{PgbindConfig, TomlConfig};

    #[test]
    fn single_and_list_sources_parse() {
        let config: TomlConfig = toml::from_str(
            "path = \"queries\"\ntarget = \"out.json\"\nmode = \"json\"\n",
        )
        .unwrap();
        let config = PgbindConfig::from(config);
        assert_eq!(config.source.len(), 1);

        let config: TomlConfig = toml::from_str(
            "path = [\"a\", \"b\"]\ntarget = \"out.ts\"\nmode = \"typescript\"\n",
        )
        .unwrap();
        let config = PgbindConfig::from(config);
        assert_eq!(config.source.len(), 2);
    }
}
