use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::client::{Query, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use crate::error::{CollectError, StorageError};
use crate::retry::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_DELAY};
use crate::store::{DatabaseUrl, Destination, DEFAULT_CSV_PATH};

pub const DEFAULT_CONFIG_FILE: &str = "hh_collector.toml";
pub const ENV_PREFIX: &str = "HH";

/// Storage selector as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    None,
    Csv,
    #[serde(alias = "postgres", alias = "sqlite")]
    Db,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    pub attempts: u32,
    pub delay_secs: f64,
}

/// Resolved run configuration. Built once, never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub user_agent: String,
    /// Per-request timeout; unset keeps the HTTP client's default.
    pub timeout_secs: Option<u64>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub query: BTreeMap<String, Vec<String>>,
    pub store: StoreKind,
    pub output: PathBuf,
    pub database_url: Option<String>,
    pub retry: RetrySettings,
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub store: Option<StoreKind>,
    pub output: Option<PathBuf>,
    pub database_url: Option<String>,
    pub params: Vec<(String, String)>,
}

impl Overrides {
    /// Source for reading back a stored dataset. A CSV path wins over a
    /// database URL; with neither, the configured store is used.
    pub fn read_source(csv: Option<PathBuf>, database_url: Option<String>) -> Self {
        let store = if csv.is_some() {
            Some(StoreKind::Csv)
        } else if database_url.is_some() {
            Some(StoreKind::Db)
        } else {
            None
        };
        Overrides {
            store,
            output: csv,
            database_url,
            params: Vec::new(),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file (`hh_collector.toml` unless `file` is
    /// given; a given file must exist), then `HH_*` environment variables.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        Self::builder()?
            .add_source(file_source)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .set_default("store", "none")?
            .set_default("output", DEFAULT_CSV_PATH)?
            .set_default("retry.attempts", DEFAULT_ATTEMPTS)?
            .set_default("retry.delay_secs", DEFAULT_DELAY.as_secs_f64())
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(store) = overrides.store {
            self.store = store;
        }
        if let Some(output) = overrides.output {
            self.output = output;
        }
        if overrides.database_url.is_some() {
            self.database_url = overrides.database_url;
        }
        for (k, v) in overrides.params {
            self.query.entry(k).or_default().push(v);
        }
        self
    }

    pub fn query(&self) -> Query {
        Query::from_params(&self.query)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, CollectError> {
        let delay = Duration::try_from_secs_f64(self.retry.delay_secs).map_err(|_| {
            CollectError::Config(format!(
                "retry.delay_secs must be a finite, non-negative number of seconds, got {}",
                self.retry.delay_secs
            ))
        })?;
        Ok(RetryPolicy::new(self.retry.attempts, delay))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn destination(&self) -> Result<Destination, StorageError> {
        Ok(match self.store {
            StoreKind::None => Destination::None,
            StoreKind::Csv => Destination::FlatFile(self.output.clone()),
            StoreKind::Db => Destination::Relational(self.database_url()?),
        })
    }

    pub fn database_url(&self) -> Result<DatabaseUrl, StorageError> {
        self.database_url
            .as_deref()
            .ok_or(StorageError::MissingDatabaseUrl)?
            .parse()
    }
}

/// `text = "rust"`, `per_page = 100` and `area = ["1", 2]` are all accepted
/// in `[query]`; numbers are sent as their decimal text.
fn one_or_many<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(i64),
        Flag(bool),
    }

    impl Scalar {
        fn into_string(self) -> String {
            match self {
                Scalar::Text(s) => s,
                Scalar::Number(n) => n.to_string(),
                Scalar::Flag(b) => b.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Values {
        One(Scalar),
        Many(Vec<Scalar>),
    }

    let raw = BTreeMap::<String, Values>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(k, v)| match v {
            Values::One(s) => (k, vec![s.into_string()]),
            Values::Many(list) => (k, list.into_iter().map(Scalar::into_string).collect()),
        })
        .collect())
}

/// Split a `key=value` command-line parameter.
pub fn parse_param(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", s))?;
    if k.trim().is_empty() {
        return Err(format!("empty parameter name in `{}`", s));
    }
    Ok((k.trim().to_string(), v.to_string()))
}
