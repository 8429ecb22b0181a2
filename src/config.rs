use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::parser::ParserOptions;


#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Config {
    #[serde(default = "Config::default_listen_address")]
    pub listen_address: String,

    #[serde(default = "Config::default_max_stops_per_request")]
    pub max_stops_per_request: usize,

    pub source: SourceConfig,

    #[serde(default)]
    pub markup: ParserOptions,
}
impl Config {
    fn default_listen_address() -> String { "0.0.0.0:3030".to_owned() }
    fn default_max_stops_per_request() -> usize { 10 }
}


#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Scrape the upstream departure board.
    #[default]
    DeparturesPage,

    /// Read the JSON served by another instance of this service.
    LiveDataJson,
}


#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// URL of one stop's data; `{stopCode}` is replaced by the stop code.
    pub url_format: String,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "SourceConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}
impl SourceConfig {
    fn default_timeout_secs() -> u64 { 10 }
}


pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let file = File::open(path)
        .map_err(ConfigError::OpeningFile)?;
    let config: Config = serde_json::from_reader(file)
        .map_err(ConfigError::Loading)?;
    Ok(config)
}
