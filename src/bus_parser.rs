//! Sources of live departures for a list of stops.


use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, error};

use crate::config::{SourceConfig, SourceKind};
use crate::errors::BusParserError;
use crate::model::StopDepartures;
use crate::parser::{parse_departures, ParserOptions};


static STOP_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[0-9]{8}$").expect("failed to compile stop code regex"));
const STOP_CODE_PLACEHOLDER: &str = "{stopCode}";


pub fn is_valid_stop_code(stop_code: &str) -> bool {
    STOP_CODE_RE.is_match(stop_code)
}

pub fn stop_url(url_format: &str, stop_code: &str) -> String {
    url_format.replace(STOP_CODE_PLACEHOLDER, stop_code)
}


/// Fetches live departures for bus stops.
#[async_trait]
pub trait BusParser: Send + Sync {
    /// Obtains the departures of a single stop whose code is already known
    /// to be valid.
    async fn get_stop(&self, stop_code: &str) -> Result<StopDepartures, BusParserError>;

    /// Obtains the departures of each of the given stops, keyed by stop code.
    ///
    /// All stop codes are validated before anything is fetched. Duplicates
    /// are fetched once.
    async fn get_bus_stop_data(&self, stop_codes: &[String]) -> Result<BTreeMap<String, StopDepartures>, BusParserError> {
        let mut unique_codes = BTreeSet::new();
        for stop_code in stop_codes {
            if !is_valid_stop_code(stop_code) {
                return Err(BusParserError::InvalidStopCode(stop_code.clone()));
            }
            unique_codes.insert(stop_code.as_str());
        }

        let mut stops = BTreeMap::new();
        for stop_code in unique_codes {
            let departures = self.get_stop(stop_code).await?;
            stops.insert(stop_code.to_owned(), departures);
        }
        Ok(stops)
    }
}


#[derive(Clone, Debug)]
struct PageFetcher {
    client: reqwest::Client,
    url_format: String,
}
impl PageFetcher {
    fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs));
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            url_format: config.url_format.clone(),
        })
    }

    async fn fetch(&self, stop_code: &str) -> Result<Vec<u8>, BusParserError> {
        let url = stop_url(&self.url_format, stop_code);
        debug!("fetching {:?}", url);

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                error!("failed to send request to {:?}: {}", url, e);
                return Err(BusParserError::Fetching { url, error: e });
            },
        };
        let status = response.status();
        if !status.is_success() {
            error!("{:?} responded with {}", url, status);
            return Err(BusParserError::Status { url, status: status.as_u16() });
        }
        match response.bytes().await {
            Ok(b) => Ok(b.to_vec()),
            Err(e) => {
                error!("failed to obtain bytes of {:?}: {}", url, e);
                Err(BusParserError::Fetching { url, error: e })
            },
        }
    }
}


/// Scrapes the upstream live departure board of each stop.
#[derive(Clone, Debug)]
pub struct DeparturesPageSource {
    fetcher: PageFetcher,
    options: ParserOptions,
}
impl DeparturesPageSource {
    pub fn new(config: &SourceConfig, options: ParserOptions) -> Result<Self, reqwest::Error> {
        let fetcher = PageFetcher::new(config)?;
        Ok(Self {
            fetcher,
            options,
        })
    }
}
#[async_trait]
impl BusParser for DeparturesPageSource {
    async fn get_stop(&self, stop_code: &str) -> Result<StopDepartures, BusParserError> {
        let page = self.fetcher.fetch(stop_code).await?;
        parse_departures(&page, &self.options)
            .map_err(|error| BusParserError::Markup { stop_code: stop_code.to_owned(), error })
    }
}


/// Reads departures already converted to JSON by another instance.
#[derive(Clone, Debug)]
pub struct LiveDataJsonSource {
    fetcher: PageFetcher,
}
impl LiveDataJsonSource {
    pub fn new(config: &SourceConfig) -> Result<Self, reqwest::Error> {
        let fetcher = PageFetcher::new(config)?;
        Ok(Self {
            fetcher,
        })
    }
}
#[async_trait]
impl BusParser for LiveDataJsonSource {
    async fn get_stop(&self, stop_code: &str) -> Result<StopDepartures, BusParserError> {
        let body = self.fetcher.fetch(stop_code).await?;
        decode_live_data(stop_code, &body)
    }
}

pub fn decode_live_data(stop_code: &str, body: &[u8]) -> Result<StopDepartures, BusParserError> {
    serde_json::from_slice(body)
        .map_err(|error| BusParserError::Decoding { stop_code: stop_code.to_owned(), error })
}


pub fn make_bus_parser(config: &SourceConfig, options: &ParserOptions) -> Result<Box<dyn BusParser>, reqwest::Error> {
    let bus_parser: Box<dyn BusParser> = match config.kind {
        SourceKind::DeparturesPage => Box::new(DeparturesPageSource::new(config, options.clone())?),
        SourceKind::LiveDataJson => Box::new(LiveDataJsonSource::new(config)?),
    };
    Ok(bus_parser)
}
