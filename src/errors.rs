use std::error;
use std::fmt;
use std::io;
use std::str::Utf8Error;


/// The markup could not be turned into a start/text/end event stream.
#[derive(Debug)]
pub enum MalformedInputError {
    Encoding(Utf8Error),
    Markup(Vec<String>),
}
impl fmt::Display for MalformedInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding(e)
                => write!(f, "markup is not valid UTF-8: {}", e),
            Self::Markup(messages)
                => write!(f, "markup is not well-formed: {}", messages.join("; ")),
        }
    }
}
impl error::Error for MalformedInputError {
}
impl From<Utf8Error> for MalformedInputError {
    fn from(e: Utf8Error) -> Self {
        Self::Encoding(e)
    }
}


/// Writing JSON to the output sink failed; anything already written is garbage.
#[derive(Debug)]
pub struct OutputError(pub io::Error);
impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error writing JSON output: {}", self.0)
    }
}
impl error::Error for OutputError {
}
impl From<io::Error> for OutputError {
    fn from(e: io::Error) -> Self {
        Self(e)
    }
}
impl From<serde_json::Error> for OutputError {
    fn from(e: serde_json::Error) -> Self {
        Self(io::Error::from(e))
    }
}


#[derive(Debug)]
pub enum BusParserError {
    InvalidStopCode(String),
    Fetching { url: String, error: reqwest::Error },
    Status { url: String, status: u16 },
    Markup { stop_code: String, error: MalformedInputError },
    Decoding { stop_code: String, error: serde_json::Error },
}
impl fmt::Display for BusParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStopCode(code)
                => write!(f, "invalid stop code {:?}", code),
            Self::Fetching { url, error }
                => write!(f, "error fetching {:?}: {}", url, error),
            Self::Status { url, status }
                => write!(f, "{:?} responded with status {}", url, status),
            Self::Markup { stop_code, error }
                => write!(f, "error parsing departures of stop {}: {}", stop_code, error),
            Self::Decoding { stop_code, error }
                => write!(f, "error decoding live data of stop {}: {}", stop_code, error),
        }
    }
}
impl error::Error for BusParserError {
}


#[derive(Debug)]
pub enum ConfigError {
    OpeningFile(io::Error),
    Loading(serde_json::Error),
}
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpeningFile(e)
                => write!(f, "error opening config file: {}", e),
            Self::Loading(e)
                => write!(f, "error loading configuration: {}", e),
        }
    }
}
impl error::Error for ConfigError {
}


#[derive(Debug)]
pub enum GeneralError {
    Config(ConfigError),
    HttpClient(reqwest::Error),
    Io(io::Error),
}
impl fmt::Display for GeneralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e)
                => write!(f, "{}", e),
            Self::HttpClient(e)
                => write!(f, "error setting up HTTP client: {}", e),
            Self::Io(e)
                => write!(f, "{}", e),
        }
    }
}
impl error::Error for GeneralError {
}
impl From<ConfigError> for GeneralError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
impl From<io::Error> for GeneralError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
