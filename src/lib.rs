pub mod bus_parser;
pub mod config;
pub mod errors;
pub mod json;
pub mod markup;
pub mod model;
pub mod parser;
pub mod server;


pub use crate::bus_parser::BusParser;
pub use crate::errors::{MalformedInputError, OutputError};
pub use crate::json::write_json;
pub use crate::markup::MarkupMode;
pub use crate::model::{BusArrival, BusServiceRecord, StopDepartures};
pub use crate::parser::{parse_departures, DeparturesParser, ParserOptions, TagNames};
