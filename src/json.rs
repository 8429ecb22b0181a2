use std::collections::BTreeMap;
use std::io::Write;

use crate::errors::OutputError;
use crate::model::StopDepartures;


/// Writes the departures as compact JSON.
///
/// On error the sink may hold a partial document, which must be discarded.
pub fn write_json<W: Write>(data: &StopDepartures, out: W) -> Result<(), OutputError> {
    serde_json::to_writer(out, data)?;
    Ok(())
}

/// Writes a JSON object mapping each stop code to its departures document.
pub fn write_json_map<W: Write>(data: &BTreeMap<String, StopDepartures>, out: W) -> Result<(), OutputError> {
    serde_json::to_writer(out, data)?;
    Ok(())
}

pub fn to_json_vec(data: &StopDepartures) -> Result<Vec<u8>, OutputError> {
    let mut buf = Vec::new();
    write_json(data, &mut buf)?;
    Ok(buf)
}
