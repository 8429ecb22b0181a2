use serde::{Deserialize, Serialize};


/// Live departures for one bus stop, as read off its departure board.
///
/// Field order is the order of the JSON keys.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopDepartures {
    pub stop_code: String,
    pub stop_name: String,
    pub services: Vec<BusServiceRecord>,
}

/// One service block on the board: a route header followed by its buses.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusServiceRecord {
    pub service_name: String,
    pub route: String,
    pub buses: Vec<BusArrival>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusArrival {
    pub destination: String,
    /// Free text as shown on the board ("DUE", "5", ...), not a duration.
    pub arrival_time: String,
    pub accessible: bool,
}

impl StopDepartures {
    pub fn bus_count(&self) -> usize {
        self.services.iter()
            .map(|s| s.buses.len())
            .sum()
    }
}
