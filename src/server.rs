use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::bus_parser::BusParser;
use crate::errors::{BusParserError, OutputError};
use crate::json::{to_json_vec, write_json_map};


pub struct AppState {
    pub bus_parser: Arc<dyn BusParser>,
    pub max_stops_per_request: usize,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct LiveDataQuery {
    pub stops: Option<String>,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);


fn error_response(status: StatusCode, error: String) -> HandlerError {
    (status, Json(ErrorResponse { error }))
}

fn bus_parser_error_response(e: BusParserError) -> HandlerError {
    let status = match &e {
        BusParserError::InvalidStopCode(_) => StatusCode::BAD_REQUEST,
        BusParserError::Fetching { .. }
            | BusParserError::Status { .. }
            | BusParserError::Markup { .. }
            | BusParserError::Decoding { .. } => StatusCode::BAD_GATEWAY,
    };
    warn!("live data request failed: {}", e);
    error_response(status, e.to_string())
}

fn output_error_response(e: OutputError) -> HandlerError {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn json_body(body: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}


pub fn make_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/livedata", get(get_live_data))
        .route("/livedata/{stop_code}", get(get_stop_live_data))
        .layer(cors)
        .with_state(state)
}


// GET /livedata/{stop_code}
pub async fn get_stop_live_data(
    State(state): State<Arc<AppState>>,
    Path(stop_code): Path<String>,
) -> Result<Response, HandlerError> {
    let mut stops = state.bus_parser
        .get_bus_stop_data(&[stop_code.clone()]).await
        .map_err(bus_parser_error_response)?;
    let departures = stops.remove(&stop_code)
        .ok_or_else(|| error_response(StatusCode::BAD_GATEWAY, format!("no data returned for stop {}", stop_code)))?;

    let body = to_json_vec(&departures)
        .map_err(output_error_response)?;
    info!("served stop {} with {} buses", stop_code, departures.bus_count());
    Ok(json_body(body))
}

// GET /livedata?stops=A,B,C
pub async fn get_live_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LiveDataQuery>,
) -> Result<Response, HandlerError> {
    let stops_param = query.stops
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "missing \"stops\" parameter".to_owned()))?;
    let stop_codes: Vec<String> = stops_param.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_owned())
        .collect();
    if stop_codes.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "no stop codes given".to_owned()));
    }
    if stop_codes.len() > state.max_stops_per_request {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("at most {} stop codes may be requested at once", state.max_stops_per_request),
        ));
    }

    let stops = state.bus_parser
        .get_bus_stop_data(&stop_codes).await
        .map_err(bus_parser_error_response)?;

    let mut body = Vec::new();
    write_json_map(&stops, &mut body)
        .map_err(output_error_response)?;
    info!("served {} stops", stops.len());
    Ok(json_body(body))
}
