use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use livebus::bus_parser::make_bus_parser;
use livebus::config::load_config;
use livebus::errors::GeneralError;
use livebus::server::{make_router, AppState};


async fn run() -> Result<(), GeneralError> {
    // set up tracing
    let (stderr_non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(stderr_non_blocking)
        .init();

    // get config path and load config
    let args_os: Vec<OsString> = std::env::args_os().collect();
    let config_path = match args_os.get(1) {
        Some(cp) => PathBuf::from(cp),
        None => PathBuf::from("config.json"),
    };
    let config = load_config(&config_path)?;

    let bus_parser = make_bus_parser(&config.source, &config.markup)
        .map_err(GeneralError::HttpClient)?;
    let state = Arc::new(AppState {
        bus_parser: Arc::from(bus_parser),
        max_stops_per_request: config.max_stops_per_request,
    });
    let app = make_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    info!("serving live departures on {}", config.listen_address);
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let result = run().await;

    std::process::exit(
        match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{}", e);
                1
            },
        }
    )
}
