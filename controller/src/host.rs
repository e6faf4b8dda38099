use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{info, warn};

use icebox_common::{CoolerEngine, RuntimeConfig, SensorError};

use crate::{
    io::{LoggingRelay, RelayOutput, SimulatedCoolerSensor, TemperatureSensor},
    page,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<Mutex<CoolerEngine>>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = RuntimeConfig::default();
    let engine = CoolerEngine::new(runtime.control.clone(), monotonic_ms());
    let poll_interval_ms = engine.config.poll_interval_ms;

    let app_state = AppState {
        engine: Arc::new(Mutex::new(engine)),
    };

    spawn_control_loop(
        app_state.clone(),
        SimulatedCoolerSensor::new(),
        LoggingRelay,
        poll_interval_ms,
    );

    let app = Router::new()
        .route("/", get(handle_get_index))
        .route("/api/status", get(handle_get_status))
        .with_state(app_state);

    let port = std::env::var("ICEBOX_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.http_port);
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse().unwrap();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status server at {addr}"))?;

    info!("cooler controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_control_loop<S, R>(app_state: AppState, mut sensor: S, mut relay: R, poll_interval_ms: u64)
where
    S: TemperatureSensor + Send + 'static,
    R: RelayOutput + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(poll_interval_ms));

        loop {
            interval.tick().await;
            let now_ms = monotonic_ms();

            // Read before taking the lock so a slow sensor never stalls the
            // status handlers.
            let reading = sensor.read_temperature();

            let mut engine = app_state.engine.lock().await;
            match reading {
                Ok(temp_c) if engine.config.is_plausible(temp_c) => {
                    if let Some(state) = engine.record_sample(temp_c, now_ms) {
                        info!(
                            "average {:.2} degC, relay {}",
                            engine.average_temp_c(),
                            state.as_str()
                        );
                        relay.set_output(state.is_on());
                    }
                }
                Ok(temp_c) => {
                    warn!("skipping cycle: {}", SensorError::OutOfRange(temp_c));
                    engine.record_read_failure();
                }
                Err(err) => {
                    warn!("skipping cycle: {err}");
                    engine.record_read_failure();
                }
            }
        }
    });
}

async fn handle_get_index(State(state): State<AppState>) -> Html<String> {
    let status = state.engine.lock().await.status(monotonic_ms());
    Html(page::render_status_page(&status))
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.engine.lock().await.status(monotonic_ms());
    Json(status)
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
