use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::OnceLock,
    thread,
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::{net::TcpListener, runtime::Handle, sync::mpsc::error::TrySendError};
use tracing::{info, warn};

use ac_remote_common::{
    parse_code, Button, ButtonLevels, ControllerConfig, IrFrame, IrProtocol, StatusView,
};

use crate::{
    board::{host_board, BoardHandle, HostBoard, HostLink},
    control::Controller,
    ir::IrDiagnostics,
    mqtt::{mqtt_options, MqttSession},
};

const DEFAULT_CONFIG_PATH: &str = "./ac-controller.json";

#[derive(Clone)]
struct AppState {
    board: BoardHandle,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    display: StatusView,
    ir: IrDiagnostics,
}

#[derive(Debug, Serialize)]
struct ButtonsAccepted {
    pressed: Vec<&'static str>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("AC_CONTROLLER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = load_config(&config_path).await?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
        .validate()
        .with_context(|| format!("invalid controller configuration ({})", config_path.display()))?;

    let (board, handle) = host_board();
    let link = HostLink::new(&config.network.wifi_ssid);
    let broker = MqttSession::new(mqtt_options(&config), Handle::current());
    let controller = Controller::new(&config, board, link, broker, monotonic_ms())
        .context("failed to initialise controller")?;
    spawn_control_loop(controller, Duration::from_millis(config.timing.loop_interval_ms))?;

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/buttons", post(handle_set_buttons))
        .route("/api/ir", post(handle_inject_ir))
        .with_state(AppState { board: handle });

    let port = std::env::var("CONTROLLER_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind controller server at {addr}"))?;

    info!("controller listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<ControllerConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<ControllerConfig>(&raw)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!("no config at {}, using defaults and environment", path.display());
            Ok(ControllerConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn apply_env_overrides(config: &mut ControllerConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(device_id) = lookup("AC_DEVICE_ID") {
        config.device_id = device_id;
    }
    let network = &mut config.network;
    if let Some(ssid) = lookup("WIFI_SSID") {
        network.wifi_ssid = ssid;
    }
    if let Some(pass) = lookup("WIFI_PASS") {
        network.wifi_pass = pass;
    }
    if let Some(host) = lookup("MQTT_HOST") {
        network.mqtt_host = host;
    }
    if let Some(port) = lookup("MQTT_PORT") {
        match port.parse::<u16>() {
            Ok(port) => network.mqtt_port = port,
            Err(_) => warn!("ignoring MQTT_PORT={port}: not a port number"),
        }
    }
    if let Some(user) = lookup("MQTT_USER") {
        network.mqtt_user = user;
    }
    if let Some(pass) = lookup("MQTT_PASS") {
        network.mqtt_pass = pass;
    }
}

fn spawn_control_loop(
    mut controller: Controller<HostBoard, HostLink, MqttSession>,
    interval: Duration,
) -> anyhow::Result<()> {
    thread::Builder::new()
        .name("control-loop".into())
        .spawn(move || loop {
            controller.step(monotonic_ms());
            thread::sleep(interval);
        })
        .context("failed to spawn control loop thread")?;
    Ok(())
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let Some(display) = state.board.status() else {
        return error_response(StatusCode::SERVICE_UNAVAILABLE, "Controller has not rendered yet");
    };
    Json(StatusResponse {
        display,
        ir: state.board.diagnostics(),
    })
    .into_response()
}

async fn handle_set_buttons(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let raw = params.get("pressed").map(String::as_str).unwrap_or("");
    let buttons = match parse_pressed(raw) {
        Ok(buttons) => buttons,
        Err(name) => {
            return error_response(StatusCode::BAD_REQUEST, &format!("Unknown button '{name}'"))
        }
    };

    let levels = buttons
        .iter()
        .fold(ButtonLevels::released(), |levels, button| levels.with(*button));
    state.board.set_buttons(levels);

    let pressed = Button::PRIORITY
        .into_iter()
        .filter(|button| levels.is_pressed(*button))
        .map(Button::name)
        .collect();
    Json(ButtonsAccepted { pressed }).into_response()
}

async fn handle_inject_ir(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(raw) = params.get("code") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'code' parameter");
    };
    let Ok(value) = parse_code(raw) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid IR code");
    };
    let protocol = match params.get("protocol").map(String::as_str) {
        None | Some("nec") => IrProtocol::Nec,
        Some("unknown") => IrProtocol::Unknown,
        Some(_) => return error_response(StatusCode::BAD_REQUEST, "Unsupported protocol"),
    };

    match state.board.inject_ir(IrFrame { protocol, value }) {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(TrySendError::Full(_)) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "IR receive queue is full")
        }
        Err(TrySendError::Closed(_)) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Control loop is not running")
        }
    }
}

/// Comma separated button names; empty means everything released.
fn parse_pressed(raw: &str) -> Result<Vec<Button>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| Button::from_name(name).ok_or_else(|| name.to_string()))
        .collect()
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub(crate) fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
