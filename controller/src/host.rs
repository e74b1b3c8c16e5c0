use std::{
    fmt::Write as _,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Offset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::{
    net::{TcpListener, UdpSocket},
    sync::{mpsc, Mutex},
};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use wol_common::{
    render_message, Appliance, ApplianceConfig, BroadcastAction, Button, ClockReading,
    DeviceRegistry, Sweep, WolError,
};

use crate::terminal::{spawn_button_reader, TerminalCanvas};

const CONTROL_PERIOD: Duration = Duration::from_millis(100);
const DEFAULT_CONFIG_PATH: &str = "./wol.json";

#[derive(Clone)]
struct AppState {
    appliance: Arc<Mutex<Appliance>>,
    socket: Arc<UdpSocket>,
    clock: Arc<HostClock>,
    token_sha256: Option<Arc<str>>,
}

/// Wall clock in the configured zone, held back for a while after boot to
/// stand in for the network time source coming up.
#[derive(Debug)]
struct HostClock {
    timezone: Tz,
    sync_delay_ms: u64,
}

impl HostClock {
    fn reading(&self) -> ClockReading {
        self.reading_at(monotonic_ms())
    }

    fn reading_at(&self, uptime_ms: u64) -> ClockReading {
        if uptime_ms < self.sync_delay_ms {
            return ClockReading::unsynchronized(uptime_ms);
        }
        ClockReading::synchronized(uptime_ms, now_in_timezone(&self.timezone))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct WakeRequest {
    mac: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
struct SweepReport {
    sent: usize,
    failures: Vec<String>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("WOL_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut canvas = TerminalCanvas::default();
    let (config, timezone) = match load_config(&config_path).await {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("configuration error: {err:#}");
            render_message(&mut canvas, "Config error", &format!("{err:#}"));
            return Err(err);
        }
    };

    let (registry, rejected) = DeviceRegistry::load(&config.devices);
    for err in &rejected {
        warn!("skipping device entry: {err}");
    }
    info!("loaded {} wake targets", registry.count());

    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .context("failed to bind WOL socket")?;
    socket
        .set_broadcast(true)
        .context("failed to enable broadcast on WOL socket")?;

    let sync_delay_secs = std::env::var("WOL_CLOCK_SYNC_DELAY_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0);
    let clock = HostClock {
        timezone,
        sync_delay_ms: sync_delay_secs.saturating_mul(1_000),
    };

    let mut appliance = Appliance::new(&config, registry)?;
    let now = clock.reading();
    appliance.start(&now);
    appliance.render(&now, &mut canvas);
    info!(
        "first sweep in {}s, then every {}s to {}",
        config.wol.startup_delay_secs,
        config.wol.repeat_interval_secs,
        config.wol.target()
    );

    let app_state = AppState {
        appliance: Arc::new(Mutex::new(appliance)),
        socket: Arc::new(socket),
        clock: Arc::new(clock),
        token_sha256: config.web.token_sha256.as_deref().map(Arc::from),
    };

    spawn_control_loop(app_state.clone(), spawn_button_reader(), canvas);

    if !config.web.enabled {
        info!("web front end disabled");
        tokio::signal::ctrl_c()
            .await
            .context("failed to wait for shutdown signal")?;
        return Ok(());
    }

    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route("/api/devices", get(handle_get_devices))
        .route("/api/wake", post(handle_wake))
        .route("/api/wake-all", post(handle_wake_all))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_token,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let port = std::env::var("WOL_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.web.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web server at {addr}"))?;

    info!("web front end listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

async fn load_config(path: &Path) -> anyhow::Result<(ApplianceConfig, Tz)> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = ApplianceConfig::from_json(&raw)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    let timezone = config
        .timezone
        .parse::<Tz>()
        .map_err(|err| anyhow!("unknown timezone {:?}: {err}", config.timezone))?;
    Ok((config, timezone))
}

fn spawn_control_loop(
    app_state: AppState,
    mut buttons: mpsc::UnboundedReceiver<Button>,
    mut canvas: TerminalCanvas,
) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CONTROL_PERIOD);
        let mut pressed = Vec::new();

        loop {
            interval.tick().await;

            pressed.clear();
            while let Ok(button) = buttons.try_recv() {
                pressed.push(button);
            }

            let now = app_state.clock.reading();
            let outcome = {
                let mut appliance = app_state.appliance.lock().await;
                let outcome = appliance.poll(&now, &pressed);
                if outcome.redraw {
                    appliance.render(&now, &mut canvas);
                }
                outcome
            };

            for sweep in outcome.sweeps {
                let report = execute_sweep(&app_state.socket, sweep).await;
                if !report.failures.is_empty() {
                    warn!(
                        "sweep finished with {} sent, {} failed",
                        report.sent,
                        report.failures.len()
                    );
                }
            }
        }
    });
}

/// Runs a sweep to completion. Failed sends are reported and skipped.
async fn execute_sweep(socket: &UdpSocket, sweep: Sweep) -> SweepReport {
    let trigger = sweep.trigger;
    let mut report = SweepReport::default();

    for action in sweep.actions {
        match action {
            BroadcastAction::Delay(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            BroadcastAction::Send {
                device,
                packet,
                target,
            } => match socket.send_to(packet.as_bytes(), target).await {
                Ok(_) => {
                    info!(?trigger, "sent WOL to {} ({}) via {target}", device.name, device.mac);
                    report.sent += 1;
                }
                Err(err) => {
                    let failure = WolError::SendFailure {
                        mac: device.mac,
                        reason: err.to_string(),
                    };
                    warn!(?trigger, "{failure}");
                    report.failures.push(failure.to_string());
                }
            },
        }
    }

    report
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.token_sha256.as_deref() else {
        return next.run(request).await;
    };

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token_matches(token, expected));

    if !authorized {
        debug!("rejecting request to {}", request.uri());
        return error_response(StatusCode::UNAUTHORIZED, "Missing or invalid bearer token");
    }
    next.run(request).await
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.clock.reading();
    let status = state.appliance.lock().await.status(&now);
    Json(status)
}

async fn handle_get_devices(State(state): State<AppState>) -> impl IntoResponse {
    let devices = state.appliance.lock().await.registry().all().to_vec();
    Json(devices)
}

async fn handle_wake(
    State(state): State<AppState>,
    Json(request): Json<WakeRequest>,
) -> Response {
    let sweep = {
        let mut appliance = state.appliance.lock().await;
        appliance.wake_device(request.name.as_deref(), &request.mac)
    };

    match sweep {
        Ok(sweep) => report_response(execute_sweep(&state.socket, sweep).await),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn handle_wake_all(State(state): State<AppState>) -> Response {
    let now = state.clock.reading();
    let sweep = state.appliance.lock().await.wake_now(&now);
    report_response(execute_sweep(&state.socket, sweep).await)
}

fn report_response(report: SweepReport) -> Response {
    let status = if report.failures.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(report)).into_response()
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

fn token_matches(token: &str, expected_sha256: &str) -> bool {
    sha256_hex(token.trim()) == expected_sha256.trim().to_ascii_lowercase()
}

fn now_in_timezone(timezone: &Tz) -> chrono::DateTime<chrono::FixedOffset> {
    let local = Utc::now().with_timezone(timezone);
    local.with_timezone(&local.offset().fix())
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
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
