//! Belimo Actuator Dashboard API Server
//!
//! REST API over the polling, alarm and reading-log crates: valve control,
//! live monitoring with alarms, and historical analysis with CSV export.

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_governor::GovernorLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod config;
mod error;
mod pipeline;
pub mod rate_limit;
mod routes;
pub mod telemetry;

pub use config::DashboardConfig;
pub use error::ApiError;
pub use pipeline::{ingest, PollWarning};

use alerting::{AlarmConfig, AlarmManager};
use belimo_protocol::ModbusClient;
use poll_scheduler::{HealthMap, MonitorHandle, Poller, PollerConfig};
use storage::Repository;

/// Retained poll warnings
const MAX_WARNINGS: usize = 100;

/// Application state shared across handlers
pub struct AppState {
    /// Configuration the dashboard was started with
    pub config: DashboardConfig,
    /// Reading log
    pub repository: Repository,
    /// Alarm limits and state
    pub alarms: AlarmManager,
    /// Monitoring control
    pub monitor: MonitorHandle,
    /// Poll health by actuator
    pub health: HealthMap,
    /// Clients by actuator, used for write commands
    pub clients: HashMap<String, ModbusClient>,
    /// Recent poll failures, oldest first
    pub warnings: VecDeque<PollWarning>,
    /// Prometheus handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

/// State handle passed to handlers and the ingest task
pub type SharedState = Arc<RwLock<AppState>>;

impl AppState {
    /// Create application state and the poller it controls
    pub fn new(config: DashboardConfig) -> Result<(Self, Poller), ApiError> {
        config.validate()?;

        let clients: Vec<ModbusClient> = config
            .actuators
            .iter()
            .map(|endpoint| ModbusClient::new(endpoint.clone()).with_timeout(config.request_timeout()))
            .collect();

        let (poller, monitor) = Poller::new(
            clients.clone(),
            PollerConfig {
                interval: config.poll_interval(),
                max_consecutive_failures: config.max_consecutive_failures,
            },
        )?;

        let state = Self {
            repository: Repository::with_capacity(config.max_records),
            alarms: AlarmManager::new(AlarmConfig {
                history_capacity: config.alarm_history,
                ..Default::default()
            }),
            monitor,
            health: poller.health(),
            clients: clients
                .into_iter()
                .map(|c| (c.actuator().to_string(), c))
                .collect(),
            warnings: VecDeque::new(),
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            config,
        };
        Ok((state, poller))
    }

    /// Record a poll failure, keeping the most recent ones
    pub fn push_warning(&mut self, warning: PollWarning) {
        while self.warnings.len() >= MAX_WARNINGS {
            self.warnings.pop_front();
        }
        self.warnings.push_back(warning);
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    pub version: String,
    pub uptime_seconds: u64,
    pub monitoring: bool,
    pub reading_count: usize,
    pub active_alarms: usize,
    pub unhealthy_actuators: Vec<String>,
}

/// Create the application router
pub fn create_router(state: SharedState, rate_limit: &rate_limit::RateLimitConfig) -> Result<Router, ApiError> {
    let governor = rate_limit::create_governor_config(rate_limit)?;

    let commands = Router::new()
        .route("/api/v1/valves", post(routes::control::write_valves))
        .layer(GovernorLayer { config: governor });

    let router = Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/actuators", get(routes::control::list_actuators))
        .route("/api/v1/monitoring", get(routes::monitoring::get_state))
        .route("/api/v1/monitoring/start", post(routes::monitoring::start))
        .route("/api/v1/monitoring/stop", post(routes::monitoring::stop))
        .route("/api/v1/monitoring/selection", put(routes::monitoring::select))
        .route("/api/v1/alarms", get(routes::alarms::get_alarms))
        .route(
            "/api/v1/alarms/limits/:ip",
            get(routes::alarms::get_limits).put(routes::alarms::put_limits),
        )
        .route("/api/v1/alarms/acknowledge", post(routes::alarms::acknowledge))
        .route("/api/v1/readings/live", get(routes::readings::get_live))
        .route("/api/v1/readings", get(routes::readings::get_readings))
        .route("/api/v1/export/all.csv", get(routes::export::export_all))
        .route("/api/v1/export/filtered.csv", get(routes::export::export_filtered))
        .route("/metrics", get(routes::export::metrics))
        .merge(commands)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state);

    Ok(router)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let state = state.read().await;
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let mut unhealthy_actuators: Vec<String> = state
        .health
        .read()
        .map(|health| {
            health
                .iter()
                .filter(|(_, h)| !h.healthy)
                .map(|(id, _)| id.clone())
                .collect()
        })
        .unwrap_or_default();
    unhealthy_actuators.sort();

    let status = if unhealthy_actuators.is_empty() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        monitoring: state.monitor.state().running,
        reading_count: state.repository.len(),
        active_alarms: state.alarms.active().len(),
        unhealthy_actuators,
    })
}

/// Initialize logging
pub fn init_logging(level: &str, json: bool) -> Result<(), ApiError> {
    let level: Level = level
        .parse()
        .map_err(|_| ApiError::Logging(format!("unknown log level '{}'", level)))?;

    let result = if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
    };

    result.map_err(|e| ApiError::Logging(e.to_string()))
}

/// Spawn the poller and the ingest task feeding `state`
pub fn spawn_background(state: SharedState, poller: Poller) -> (JoinHandle<()>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);

    let poll_task = tokio::spawn(async move {
        if let Err(e) = poller.run(tx).await {
            tracing::error!("Poller failed: {}", e);
        }
    });
    let ingest_task = tokio::spawn(ingest(state, rx));

    (poll_task, ingest_task)
}

/// Serve the router on a bound listener
pub async fn serve(listener: TcpListener, router: Router) -> Result<(), ApiError> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

/// Run the dashboard until ctrl-c
pub async fn run(config: DashboardConfig) -> Result<(), ApiError> {
    let addr = config.listen_addr.clone();
    let rate_limit = config.rate_limit.clone();

    let (mut app_state, poller) = AppState::new(config)?;
    app_state.metrics = Some(telemetry::install_recorder()?);
    let state = Arc::new(RwLock::new(app_state));

    let (poll_task, ingest_task) = spawn_background(state.clone(), poller);
    let router = create_router(state, &rate_limit)?;

    info!("Starting API server on {}", addr);
    let listener = TcpListener::bind(&addr).await?;

    tokio::select! {
        result = serve(listener, router) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    poll_task.abort();
    ingest_task.abort();
    Ok(())
}
