use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{error, info};

use crate::{
    engine::{CommandRejection, EngineBuilder},
    modifiers::{Difficulty, Modifiers, Policy},
    scheduler::{self, CommandReply, SchedulerClosed, SchedulerHandle},
    snapshot::SimulationSnapshot,
    world::RegionId,
};

pub struct WebServerConfig {
    pub builder: EngineBuilder,
    pub tick_interval: Duration,
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Serialize)]
pub struct DifficultyInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub modifiers: Modifiers,
}

#[derive(Clone, Serialize)]
pub struct CatalogResponse {
    pub policies: Vec<Policy>,
    pub difficulties: Vec<DifficultyInfo>,
}

#[derive(Serialize)]
pub struct CommandResponse {
    pub accepted: bool,
    pub reason: Option<String>,
    pub snapshot: SimulationSnapshot,
}

impl From<CommandReply> for CommandResponse {
    fn from(reply: CommandReply) -> Self {
        Self {
            accepted: reply.result.is_ok(),
            reason: reply.result.err().map(|rejection| rejection.to_string()),
            snapshot: reply.snapshot.as_ref().clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct StartRequest {
    pub region: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
}

fn default_difficulty() -> String {
    Difficulty::default().key().to_string()
}

struct AppState {
    scheduler: SchedulerHandle,
    catalog: CatalogResponse,
}

pub async fn run(config: WebServerConfig) -> Result<()> {
    let WebServerConfig {
        builder,
        tick_interval,
        host,
        port,
    } = config;

    let catalog = CatalogResponse {
        policies: builder.settings().policies.iter().cloned().collect(),
        difficulties: Difficulty::ALL
            .into_iter()
            .map(|difficulty| DifficultyInfo {
                key: difficulty.key(),
                label: difficulty.label(),
                modifiers: difficulty.resolve(),
            })
            .collect(),
    };
    let run_name = builder.settings().run_name.clone();
    let (scheduler, scheduler_task) = scheduler::spawn(builder, tick_interval);
    let state = Arc::new(AppState { scheduler, catalog });

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, run = %run_name, "server.listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last handle; the scheduler winds down on its own.
    if let Err(err) = scheduler_task.await {
        error!(?err, "scheduler task failed");
    }
    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/state", get(latest_state))
        .route("/api/events", get(stream_events))
        .route("/api/catalog", get(catalog))
        .route("/api/start", post(start_infection))
        .route("/api/policies/:id", post(purchase_policy))
        .route("/api/restart", post(restart))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("server.shutdown");
}

struct AppError(SchedulerClosed);

impl From<SchedulerClosed> for AppError {
    fn from(value: SchedulerClosed) -> Self {
        AppError(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()).into_response()
    }
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<SimulationSnapshot> {
    Json(state.scheduler.latest().as_ref().clone())
}

async fn catalog(State(state): State<Arc<AppState>>) -> Json<CatalogResponse> {
    Json(state.catalog.clone())
}

async fn start_infection(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    let difficulty = match request.difficulty.parse::<Difficulty>() {
        Ok(difficulty) => difficulty,
        Err(rejection) => return Ok(Json(declined(&state, rejection))),
    };
    let reply = state
        .scheduler
        .start_infection(RegionId::new(request.region), difficulty)
        .await?;
    Ok(Json(reply.into()))
}

async fn purchase_policy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CommandResponse>, AppError> {
    let reply = state.scheduler.purchase_policy(id).await?;
    Ok(Json(reply.into()))
}

async fn restart(State(state): State<Arc<AppState>>) -> Result<Json<SimulationSnapshot>, AppError> {
    let snapshot = state.scheduler.restart().await?;
    Ok(Json(snapshot.as_ref().clone()))
}

fn declined(state: &AppState, rejection: CommandRejection) -> CommandResponse {
    CommandResponse {
        accepted: false,
        reason: Some(rejection.to_string()),
        snapshot: state.scheduler.latest().as_ref().clone(),
    }
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.scheduler.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(snapshot) => serde_json::to_string(snapshot.as_ref())
            .ok()
            .map(|payload| Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::{Engine, EngineSettings};
    use crate::outcome::SimulationStatus;
    use crate::scenario::RegionDataset;

    #[test]
    fn rejected_reply_carries_reason() {
        let engine = Engine::new(EngineSettings::default(), RegionDataset::world_sample());
        let reply = CommandReply {
            result: Err(CommandRejection::InsufficientFunds {
                cost: 500,
                available: 50,
            }),
            snapshot: Arc::new(engine.snapshot()),
        };
        let response = CommandResponse::from(reply);
        assert!(!response.accepted);
        assert_eq!(
            response.reason.as_deref(),
            Some("insufficient funds: need 500 points, have 50")
        );
        assert_eq!(response.snapshot.status, SimulationStatus::Paused);
    }

    #[test]
    fn start_request_defaults_to_medium() {
        let request: StartRequest = serde_json::from_str(r#"{"region":"FR"}"#).unwrap();
        assert_eq!(request.difficulty, "MEDIUM");
    }
}
