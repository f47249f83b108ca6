//! Drives the engine on a fixed cadence while an outbreak is running.
//!
//! The scheduler task is the only owner of the [`Engine`]. Commands reach it
//! through a channel and are applied between ticks, so there is exactly one
//! writer. Every accepted command and every tick publishes a fresh snapshot.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{Command, CommandRejection, Engine, EngineBuilder};
use crate::modifiers::Difficulty;
use crate::outcome::SimulationStatus;
use crate::snapshot::SimulationSnapshot;
use crate::world::RegionId;

const REQUEST_BUFFER: usize = 64;
const UPDATE_BUFFER: usize = 512;

#[derive(Debug, Error)]
#[error("scheduler task has stopped")]
pub struct SchedulerClosed;

#[derive(Debug, Clone)]
pub struct CommandReply {
    pub result: Result<(), CommandRejection>,
    pub snapshot: Arc<SimulationSnapshot>,
}

enum Request {
    Command(Command, oneshot::Sender<CommandReply>),
    Restart(oneshot::Sender<Arc<SimulationSnapshot>>),
}

#[derive(Clone)]
pub struct SchedulerHandle {
    requests: mpsc::Sender<Request>,
    latest: watch::Receiver<Arc<SimulationSnapshot>>,
    updates: broadcast::Sender<Arc<SimulationSnapshot>>,
}

impl SchedulerHandle {
    pub async fn send(&self, command: Command) -> Result<CommandReply, SchedulerClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Request::Command(command, reply_tx))
            .await
            .map_err(|_| SchedulerClosed)?;
        reply_rx.await.map_err(|_| SchedulerClosed)
    }

    pub async fn start_infection(
        &self,
        region: RegionId,
        difficulty: Difficulty,
    ) -> Result<CommandReply, SchedulerClosed> {
        self.send(Command::StartInfection { region, difficulty }).await
    }

    pub async fn purchase_policy(
        &self,
        policy: impl Into<String>,
    ) -> Result<CommandReply, SchedulerClosed> {
        self.send(Command::PurchasePolicy {
            policy: policy.into(),
        })
        .await
    }

    /// Throws the current run away and replaces it with a fresh, paused one.
    pub async fn restart(&self) -> Result<Arc<SimulationSnapshot>, SchedulerClosed> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Request::Restart(reply_tx))
            .await
            .map_err(|_| SchedulerClosed)?;
        reply_rx.await.map_err(|_| SchedulerClosed)
    }

    pub fn latest(&self) -> Arc<SimulationSnapshot> {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<SimulationSnapshot>> {
        self.updates.subscribe()
    }
}

struct Scheduler {
    builder: EngineBuilder,
    engine: Engine,
    period: Duration,
    restarts: u64,
    requests: mpsc::Receiver<Request>,
    latest: watch::Sender<Arc<SimulationSnapshot>>,
    updates: broadcast::Sender<Arc<SimulationSnapshot>>,
}

/// Spawns the scheduler on the current tokio runtime. The task exits once
/// every [`SchedulerHandle`] has been dropped.
pub fn spawn(builder: EngineBuilder, period: Duration) -> (SchedulerHandle, JoinHandle<()>) {
    let engine = builder.build();
    let (requests_tx, requests_rx) = mpsc::channel(REQUEST_BUFFER);
    let (latest_tx, latest_rx) = watch::channel(Arc::new(engine.snapshot()));
    let (updates_tx, _) = broadcast::channel(UPDATE_BUFFER);

    let scheduler = Scheduler {
        builder,
        engine,
        period,
        restarts: 0,
        requests: requests_rx,
        latest: latest_tx,
        updates: updates_tx.clone(),
    };
    let task = tokio::spawn(scheduler.run());
    let handle = SchedulerHandle {
        requests: requests_tx,
        latest: latest_rx,
        updates: updates_tx,
    };
    (handle, task)
}

impl Scheduler {
    async fn run(mut self) {
        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let running = self.engine.status() == SimulationStatus::Running;
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request, &mut ticker),
                    None => break,
                },
                _ = ticker.tick(), if running => self.on_tick(),
            }
        }
        debug!("scheduler.stopped");
    }

    fn handle(&mut self, request: Request, ticker: &mut Interval) {
        match request {
            Request::Command(command, reply) => {
                let starts_run = matches!(command, Command::StartInfection { .. });
                let result = self.engine.apply_command(command);
                let snapshot = match &result {
                    Ok(()) => {
                        if starts_run {
                            // First tick of a new run lands one full period later.
                            ticker.reset();
                        }
                        self.publish()
                    }
                    Err(rejection) => {
                        warn!(%rejection, "command.declined");
                        self.latest.borrow().clone()
                    }
                };
                let _ = reply.send(CommandReply { result, snapshot });
            }
            Request::Restart(reply) => {
                self.restarts += 1;
                let seed = self.builder.settings().seed.wrapping_add(self.restarts);
                self.engine = self.builder.clone().with_seed(seed).build();
                info!(seed, "run.reset");
                let _ = reply.send(self.publish());
            }
        }
    }

    fn on_tick(&mut self) {
        if self.engine.tick().is_some() {
            self.publish();
        }
    }

    fn publish(&self) -> Arc<SimulationSnapshot> {
        let snapshot = Arc::new(self.engine.snapshot());
        self.latest.send_replace(snapshot.clone());
        let _ = self.updates.send(snapshot.clone());
        snapshot
    }
}
