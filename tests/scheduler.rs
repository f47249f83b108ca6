use std::time::Duration;

use outbreak::{
    config::EpidemicParams,
    engine::{CommandRejection, EngineBuilder, EngineSettings},
    modifiers::Difficulty,
    outcome::SimulationStatus,
    scenario::{RegionDataset, RegionRecord},
    scheduler,
    world::{ClimateClass, DensityClass, RegionId},
};
use tokio::time::sleep;

const PERIOD: Duration = Duration::from_secs(1);

fn world_builder() -> EngineBuilder {
    EngineBuilder::new(EngineSettings::default(), RegionDataset::world_sample())
}

fn doomed_builder() -> EngineBuilder {
    let settings = EngineSettings {
        epidemic: EpidemicParams {
            base_spread_rate: 0.0,
            base_mortality_rate: 1.0,
            seed_infected: 900,
            ..EpidemicParams::default()
        },
        ..EngineSettings::default()
    };
    let dataset = RegionDataset {
        name: "doomed".into(),
        regions: vec![RegionRecord {
            id: RegionId::from("X"),
            name: "Doomed".into(),
            population: 1_000,
            density: DensityClass::Low,
            climate: ClimateClass::Cold,
            neighbors: Vec::new(),
        }],
    };
    EngineBuilder::new(settings, dataset)
}

#[tokio::test(start_paused = true)]
async fn paused_simulation_never_ticks() {
    let (handle, _task) = scheduler::spawn(world_builder(), PERIOD);
    sleep(Duration::from_secs(5)).await;

    let latest = handle.latest();
    assert_eq!(latest.status, SimulationStatus::Paused);
    assert_eq!(latest.stats.day, 0);
}

#[tokio::test(start_paused = true)]
async fn running_simulation_ticks_once_per_period() {
    let (handle, _task) = scheduler::spawn(world_builder(), PERIOD);
    let reply = handle
        .start_infection(RegionId::from("US"), Difficulty::Medium)
        .await
        .unwrap();
    assert!(reply.result.is_ok());
    assert_eq!(reply.snapshot.status, SimulationStatus::Running);
    assert_eq!(reply.snapshot.stats.day, 0);

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(handle.latest().stats.day, 3);
}

#[tokio::test(start_paused = true)]
async fn subscribers_see_every_tick() {
    let (handle, _task) = scheduler::spawn(world_builder(), PERIOD);
    let mut updates = handle.subscribe();
    handle
        .start_infection(RegionId::from("BR"), Difficulty::Easy)
        .await
        .unwrap();

    let started = updates.recv().await.unwrap();
    assert_eq!(started.status, SimulationStatus::Running);
    assert_eq!(started.stats.day, 0);
    for day in 1..=2 {
        let snapshot = updates.recv().await.unwrap();
        assert_eq!(snapshot.stats.day, day);
    }
}

#[tokio::test(start_paused = true)]
async fn rejected_commands_leave_state_alone() {
    let (handle, _task) = scheduler::spawn(world_builder(), PERIOD);
    let before = handle.latest();

    let reply = handle.purchase_policy("masks").await.unwrap();
    assert_eq!(reply.result, Err(CommandRejection::NotRunning));
    assert_eq!(reply.snapshot, before);

    let reply = handle
        .start_infection(RegionId::from("Atlantis"), Difficulty::Hard)
        .await
        .unwrap();
    assert_eq!(
        reply.result,
        Err(CommandRejection::UnknownRegion(RegionId::from("Atlantis")))
    );
    assert_eq!(*handle.latest(), *before);
}

#[tokio::test(start_paused = true)]
async fn decided_run_stops_ticking_until_restart() {
    let (handle, _task) = scheduler::spawn(doomed_builder(), PERIOD);
    handle
        .start_infection(RegionId::from("X"), Difficulty::Medium)
        .await
        .unwrap();

    sleep(Duration::from_secs(5)).await;
    let finished = handle.latest();
    assert_eq!(finished.status, SimulationStatus::Defeat);
    assert_eq!(finished.stats.day, 1);
    assert_eq!(finished.ending.as_ref().map(|e| e.casualties), Some(900));

    let reply = handle.purchase_policy("masks").await.unwrap();
    assert_eq!(reply.result, Err(CommandRejection::Finished));

    let fresh = handle.restart().await.unwrap();
    assert_eq!(fresh.status, SimulationStatus::Paused);
    assert_eq!(fresh.stats.day, 0);
    assert_eq!(fresh.stats.total_dead, 0);
    assert!(fresh.ending.is_none());

    let reply = handle
        .start_infection(RegionId::from("X"), Difficulty::Medium)
        .await
        .unwrap();
    assert!(reply.result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn task_exits_when_handles_drop() {
    let (handle, task) = scheduler::spawn(world_builder(), PERIOD);
    drop(handle);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn start_during_a_run_restarts_the_cadence() {
    let (handle, _task) = scheduler::spawn(world_builder(), PERIOD);
    handle
        .start_infection(RegionId::from("US"), Difficulty::Medium)
        .await
        .unwrap();
    sleep(Duration::from_millis(1_900)).await;
    assert_eq!(handle.latest().stats.day, 1);

    let reply = handle
        .start_infection(RegionId::from("FR"), Difficulty::Hard)
        .await
        .unwrap();
    assert!(reply.result.is_ok());
    assert_eq!(reply.snapshot.stats.day, 0);

    // the old schedule would have ticked at 2.0s
    sleep(Duration::from_millis(600)).await;
    assert_eq!(handle.latest().stats.day, 0);
    sleep(Duration::from_millis(500)).await;
    assert_eq!(handle.latest().stats.day, 1);
    assert_eq!(handle.latest().difficulty, Some(Difficulty::Hard));
}
