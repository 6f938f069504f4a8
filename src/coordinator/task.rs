use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, instrument};

use super::service::Coordinator;
use crate::config::TickConfig;

/// Coordinator shared between the tick task and everything that calls into it
pub type SharedCoordinator = Arc<Mutex<Coordinator>>;

/// Starts the background task that drives the coordinator one tick per interval
///
/// Simulated time is the number of milliseconds since the task started.
#[instrument(skip(coordinator))]
pub async fn start_tick_task(coordinator: SharedCoordinator, config: TickConfig) {
    info!(
        tick_interval_ms = config.interval_ms,
        "Starting coordinator tick task"
    );

    let mut ticker = interval(Duration::from_millis(config.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let started = Instant::now();

    loop {
        ticker.tick().await;

        let now = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        coordinator.lock().await.tick(now);
    }
}
