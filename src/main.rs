use claimbus::{
    config::CoordinationConfig,
    coordinator::{start_tick_task, Coordinator, SharedCoordinator},
    diagnostics,
    shared::AppState,
    sim::{start_swarm_task, SwarmConfig, SyntheticSwarm},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "claimbus=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting claim bus coordinator");

    let config = CoordinationConfig::from_env();
    let tick_config = config.tick.clone();
    let coordinator: SharedCoordinator = Arc::new(Mutex::new(Coordinator::new(config)));

    // Single arbitration thread: every mutation happens under this task's ticks
    tokio::spawn(start_tick_task(coordinator.clone(), tick_config.clone()));

    // Optional synthetic load for soak runs
    match std::env::var("CLAIMBUS_SIM_AGENTS").map(|raw| raw.parse::<u32>()) {
        Ok(Ok(agents)) if agents > 0 => {
            info!(agents = agents, "Starting synthetic swarm");
            let swarm = SyntheticSwarm::new(SwarmConfig::with_agents(agents));
            tokio::spawn(start_swarm_task(
                coordinator.clone(),
                swarm,
                Duration::from_millis(tick_config.interval_ms.max(1)),
            ));
        }
        Ok(Err(e)) => warn!(error = %e, "Ignoring unparsable CLAIMBUS_SIM_AGENTS"),
        _ => {}
    }

    let app = diagnostics::router(AppState::new(coordinator));

    let addr = std::env::var("CLAIMBUS_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind diagnostics server");
            return;
        }
    };
    info!("Diagnostics server running on http://{}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Diagnostics server stopped");
    }
}
