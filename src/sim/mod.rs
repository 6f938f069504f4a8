// Synthetic load: a scripted swarm of agents driving the coordinator

// Public API - what other modules can use
pub use swarm::{start_swarm_task, SwarmConfig, SwarmStats, SyntheticSwarm};

// Internal modules
mod swarm;
