use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::constants::TICK_INTERVAL;
use crate::hub::{broadcast_text, QueuePolicy, ServerState, SharedState};
use crate::server_protocol::ServerMessage;

/// Drives the fixed 60 Hz simulation. Each tick runs under the state lock,
/// so client commands always land between two ticks, never inside one.
pub fn start_tick_loop(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(interval_us = TICK_INTERVAL.as_micros() as u64, "tick loop started");
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            run_tick(&mut guard);
        }
    })
}

/// Advances the simulation by one step and pushes the full snapshot to
/// every connection. Slow consumers miss frames instead of being dropped.
pub fn run_tick(state: &mut ServerState) {
    let bounds = state.bounds;
    state.registry.step(bounds);

    let payload = match ServerMessage::PhysicsUpdate(state.registry.snapshot()).encode() {
        Ok(payload) => payload,
        Err(error) => {
            warn!(%error, "failed to encode physics update");
            return;
        }
    };
    broadcast_text(state, &payload, QueuePolicy::DropOnFull);
}
