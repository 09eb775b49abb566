//! Completion watcher
//!
//! Blocks on the engine's "everything finished" notification on its own
//! task and turns it into a shutdown request. When the engine was closed by
//! teardown first, the request it sends is a harmless duplicate.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::app::engine::TransferEngine;
use crate::app::supervisor::shutdown::{ShutdownHandle, ShutdownOrigin};

/// Spawns the task waiting for every transfer to finish
pub struct CompletionWatcher;

impl CompletionWatcher {
    /// Start waiting; the task resolves to whether completion was natural
    pub fn start<E: TransferEngine>(engine: Arc<E>, shutdown: ShutdownHandle) -> JoinHandle<bool> {
        tokio::spawn(async move {
            debug!("Waiting for all transfers to complete");
            let natural = engine.wait_all_complete().await;

            if natural {
                info!("All transfers complete");
            } else {
                info!("Transfer engine stopped before all transfers completed");
            }

            shutdown.request(ShutdownOrigin::TransfersFinished { natural });
            natural
        })
    }
}
