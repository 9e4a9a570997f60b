//! Background compaction scheduler
//!
//! A dedicated thread runs `check_and_compact` on every tick of a fixed
//! interval until it is stopped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};
use tracing::{debug, error, info};

use crate::error::Result;

use super::TableTree;

/// Handle to the periodic compaction thread
///
/// Dropping the handle stops the thread and waits for it.
pub struct CompactionScheduler {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CompactionScheduler {
    /// Spawn the compaction thread
    pub fn start(tree: Arc<TableTree>, interval: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);
        let ticker = channel::tick(interval);

        let handle = thread::Builder::new()
            .name("stratakv-compaction".to_string())
            .spawn(move || {
                debug!(interval_ms = interval.as_millis() as u64, "compaction scheduler running");
                loop {
                    channel::select! {
                        recv(ticker) -> _ => {
                            match tree.check_and_compact() {
                                Ok(0) => {}
                                Ok(levels) => debug!(levels, "compaction check merged levels"),
                                Err(e) => error!(error = %e, "compaction check failed"),
                            }
                        }
                        recv(shutdown_rx) -> _ => break,
                    }
                }
                debug!("compaction scheduler stopped");
            })?;

        info!(interval_ms = interval.as_millis() as u64, "compaction scheduler started");
        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Signal the thread to exit and wait for the current pass to finish
    pub fn stop(&mut self) {
        // Disconnecting the channel wakes the select
        drop(self.shutdown.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("compaction thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for CompactionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
