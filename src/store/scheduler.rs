//! Periodic snapshot saving
//!
//! One background task saves the store every interval; the final save on
//! shutdown runs synchronously to completion. Changing the interval restarts
//! the task.

use crate::common::config::validate_save_interval;
use crate::common::Result;
use crate::store::persistence::Persistence;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct SaveScheduler {
    persistence: Arc<Persistence>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SaveScheduler {
    pub fn new(persistence: Arc<Persistence>) -> Self {
        Self {
            persistence,
            handle: Mutex::new(None),
        }
    }

    /// Start (or restart) the periodic save task. Needs a tokio runtime.
    pub fn start(&self, interval: Duration) {
        let persistence = self.persistence.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately; nothing to save yet.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let persistence = persistence.clone();
                match tokio::task::spawn_blocking(move || persistence.save()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!("Periodic save failed: {}", e),
                    Err(e) => tracing::error!("Periodic save task panicked: {}", e),
                }
            }
        });

        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::info!("Saving prospecting data every {:?}", interval);
    }

    /// Change the save interval, restarting the timer.
    pub fn reconfigure(&self, minutes: u64) -> Result<()> {
        validate_save_interval(minutes)?;
        self.start(Duration::from_secs(minutes * 60));
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the timer and run the final save.
    pub fn shutdown(&self) -> Result<bool> {
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.persistence.save()
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}
