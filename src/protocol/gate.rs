//! Single-flight token for the command sequencer.
//!
//! At most one holder at a time. A poll takes the gate with
//! [`SequencerGate::try_acquire`] and reports `busy` when it is taken; a
//! manual command waits for it with a bound. The [`GateGuard`] releases the
//! gate when dropped, so every exit path (including cancellation of the
//! future holding it) frees the sequencer.

use crate::error::{St24Error, St24Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared single-flight token. Clones refer to the same gate.
#[derive(Clone, Default)]
pub struct SequencerGate {
    token: Arc<Mutex<()>>,
}

impl SequencerGate {
    /// A free gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate if it is free, without waiting.
    pub fn try_acquire(&self, holder: &str) -> Option<GateGuard> {
        match self.token.clone().try_lock_owned() {
            Ok(token) => {
                tracing::debug!(holder, "sequencer gate acquired");
                Some(GateGuard::new(holder, token))
            }
            Err(_) => {
                tracing::debug!(holder, "sequencer gate held, not waiting");
                None
            }
        }
    }

    /// Wait for the gate, giving up after `acquire_timeout`.
    ///
    /// # Errors
    /// [`St24Error::Busy`] if the gate was not released in time.
    pub async fn acquire(&self, holder: &str, acquire_timeout: Duration) -> St24Result<GateGuard> {
        let token = tokio::time::timeout(acquire_timeout, self.token.clone().lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(
                    holder,
                    timeout_ms = acquire_timeout.as_millis() as u64,
                    "timed out waiting for sequencer gate"
                );
                St24Error::Busy(acquire_timeout)
            })?;
        tracing::debug!(holder, "sequencer gate acquired");
        Ok(GateGuard::new(holder, token))
    }

    /// Whether a guard is currently alive.
    pub fn is_held(&self) -> bool {
        self.token.try_lock().is_err()
    }
}

/// Proof of holding the sequencer gate. Dropping it releases the gate.
pub struct GateGuard {
    holder: String,
    _token: OwnedMutexGuard<()>,
}

impl GateGuard {
    fn new(holder: &str, token: OwnedMutexGuard<()>) -> Self {
        Self {
            holder: holder.to_string(),
            _token: token,
        }
    }

    /// Label given when the gate was taken (`poll` or `manual`).
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        tracing::debug!(holder = %self.holder, "sequencer gate released");
    }
}
