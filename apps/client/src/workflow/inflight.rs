//! Request hardening: one request per action, bounded time, and cancellation
//! when the identity changes underneath a pending request.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

use crate::api_client::ApiError;
use crate::errors::ClientError;

/// Held while an action's request is outstanding. Released on drop.
pub(crate) struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool, action: &'static str) -> Result<Self, ClientError> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected duplicate {action} request");
            return Err(ClientError::Busy(action));
        }
        Ok(Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Monotonic counter bumped on login, logout and explicit cancellation.
pub(crate) struct IdentityEpoch {
    tx: watch::Sender<u64>,
}

impl IdentityEpoch {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    pub(crate) fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    pub(crate) fn advance(&self) {
        self.tx.send_modify(|epoch| *epoch += 1);
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

/// Runs `request` under `timeout`, abandoning it if the epoch moves on from `started`.
pub(crate) async fn run_guarded<T, F>(
    request: F,
    timeout: Duration,
    mut epoch: watch::Receiver<u64>,
    started: u64,
) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::select! {
        biased;
        _ = epoch_moved(&mut epoch, started) => Err(ClientError::Superseded),
        outcome = tokio::time::timeout(timeout, request) => match outcome {
            Ok(result) => result.map_err(ClientError::from),
            Err(_) => Err(ClientError::Timeout(timeout)),
        },
    }
}

async fn epoch_moved(epoch: &mut watch::Receiver<u64>, started: u64) {
    loop {
        if *epoch.borrow_and_update() != started {
            return;
        }
        if epoch.changed().await.is_err() {
            // Sender gone: nothing can supersede us any more.
            std::future::pending::<()>().await;
        }
    }
}
