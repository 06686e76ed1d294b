//! Media change coordination.
//!
//! Handlers reading from removable media hold a shared [`MediaAccess`]. A
//! media change takes the exclusive side of the same lock: it waits for every
//! outstanding access to end, holds new ones back while the parent swaps the
//! disc, and lets them through once the parent confirms.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aptmethod_protocol::records::MediaChanged;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, oneshot};

use crate::error::{MethodError, MethodResult};

/// Shared access to the current media. Released on drop.
#[derive(Debug)]
pub struct MediaAccess {
    _guard: OwnedRwLockReadGuard<()>,
}

#[derive(Default)]
struct PendingChange {
    closed: bool,
    waiter: Option<oneshot::Sender<MediaChanged>>,
}

#[derive(Default)]
pub(crate) struct MediaGate {
    lock: Arc<RwLock<()>>,
    pending: Mutex<PendingChange>,
}

impl MediaGate {
    fn pending(&self) -> MutexGuard<'_, PendingChange> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) async fn access(&self) -> MediaAccess {
        MediaAccess {
            _guard: self.lock.clone().read_owned().await,
        }
    }

    /// Waits until no [`MediaAccess`] is held and takes the exclusive side.
    pub(crate) async fn exclusive(&self) -> OwnedRwLockWriteGuard<()> {
        self.lock.clone().write_owned().await
    }

    /// Registers the waiter for the next Media Changed. Callers hold the
    /// exclusive guard, so there is at most one.
    pub(crate) fn register(&self) -> MethodResult<oneshot::Receiver<MediaChanged>> {
        let mut pending = self.pending();
        if pending.closed {
            return Err(MethodError::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        pending.waiter = Some(tx);
        Ok(rx)
    }

    /// Completes the outstanding media change. Returns the message back when
    /// no change is outstanding.
    pub(crate) fn deliver(&self, changed: MediaChanged) -> Result<(), MediaChanged> {
        match self.pending().waiter.take() {
            Some(waiter) => waiter.send(changed),
            None => Err(changed),
        }
    }

    pub(crate) fn close(&self) {
        let mut pending = self.pending();
        pending.closed = true;
        pending.waiter = None;
    }
}
