//! Routing of Authorization Credentials (602) to the task that asked.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use aptmethod_protocol::records::AuthorizationCredentials;
use tokio::sync::oneshot;

use crate::error::{MethodError, MethodResult};

type Waiter = oneshot::Sender<AuthorizationCredentials>;

#[derive(Default)]
struct Waiters {
    closed: bool,
    by_site: HashMap<String, VecDeque<Waiter>>,
}

/// Pending authorization prompts, keyed by site.
///
/// Prompts for the same site are answered first come first served. A
/// prompt for one site is never answered with another site's credentials.
#[derive(Default)]
pub(crate) struct AuthorizationBroker {
    waiters: Mutex<Waiters>,
}

impl AuthorizationBroker {
    fn lock(&self) -> MutexGuard<'_, Waiters> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a waiter for `site`. Must happen before the prompt is written.
    pub(crate) fn register(&self, site: &str) -> MethodResult<oneshot::Receiver<AuthorizationCredentials>> {
        let mut waiters = self.lock();
        if waiters.closed {
            return Err(MethodError::ConnectionClosed);
        }
        // Drop prompts that timed out or whose task went away.
        waiters.by_site.retain(|_, queue| {
            queue.retain(|waiter| !waiter.is_closed());
            !queue.is_empty()
        });
        let (tx, rx) = oneshot::channel();
        waiters.by_site.entry(site.to_string()).or_default().push_back(tx);
        Ok(rx)
    }

    /// Hands `credentials` to the oldest live waiter for its site.
    ///
    /// Returns the credentials back when nobody is waiting.
    pub(crate) fn deliver(&self, credentials: AuthorizationCredentials) -> Result<(), AuthorizationCredentials> {
        let mut waiters = self.lock();
        let site = credentials.site.clone();
        let Some(queue) = waiters.by_site.get_mut(&site) else {
            return Err(credentials);
        };

        let mut pending = credentials;
        let result = loop {
            let Some(waiter) = queue.pop_front() else {
                break Err(pending);
            };
            match waiter.send(pending) {
                Ok(()) => break Ok(()),
                // The prompt timed out or its task went away.
                Err(returned) => pending = returned,
            }
        };

        if queue.is_empty() {
            waiters.by_site.remove(&site);
        }
        result
    }

    /// Fails every pending and future prompt with [`MethodError::ConnectionClosed`].
    pub(crate) fn close(&self) {
        let mut waiters = self.lock();
        waiters.closed = true;
        waiters.by_site.clear();
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.lock().by_site.values().map(VecDeque::len).sum()
    }
}
