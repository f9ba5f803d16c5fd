//! Correlation of outbound lookup commands with the numeric replies that answer them.
//!
//! A lookup sends a command such as `WHO nick` and then waits for the matching reply.
//! Replies arrive on the connection's event stream with no request identifier, so the
//! pending lookup is keyed by (kind, casefolded nick). At most one command is in flight
//! per key; later callers for the same key wait on the same slot.

use crate::casemap::NickKey;
use crate::observation::ObservationKind;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::oneshot;

/// How long a lookup waits for its reply unless configured otherwise
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// The kind of lookup being made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LookupKind {
    UserHost,
    UserIp,
    UserMask,
}

impl LookupKind {
    /// The IRC command that performs this lookup
    pub fn command(&self) -> &'static str {
        match self {
            Self::UserHost => "USERHOST",
            Self::UserIp => "USERIP",
            Self::UserMask => "WHO",
        }
    }

    /// The observation table that results of this lookup are recorded in
    pub fn observation(&self) -> ObservationKind {
        match self {
            Self::UserHost => ObservationKind::Host,
            Self::UserIp => ObservationKind::Address,
            Self::UserMask => ObservationKind::Mask,
        }
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("timed out waiting for {kind} reply for {nick}")]
    Timeout { kind: LookupKind, nick: String },
    #[error("{kind} lookup for {nick} was abandoned")]
    Abandoned { kind: LookupKind, nick: String },
}

/// Something that can send a command to the server.
///
/// Sending is fire-and-forget; any answer comes back through [`Correlator::resolve`].
pub trait CommandSink: Send + Sync {
    fn send_command(&self, command: &str, arg: &str);
}

type SlotKey = (LookupKind, NickKey);

struct Slot {
    id: u64,
    sender: oneshot::Sender<String>,
    reply: Shared<oneshot::Receiver<String>>,
    waiters: usize,
}

/// Pending lookups for a single server connection
pub struct Correlator {
    slots: Mutex<HashMap<SlotKey, Slot>>,
    next_id: AtomicU64,
    timeout: Duration,
}

/// Releases a waiter's interest in a slot, removing the slot when the last waiter leaves.
///
/// Held across the await in [`Correlator::request`] so that the slot is cleaned up
/// whether the wait succeeds, times out, or the waiting task is dropped.
struct SlotGuard<'a> {
    correlator: &'a Correlator,
    key: SlotKey,
    id: u64,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.correlator.slots.lock();

        // A resolved slot is already gone, and may have been replaced by a newer request
        if let Entry::Occupied(mut entry) = slots.entry(self.key.clone()) {
            if entry.get().id == self.id {
                entry.get_mut().waiters -= 1;
                if entry.get().waiters == 0 {
                    entry.remove();
                }
            }
        }
    }
}

impl Correlator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            timeout,
        }
    }

    /// Wait for the reply to a `kind` lookup for `nick`.
    ///
    /// If no lookup is already pending for this key, `issue` is called to send the
    /// outbound command. Otherwise this call joins the pending lookup and `issue` is
    /// not called.
    pub async fn request(
        &self,
        kind: LookupKind,
        nick: &str,
        issue: impl FnOnce(),
    ) -> Result<String, LookupError> {
        let key = (kind, NickKey::new(nick));

        let (id, reply, created) = {
            let mut slots = self.slots.lock();
            match slots.entry(key.clone()) {
                Entry::Occupied(mut entry) => {
                    let slot = entry.get_mut();
                    slot.waiters += 1;
                    (slot.id, slot.reply.clone(), false)
                }
                Entry::Vacant(entry) => {
                    let (sender, receiver) = oneshot::channel();
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let reply = receiver.shared();
                    entry.insert(Slot {
                        id,
                        sender,
                        reply: reply.clone(),
                        waiters: 1,
                    });
                    (id, reply, true)
                }
            }
        };

        let _guard = SlotGuard {
            correlator: self,
            key,
            id,
        };

        if created {
            issue();
        } else {
            tracing::trace!(%kind, nick, "Joining pending lookup");
        }

        match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(LookupError::Abandoned {
                kind,
                nick: nick.to_owned(),
            }),
            Err(_) => Err(LookupError::Timeout {
                kind,
                nick: nick.to_owned(),
            }),
        }
    }

    /// Send the lookup command for `nick` through `sink` (if none is pending) and wait
    /// for the reply
    pub async fn lookup(
        &self,
        kind: LookupKind,
        nick: &str,
        sink: &dyn CommandSink,
    ) -> Result<String, LookupError> {
        self.request(kind, nick, || {
            tracing::debug!(%kind, nick, "Sending lookup");
            sink.send_command(kind.command(), nick)
        })
        .await
    }

    /// Deliver `value` to whoever is waiting on a `kind` lookup for `nick`.
    ///
    /// Returns false, with no other effect, if nobody is waiting.
    pub fn resolve(&self, kind: LookupKind, nick: &str, value: String) -> bool {
        let slot = self.slots.lock().remove(&(kind, NickKey::new(nick)));

        match slot {
            Some(slot) => {
                // Fails only if every waiter has gone, in which case nobody cares
                let _ = slot.sender.send(value);
                true
            }
            None => {
                tracing::trace!(%kind, nick, "Reply with no pending lookup");
                false
            }
        }
    }

    /// Drop every pending lookup. Waiters fail with [`LookupError::Abandoned`].
    pub fn abandon_all(&self) {
        let dropped = std::mem::take(&mut *self.slots.lock());
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "Abandoning pending lookups");
        }
    }

    /// Number of pending lookups
    pub fn pending(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_pending(&self, kind: LookupKind, nick: &str) -> bool {
        self.slots.lock().contains_key(&(kind, NickKey::new(nick)))
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKUP_TIMEOUT)
    }
}
