use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use super::{GateConfig, GateStats};
use crate::{ErrorKind, Result};

/// Identifies one entry from the moment it is enqueued until it is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryToken(u64);

impl fmt::Display for EntryToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An entry which made it through the gate.
///
/// The holder is responsible for handing `token` back to
/// [`AdmissionGate::release`] exactly once, whatever the outcome of the
/// work it was admitted for.
#[derive(Debug)]
pub struct Admitted<T> {
    /// The payload given to [`AdmissionGate::enqueue`], unchanged
    pub payload: T,
    /// Token to release the slot with
    pub token: EntryToken,
}

impl<T> Admitted<T> {
    /// Split into payload and token
    pub fn into_parts(self) -> (T, EntryToken) {
        (self.payload, self.token)
    }
}

struct PendingEntry<T> {
    token: EntryToken,
    payload: T,
    resolver: oneshot::Sender<Admitted<T>>,
}

struct GateState<T> {
    queue: VecDeque<PendingEntry<T>>,
    in_flight: HashSet<EntryToken>,
    next_token: u64,
    admitted: u64,
    released: u64,
    abandoned: u64,
}

impl<T> Default for GateState<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            in_flight: HashSet::new(),
            next_token: 0,
            admitted: 0,
            released: 0,
            abandoned: 0,
        }
    }
}

/// Caps the number of entries in flight and queues the rest in FIFO order.
///
/// Entries move `queued -> admitted -> released`. Admission happens in the
/// order of [`AdmissionGate::enqueue`] calls no matter in which order admitted
/// entries are released.
///
/// Queue and in-flight set live behind a single mutex, so enqueues, admission
/// checks and releases coming from different tasks are linearized and two of
/// them can never both see a free slot for the same capacity unit.
pub struct AdmissionGate<T> {
    capacity: NonZeroUsize,
    defer_admission: bool,
    state: Mutex<GateState<T>>,
}

impl<T> AdmissionGate<T> {
    /// Create a gate admitting at most `capacity` entries at a time
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Configuration`] if `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::from_config(&GateConfig::new(capacity))
    }

    /// Create a gate from a [`GateConfig`]
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Configuration`] if the configured capacity is zero.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        Ok(Self {
            capacity: config.capacity()?,
            defer_admission: config.defer_admission,
            state: Mutex::new(GateState::default()),
        })
    }

    /// Maximum number of entries in flight
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Current queue and in-flight counts
    #[must_use]
    pub fn stats(&self) -> GateStats {
        let state = self.lock();
        GateStats {
            capacity: self.capacity.get(),
            queued: state.queue.len(),
            in_flight: state.in_flight.len(),
            admitted: state.admitted,
            released: state.released,
            abandoned: state.abandoned,
        }
    }

    /// Hand back the slot of an admitted entry and admit the next queued one.
    ///
    /// Must be called exactly once per admitted entry, regardless of whether
    /// the work it was admitted for succeeded.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `token` is not in flight (double release
    /// or a token from another gate).
    pub fn release(&self, token: EntryToken) {
        let mut state = self.lock();
        let removed = state.in_flight.remove(&token);
        debug_assert!(removed, "released entry {token} which is not in flight");
        if !removed {
            log::warn!("Ignoring release of entry {token} which is not in flight");
            return;
        }
        state.released += 1;
        log::trace!(
            "Released entry {token} ({} in flight, {} queued)",
            state.in_flight.len(),
            state.queue.len()
        );
        self.admit_next(&mut state);
    }

    fn admission_check(&self) {
        let mut state = self.lock();
        self.admit_next(&mut state);
    }

    /// Admits at most one entry. Entries whose caller went away are
    /// discarded on the way.
    fn admit_next(&self, state: &mut GateState<T>) {
        while state.in_flight.len() < self.capacity.get() {
            let Some(PendingEntry {
                token,
                payload,
                resolver,
            }) = state.queue.pop_front()
            else {
                return;
            };

            state.in_flight.insert(token);
            if resolver.send(Admitted { payload, token }).is_ok() {
                state.admitted += 1;
                log::trace!(
                    "Admitted entry {token} ({} in flight, {} queued)",
                    state.in_flight.len(),
                    state.queue.len()
                );
                return;
            }

            state.in_flight.remove(&token);
            state.abandoned += 1;
            log::trace!("Discarded entry {token}, its caller is gone");
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> AdmissionGate<T> {
    /// Queue `payload` and return a future resolving once it is admitted.
    ///
    /// Exactly one admission check is scheduled per call. When the gate defers
    /// admission and a Tokio runtime is available, the check runs as a separate
    /// task so a burst of enqueues is fully queued before any of it is admitted.
    pub fn enqueue(self: &Arc<Self>, payload: T) -> Admission<T> {
        let (resolver, receiver) = oneshot::channel();
        let token = {
            let mut state = self.lock();
            let token = EntryToken(state.next_token);
            state.next_token += 1;
            state.queue.push_back(PendingEntry {
                token,
                payload,
                resolver,
            });
            log::trace!("Enqueued entry {token} ({} queued)", state.queue.len());
            token
        };

        self.schedule_admission_check();

        Admission {
            token,
            receiver,
            gate: Arc::clone(self),
            done: false,
        }
    }

    fn schedule_admission_check(self: &Arc<Self>) {
        if self.defer_admission
            && let Ok(handle) = tokio::runtime::Handle::try_current()
        {
            let gate = Arc::clone(self);
            handle.spawn(async move { gate.admission_check() });
            return;
        }
        self.admission_check();
    }
}

impl<T> fmt::Debug for AdmissionGate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("defer_admission", &self.defer_admission)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Future returned by [`AdmissionGate::enqueue`].
///
/// Dropping it before it completes gives up the entry: a queued entry is
/// skipped, an entry admitted in the meantime is released right away.
#[must_use = "the entry is abandoned if the admission is dropped"]
pub struct Admission<T> {
    token: EntryToken,
    receiver: oneshot::Receiver<Admitted<T>>,
    gate: Arc<AdmissionGate<T>>,
    done: bool,
}

impl<T> Admission<T> {
    /// Token of the entry this future waits for
    #[must_use]
    pub const fn token(&self) -> EntryToken {
        self.token
    }
}

impl<T> Future for Admission<T> {
    type Output = Result<Admitted<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            // The gate outlives this future, so the resolver is only dropped
            // after sending. An error here means it was dropped unsent.
            Poll::Ready(result) => {
                this.done = true;
                Poll::Ready(result.map_err(|_| ErrorKind::GateClosed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for Admission<T> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.receiver.close();
        if let Ok(admitted) = self.receiver.try_recv() {
            log::trace!("Entry {} admitted after its caller left", admitted.token);
            self.gate.release(admitted.token);
        }
    }
}

impl<T> fmt::Debug for Admission<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Admission")
            .field("token", &self.token)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
