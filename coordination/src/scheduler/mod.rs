//! Dependent-Work Scheduler.
//!
//! Holds follow-up requests (questions about the document) until no brief
//! section is running, then releases them one at a time in arrival order.
//! A kind that never started counts as ready; `Failed` counts as terminal.
//!
//! The scheduler never drops a request on its own. Callers that supersede
//! the queued work (a new document) take it back with [`DependentWorkScheduler::take_all`].

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::sections::SectionKind;

/// A request waiting for the brief to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion<T> {
    pub request: T,
    /// Monotonic arrival number; lower arrived first.
    pub arrival: u64,
}

/// Result of [`DependentWorkScheduler::submit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome<T> {
    /// Ready now; the caller should run it.
    Dispatched(PendingQuestion<T>),
    /// Waiting; `position` is 1-based within the queue.
    Queued { arrival: u64, position: usize },
}

#[derive(Debug)]
pub struct DependentWorkScheduler<T> {
    running: BTreeSet<SectionKind>,
    queue: VecDeque<PendingQuestion<T>>,
    next_arrival: u64,
    in_flight: usize,
    max_in_flight: Option<usize>,
}

impl<T> Default for DependentWorkScheduler<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T> DependentWorkScheduler<T> {
    /// `max_in_flight` bounds how many released requests may be outstanding
    /// at once; `None` leaves release gated on section readiness alone.
    pub fn new(max_in_flight: Option<usize>) -> Self {
        Self {
            running: BTreeSet::new(),
            queue: VecDeque::new(),
            next_arrival: 0,
            in_flight: 0,
            max_in_flight,
        }
    }

    /// No section kind is running.
    pub fn is_ready(&self) -> bool {
        self.running.is_empty()
    }

    fn can_release(&self) -> bool {
        self.is_ready() && self.max_in_flight.map_or(true, |max| self.in_flight < max)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingQuestion<T>> {
        self.queue.iter()
    }

    /// Record that `kind` entered Running.
    pub fn mark_running(&mut self, kind: SectionKind) {
        self.running.insert(kind);
    }

    /// Dispatch immediately when ready and nothing older is waiting;
    /// otherwise append to the queue.
    pub fn submit(&mut self, request: T) -> SubmitOutcome<T> {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        let item = PendingQuestion { request, arrival };

        if self.queue.is_empty() && self.can_release() {
            self.in_flight += 1;
            debug!(arrival, "dependent request dispatched immediately");
            return SubmitOutcome::Dispatched(item);
        }

        self.queue.push_back(item);
        let position = self.queue.len();
        debug!(arrival, position, running = self.running.len(), "dependent request queued");
        SubmitOutcome::Queued { arrival, position }
    }

    /// `kind` reached a terminal state (or was cancelled back to idle).
    /// Releases at most one queued request.
    pub fn on_section_terminal(&mut self, kind: SectionKind) -> Option<PendingQuestion<T>> {
        self.running.remove(&kind);
        self.drain()
    }

    /// Release the oldest queued request if readiness holds.
    pub fn drain(&mut self) -> Option<PendingQuestion<T>> {
        if !self.can_release() {
            return None;
        }
        let item = self.queue.pop_front()?;
        self.in_flight += 1;
        debug!(arrival = item.arrival, remaining = self.queue.len(), "dependent request released");
        Some(item)
    }

    /// A released request finished; frees one in-flight slot.
    pub fn on_dispatch_finished(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Remove every queued request, oldest first.
    pub fn take_all(&mut self) -> Vec<PendingQuestion<T>> {
        self.queue.drain(..).collect()
    }
}
