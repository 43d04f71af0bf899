//! Pending event queue with in-memory retry budget
//!
//! A flush takes the whole pending sequence at once and leaves the queue
//! empty, so events arriving while a batch is in flight accumulate for the
//! next flush. A failed batch goes back in front of whatever accumulated
//! meanwhile until the retry budget runs out.

use std::collections::VecDeque;
use std::fmt;

use mindhit_domain::BrowsingEvent;

/// Why a flush was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Pending length reached the batch size
    Threshold,
    /// Recurring flush timer tick
    Timer,
    /// Final flush of a stopping session
    SessionStopped,
    /// Host shutdown
    Shutdown,
}

impl FlushTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Threshold => "threshold",
            Self::Timer => "timer",
            Self::SessionStopped => "session_stopped",
            Self::Shutdown => "shutdown",
        }
    }

    /// Final flushes have no live queue to retry from.
    pub fn is_final(self) -> bool {
        matches!(self, Self::SessionStopped | Self::Shutdown)
    }
}

impl fmt::Display for FlushTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of appending an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The pending length reached the batch size
    ThresholdReached,
}

/// What happened to a batch after a failed delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Put back in front of the pending sequence
    Requeued,
    /// Retry budget exhausted; the caller must persist the batch
    Exhausted(Vec<BrowsingEvent>),
}

/// FIFO of events waiting for delivery.
#[derive(Debug)]
pub struct EventQueue {
    pending: VecDeque<BrowsingEvent>,
    batch_size: usize,
    max_retry: u32,
    retry_count: u32,
}

impl EventQueue {
    pub fn new(batch_size: usize, max_retry: u32) -> Self {
        Self {
            pending: VecDeque::new(),
            batch_size: batch_size.max(1),
            max_retry: max_retry.max(1),
            retry_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Consecutive failed deliveries since the last success or exhaustion.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn push(&mut self, event: BrowsingEvent) -> PushOutcome {
        self.pending.push_back(event);
        if self.pending.len() >= self.batch_size {
            PushOutcome::ThresholdReached
        } else {
            PushOutcome::Queued
        }
    }

    /// Take every pending event, leaving the queue empty.
    ///
    /// Returns `None` when nothing is pending.
    pub fn take_batch(&mut self) -> Option<Vec<BrowsingEvent>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(self.pending.drain(..).collect())
    }

    pub fn record_success(&mut self) {
        self.retry_count = 0;
    }

    /// Count a failed delivery of `batch` against the retry budget.
    pub fn record_failure(&mut self, batch: Vec<BrowsingEvent>) -> FailureOutcome {
        self.retry_count += 1;
        if self.retry_count >= self.max_retry {
            self.retry_count = 0;
            FailureOutcome::Exhausted(batch)
        } else {
            self.requeue_front(batch);
            FailureOutcome::Requeued
        }
    }

    /// Put `batch` in front of the pending sequence, keeping its order.
    pub fn requeue_front(&mut self, batch: Vec<BrowsingEvent>) {
        for event in batch.into_iter().rev() {
            self.pending.push_front(event);
        }
    }

    /// Drop everything and reset the retry budget.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.retry_count = 0;
    }
}
