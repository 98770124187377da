//! Admission control.
//!
//! Holds the FIFO backlog of queued job ids and decides, on every event that
//! can change slot availability, which of them may start.

use std::collections::VecDeque;

use hf_core::JobId;

use crate::job::JobStatus;
use crate::registry::JobRegistry;

/// FIFO admission scheduler with a fixed concurrency ceiling.
#[derive(Debug)]
pub struct AdmissionScheduler {
    ceiling: usize,
    backlog: VecDeque<JobId>,
}

impl AdmissionScheduler {
    /// Create a scheduler. A ceiling of zero is treated as one.
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling: ceiling.max(1),
            backlog: VecDeque::new(),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Append a job to the back of the backlog.
    pub fn enqueue(&mut self, id: JobId) {
        self.backlog.push_back(id);
    }

    /// Drop a job from the backlog. Returns whether it was waiting.
    pub fn remove(&mut self, id: JobId) -> bool {
        match self.backlog.iter().position(|queued| *queued == id) {
            Some(pos) => {
                self.backlog.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn clear(&mut self) {
        self.backlog.clear();
    }

    /// Move jobs from the backlog to `running` while capacity allows.
    ///
    /// The running count is recomputed from the registry, so this is safe to
    /// call after any event. Backlog entries that are no longer `queued`
    /// (cancelled, retired) are discarded. Returns the ids that were started,
    /// oldest first.
    pub fn admit(&mut self, registry: &mut JobRegistry) -> Vec<JobId> {
        let mut running = registry.running_count();
        let mut admitted = Vec::new();

        while running < self.ceiling {
            let Some(id) = self.backlog.pop_front() else {
                break;
            };

            let queued = registry
                .get(id)
                .is_some_and(|j| j.status == JobStatus::Queued);
            if !queued {
                continue;
            }

            if registry.update(id, |j| j.start()) {
                running += 1;
                admitted.push(id);
            }
        }

        admitted
    }
}
