//! In-memory job table.
//!
//! The registry is the single source of truth for job state. It is owned by
//! the orchestrator and only ever touched under the orchestrator's lock.

use std::collections::HashMap;
use std::path::PathBuf;

use hf_core::JobId;

use crate::job::{Job, JobStatus, SubmitRequest};

/// Filter applied by [`JobRegistry::list`].
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub device_id: Option<String>,
    pub status: Option<JobStatus>,
}

impl JobFilter {
    fn matches(&self, job: &Job) -> bool {
        if let Some(ref device) = self.device_id {
            if job.device_id.as_deref() != Some(device.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if job.status != status {
                return false;
            }
        }
        true
    }
}

#[derive(Debug)]
struct Entry {
    /// Submission order, used for stable listing.
    seq: u64,
    job: Job,
}

/// Table of all known jobs, keyed by id.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: HashMap<JobId, Entry>,
    next_seq: u64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `queued` entry for a fresh id.
    pub fn insert(&mut self, id: JobId, request: SubmitRequest, output_path: PathBuf) -> &Job {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = self.entries.entry(id).or_insert(Entry {
            seq,
            job: Job::new(id, request, output_path),
        });
        &entry.job
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.entries.get(&id).map(|e| &e.job)
    }

    pub(crate) fn get_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.entries.get_mut(&id).map(|e| &mut e.job)
    }

    /// Remove an entry, returning it if it existed.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        self.entries.remove(&id).map(|e| e.job)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshots of matching jobs in submission order.
    pub fn list(&self, filter: &JobFilter) -> Vec<Job> {
        let mut entries: Vec<&Entry> = self
            .entries
            .values()
            .filter(|e| filter.matches(&e.job))
            .collect();
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.job.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.entries.values().map(|e| &e.job)
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.iter().filter(|j| j.status == status).count()
    }

    pub fn running_count(&self) -> usize {
        self.count(JobStatus::Running)
    }

    /// Apply `f` to the job if present, returning whether it changed state.
    pub(crate) fn update(&mut self, id: JobId, f: impl FnOnce(&mut Job) -> bool) -> bool {
        self.get_mut(id).map(f).unwrap_or(false)
    }
}
