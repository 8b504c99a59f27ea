//! In-memory job store keyed by job id.

use std::collections::{HashMap, VecDeque};

use uuid::Uuid;

use crate::types::{JobRecord, JobState, JobSummary};

/// Mapping from job id to status record, optimized for both iteration and lookup.
///
/// Has no locking of its own; [`crate::JobQueueClient`] owns it behind its mutex.
#[derive(Debug, Default)]
pub struct JobStore {
    /// Ids in insertion order (oldest first).
    order: VecDeque<Uuid>,
    /// Map from ID to record for O(1) lookup.
    records: HashMap<Uuid, JobRecord>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record.
    pub fn put(&mut self, record: JobRecord) {
        let id = record.id();
        if self.records.insert(id, record).is_none() {
            self.order.push_back(id);
        }
    }

    #[inline]
    pub fn get(&self, id: &Uuid) -> Option<&JobRecord> {
        self.records.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut JobRecord> {
        self.records.get_mut(id)
    }

    /// Summaries of every record owned by `owner`, in submission order.
    pub fn list_by_owner(&self, owner: &str) -> Vec<JobSummary> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|record| record.is_owned_by(owner))
            .map(JobRecord::summary)
            .collect()
    }

    /// Remove a record, returning it if it existed.
    pub fn delete(&mut self, id: &Uuid) -> Option<JobRecord> {
        let removed = self.records.remove(id)?;
        self.order.retain(|other| other != id);
        Some(removed)
    }

    pub fn running_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| r.state == JobState::Running)
            .count()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
