use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use crate::store::format_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
    Unknown,
}

/// Status of a named background job, as reported by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub status: JobState,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl JobStatus {
    fn unknown(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: JobState::Unknown,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

/// In-memory job registry. Only the latest run of each job is kept.
#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl JobTracker {
    /// Mark `name` as running. Returns false if it already is.
    pub fn try_start(&self, name: &str) -> bool {
        let mut jobs = self.jobs.write();
        if jobs.get(name).is_some_and(|j| j.status == JobState::Running) {
            return false;
        }
        jobs.insert(
            name.to_string(),
            JobStatus {
                name: name.to_string(),
                status: JobState::Running,
                started_at: Some(format_timestamp(Utc::now())),
                completed_at: None,
                result: None,
                error: None,
            },
        );
        true
    }

    pub fn complete(&self, name: &str, result: serde_json::Value) {
        self.finish(name, JobState::Completed, Some(result), None);
    }

    pub fn fail(&self, name: &str, error: String) {
        self.finish(name, JobState::Failed, None, Some(error));
    }

    fn finish(&self, name: &str, status: JobState, result: Option<serde_json::Value>, error: Option<String>) {
        let mut jobs = self.jobs.write();
        let job = jobs
            .entry(name.to_string())
            .or_insert_with(|| JobStatus::unknown(name));
        job.status = status;
        job.completed_at = Some(format_timestamp(Utc::now()));
        job.result = result;
        job.error = error;
    }

    pub fn status(&self, name: &str) -> JobStatus {
        self.jobs
            .read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| JobStatus::unknown(name))
    }
}
