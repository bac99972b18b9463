//! Job tracker (C11, spec §4.9): durable per-job JSON files under
//! `jobs/<id>.json`, with an optional sibling `<id>.pid` for cancellation.
//! New work — the teacher's indexing is a one-shot CLI run with nothing to
//! persist — following the same "write one JSON file, atomic replace" idiom
//! as `registry.rs`/the teacher's `init.rs`.

use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;
use uuid::Uuid;

use crate::config::atomic_write;
use crate::error::{Error, Result};
use crate::types::{Job, JobStatus, JobType};

pub struct JobTracker {
    jobs_dir: PathBuf,
}

impl JobTracker {
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let jobs_dir = data_dir.into().join("jobs");
        std::fs::create_dir_all(&jobs_dir)?;
        Ok(JobTracker { jobs_dir })
    }

    fn job_path(&self, id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{id}.json"))
    }

    fn pid_path(&self, id: &str) -> PathBuf {
        self.jobs_dir.join(format!("{id}.pid"))
    }

    pub fn create_job(&self, job_type: JobType, message: impl Into<String>) -> Result<Job> {
        let now = now_iso8601();
        let job = Job {
            id: Uuid::new_v4().simple().to_string(),
            job_type,
            status: JobStatus::Pending,
            progress: 0,
            message: message.into(),
            details: HashMap::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.write_job(&job)?;
        Ok(job)
    }

    fn write_job(&self, job: &Job) -> Result<()> {
        let text = serde_json::to_string_pretty(job)?;
        atomic_write(&self.job_path(&job.id), text.as_bytes())
    }

    pub fn get_job(&self, id: &str) -> Result<Job> {
        let path = self.job_path(id);
        if !path.exists() {
            return Err(Error::NotFound(format!("job {id} not found")));
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fields are merged; `details` is shallow-merged (spec §4.9). Terminal
    /// states are immutable except via `cleanup_old_jobs`.
    pub fn update_job(
        &self,
        id: &str,
        status: Option<JobStatus>,
        progress: Option<u8>,
        message: Option<String>,
        details: Option<HashMap<String, Value>>,
    ) -> Result<Job> {
        let mut job = self.get_job(id)?;
        if job.status.is_terminal() {
            return Err(Error::Invalid(format!("job {id} is already in a terminal state")));
        }
        if let Some(s) = status {
            job.status = s;
        }
        if let Some(p) = progress {
            job.progress = p.min(100);
        }
        if let Some(m) = message {
            job.message = m;
        }
        if let Some(d) = details {
            for (k, v) in d {
                job.details.insert(k, v);
            }
        }
        job.updated_at = now_iso8601();
        self.write_job(&job)?;
        Ok(job)
    }

    pub fn list_jobs(&self, status_filter: Option<JobStatus>) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for entry in std::fs::read_dir(&self.jobs_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let text = std::fs::read_to_string(&path)?;
            if let Ok(job) = serde_json::from_str::<Job>(&text) {
                if status_filter.map(|f| f == job.status).unwrap_or(true) {
                    jobs.push(job);
                }
            }
        }
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(jobs)
    }

    pub fn list_active_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.list_jobs(None)?.into_iter().filter(|j| j.status.is_active()).collect())
    }

    /// Transition to `cancelled`; if a `<id>.pid` file exists and parses as
    /// a positive integer, send it a termination signal (spec §4.9).
    pub fn cancel_job(&self, id: &str) -> Result<Job> {
        let job = self.update_job(id, Some(JobStatus::Cancelled), None, None, None)?;
        let pid_path = self.pid_path(id);
        if let Ok(text) = std::fs::read_to_string(&pid_path) {
            if let Ok(pid) = text.trim().parse::<i32>() {
                if pid > 0 {
                    signal_terminate(pid);
                }
            }
        }
        Ok(job)
    }

    pub fn cleanup_old_jobs(&self, older_than_hours: u64) -> Result<usize> {
        let cutoff = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .saturating_sub(older_than_hours * 3600);
        let mut removed = 0;
        for job in self.list_jobs(None)? {
            if !job.status.is_terminal() {
                continue;
            }
            if let Ok(updated_secs) = job.updated_at.parse::<u64>() {
                if updated_secs < cutoff {
                    let _ = std::fs::remove_file(self.job_path(&job.id));
                    let _ = std::fs::remove_file(self.pid_path(&job.id));
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn write_pid(&self, id: &str, pid: i32) -> Result<()> {
        std::fs::write(self.pid_path(id), pid.to_string())?;
        Ok(())
    }
}

#[cfg(unix)]
fn signal_terminate(pid: i32) {
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn signal_terminate(_pid: i32) {}

fn now_iso8601() -> String {
    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_get_update_round_trip() {
        let dir = tempdir().unwrap();
        let tracker = JobTracker::open(dir.path()).unwrap();
        let job = tracker.create_job(JobType::Index, "starting").unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let updated = tracker.update_job(&job.id, Some(JobStatus::Running), Some(50), None, None).unwrap();
        assert_eq!(updated.status, JobStatus::Running);
        assert_eq!(updated.progress, 50);

        let fetched = tracker.get_job(&job.id).unwrap();
        assert_eq!(fetched.progress, 50);
    }

    #[test]
    fn cancel_transitions_and_persists() {
        let dir = tempdir().unwrap();
        let tracker = JobTracker::open(dir.path()).unwrap();
        let job = tracker.create_job(JobType::Index, "starting").unwrap();
        tracker.cancel_job(&job.id).unwrap();
        let fetched = tracker.get_job(&job.id).unwrap();
        assert_eq!(fetched.status, JobStatus::Cancelled);
    }

    #[test]
    fn terminal_jobs_cannot_be_updated() {
        let dir = tempdir().unwrap();
        let tracker = JobTracker::open(dir.path()).unwrap();
        let job = tracker.create_job(JobType::Index, "starting").unwrap();
        tracker.update_job(&job.id, Some(JobStatus::Completed), None, None, None).unwrap();
        let err = tracker.update_job(&job.id, Some(JobStatus::Running), None, None, None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Invalid);
    }

    #[test]
    fn list_active_jobs_excludes_terminal() {
        let dir = tempdir().unwrap();
        let tracker = JobTracker::open(dir.path()).unwrap();
        let a = tracker.create_job(JobType::Index, "a").unwrap();
        let b = tracker.create_job(JobType::Clone, "b").unwrap();
        tracker.update_job(&b.id, Some(JobStatus::Completed), None, None, None).unwrap();

        let active = tracker.list_active_jobs().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, a.id);
    }

    #[test]
    fn details_are_shallow_merged() {
        let dir = tempdir().unwrap();
        let tracker = JobTracker::open(dir.path()).unwrap();
        let job = tracker.create_job(JobType::Index, "a").unwrap();

        let mut d1 = HashMap::new();
        d1.insert("filesScanned".to_string(), Value::from(10));
        tracker.update_job(&job.id, None, None, None, Some(d1)).unwrap();

        let mut d2 = HashMap::new();
        d2.insert("chunksCreated".to_string(), Value::from(42));
        let updated = tracker.update_job(&job.id, None, None, None, Some(d2)).unwrap();

        assert_eq!(updated.details.get("filesScanned"), Some(&Value::from(10)));
        assert_eq!(updated.details.get("chunksCreated"), Some(&Value::from(42)));
    }
}
