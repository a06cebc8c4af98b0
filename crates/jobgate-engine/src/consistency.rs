//! Lifecycle timestamp consistency checks over stored job records.

use jobgate_core::JobId;

use crate::model::{JobRecord, JobStatus};

/// Progress is logged every this many records.
pub const PROGRESS_INTERVAL: usize = 500;

/// Result of [`check_finish_times`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinishTimeReport {
    pub checked: usize,
    /// Jobs in a terminal status without a `finished` timestamp.
    pub missing_finished: Vec<JobId>,
    /// Running jobs without a `running` timestamp.
    pub missing_running: Vec<JobId>,
}

impl FinishTimeReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_finished.is_empty() && self.missing_running.is_empty()
    }
}

/// Check that finished jobs carry a `finished` timestamp and running jobs a
/// `running` timestamp.
pub fn check_finish_times<'a, I>(records: I) -> FinishTimeReport
where
    I: IntoIterator<Item = &'a JobRecord>,
{
    let mut report = FinishTimeReport::default();

    for record in records {
        report.checked += 1;
        if report.checked % PROGRESS_INTERVAL == 0 {
            tracing::info!(processed = report.checked, "Checking job finish times");
        }

        if record.status.is_terminal() && record.finished.is_none() {
            tracing::warn!(job_id = %record.job_id, status = %record.status, "Finished job has no end time");
            report.missing_finished.push(record.job_id.clone());
        }

        if record.status == JobStatus::Running && record.running.is_none() {
            tracing::warn!(job_id = %record.job_id, "Running job has no run time");
            report.missing_running.push(record.job_id.clone());
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobgate_core::CallerId;

    fn record(id: &str, status: JobStatus) -> JobRecord {
        let mut record = JobRecord::new(JobId::new(id).unwrap(), CallerId::new("alice"), 1.0);
        record.status = status;
        record
    }

    #[test]
    fn test_consistent_records() {
        let mut done = record("a", JobStatus::Completed);
        done.finished = Some(10.0);
        let mut running = record("b", JobStatus::Running);
        running.running = Some(5.0);
        let queued = record("c", JobStatus::Queued);

        let report = check_finish_times([&done, &running, &queued]);
        assert_eq!(report.checked, 3);
        assert!(report.is_consistent());
    }

    #[test]
    fn test_reports_missing_timestamps() {
        let records = vec![
            record("err", JobStatus::Error),
            record("term", JobStatus::Terminated),
            record("run", JobStatus::Running),
        ];

        let report = check_finish_times(&records);
        assert!(!report.is_consistent());
        let ids: Vec<&str> = report.missing_finished.iter().map(JobId::as_str).collect();
        assert_eq!(ids, ["err", "term"]);
        assert_eq!(report.missing_running[0].as_str(), "run");
    }
}
