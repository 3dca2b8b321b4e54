//! # Run Window
//!
//! Plays the host scheduler's role for a range of partitions: dates run in
//! ascending calendar order, one at a time, and D+1 never starts before D has
//! finished. With `depends_on_past` the first failed date stops the window and
//! every later date is reported as blocked.

use crate::config::{ConfigurationError, ScheduleConfig};
use crate::constants::events;
use crate::error::PipelineResult;
use crate::orchestration::pipeline::{IngestPipeline, RunReport};
use crate::partition::PartitionKey;
use crate::state_machine::RunState;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

/// Inclusive range of partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunWindow {
    start: PartitionKey,
    end: PartitionKey,
}

impl RunWindow {
    pub fn new(start: PartitionKey, end: PartitionKey) -> PipelineResult<Self> {
        if end < start {
            return Err(ConfigurationError::invalid_value(
                "window.end",
                end.to_string(),
                format!("end must not be before start {start}"),
            )
            .into());
        }
        Ok(Self { start, end })
    }

    pub fn single(partition: PartitionKey) -> Self {
        Self {
            start: partition,
            end: partition,
        }
    }

    /// Window the scheduler would run as of `today`.
    ///
    /// The end is the configured end date, capped at the last complete day.
    /// Without catchup only the latest partition is kept. `None` when the
    /// schedule has nothing due yet.
    pub fn from_schedule(schedule: &ScheduleConfig, today: NaiveDate) -> Option<Self> {
        let last_complete = today.pred_opt()?;
        let end = schedule
            .end_date
            .map_or(last_complete, |end| end.min(last_complete));
        if end < schedule.start_date {
            return None;
        }

        let end = PartitionKey::new(end);
        if schedule.catchup {
            Some(Self {
                start: PartitionKey::new(schedule.start_date),
                end,
            })
        } else {
            Some(Self::single(end))
        }
    }

    pub fn start(&self) -> PartitionKey {
        self.start
    }

    pub fn end(&self) -> PartitionKey {
        self.end
    }

    /// Partitions in ascending order
    pub fn partitions(&self) -> Vec<PartitionKey> {
        let mut out = Vec::new();
        let mut current = Some(self.start);
        while let Some(partition) = current.filter(|p| *p <= self.end) {
            out.push(partition);
            current = partition.next();
        }
        out
    }

    pub fn len(&self) -> usize {
        self.partitions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PartitionOutcome {
    Completed { state: RunState },
    Failed { category: String, reason: String },
    /// Not run because an earlier partition failed
    Blocked { by: PartitionKey },
}

impl PartitionOutcome {
    fn from_report(report: &RunReport) -> Self {
        match &report.failure {
            Some(err) => Self::Failed {
                category: err.category().to_string(),
                reason: err.to_string(),
            },
            None => Self::Completed {
                state: report.final_state,
            },
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WindowReport {
    pub outcomes: Vec<(PartitionKey, PartitionOutcome)>,
}

impl WindowReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_completed())
    }

    pub fn completed(&self) -> usize {
        self.count(|o| o.is_completed())
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PartitionOutcome::Failed { .. }))
    }

    pub fn blocked(&self) -> usize {
        self.count(|o| matches!(o, PartitionOutcome::Blocked { .. }))
    }

    pub fn first_failure(&self) -> Option<PartitionKey> {
        self.outcomes
            .iter()
            .find(|(_, o)| matches!(o, PartitionOutcome::Failed { .. }))
            .map(|(p, _)| *p)
    }

    fn count(&self, pred: impl Fn(&PartitionOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

pub struct WindowRunner<'a> {
    pipeline: &'a IngestPipeline,
    depends_on_past: bool,
}

impl<'a> WindowRunner<'a> {
    pub fn new(pipeline: &'a IngestPipeline) -> Self {
        Self {
            depends_on_past: pipeline.config().schedule.depends_on_past,
            pipeline,
        }
    }

    pub fn depends_on_past(mut self, enabled: bool) -> Self {
        self.depends_on_past = enabled;
        self
    }

    pub async fn run(&self, window: &RunWindow) -> WindowReport {
        let mut report = WindowReport::default();
        let mut blocked_by: Option<PartitionKey> = None;

        for partition in window.partitions() {
            if let Some(failed) = blocked_by {
                info!(
                    event = events::RUN_BLOCKED,
                    partition = %partition,
                    blocked_by = %failed,
                    "Skipping partition after earlier failure"
                );
                report
                    .outcomes
                    .push((partition, PartitionOutcome::Blocked { by: failed }));
                continue;
            }

            let run = self.pipeline.run(partition).await;
            let outcome = PartitionOutcome::from_report(&run);

            if let PartitionOutcome::Failed { category, .. } = &outcome {
                warn!(
                    partition = %partition,
                    category = %category,
                    depends_on_past = self.depends_on_past,
                    "Partition run failed"
                );
                if self.depends_on_past {
                    blocked_by = Some(partition);
                }
            }
            report.outcomes.push((partition, outcome));
        }

        info!(
            start = %window.start(),
            end = %window.end(),
            completed = report.completed(),
            failed = report.failed(),
            blocked = report.blocked(),
            "Window finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn key(s: &str) -> PartitionKey {
        PartitionKey::parse(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        key(s).date()
    }

    #[test]
    fn test_partitions_are_ascending_and_inclusive() {
        let window = RunWindow::new(key("2023-12-30"), key("2024-01-02")).unwrap();
        let days: Vec<String> = window.partitions().iter().map(|p| p.to_string()).collect();
        assert_eq!(
            days,
            vec!["2023-12-30", "2023-12-31", "2024-01-01", "2024-01-02"]
        );
        assert_eq!(window.len(), 4);
        assert_eq!(RunWindow::single(key("2024-01-05")).len(), 1);
    }

    #[test]
    fn test_reversed_window_is_rejected() {
        assert!(RunWindow::new(key("2024-01-06"), key("2024-01-05")).is_err());
    }

    #[test]
    fn test_schedule_window_is_capped_at_yesterday() {
        let mut schedule = PipelineConfig::default().schedule;
        schedule.end_date = None;

        let window = RunWindow::from_schedule(&schedule, date("2024-01-08")).unwrap();
        assert_eq!(window.start(), key("2024-01-05"));
        assert_eq!(window.end(), key("2024-01-07"));

        schedule.end_date = Some(date("2024-01-06"));
        let window = RunWindow::from_schedule(&schedule, date("2024-02-01")).unwrap();
        assert_eq!(window.end(), key("2024-01-06"));

        assert!(RunWindow::from_schedule(&schedule, date("2024-01-05")).is_none());
    }

    #[test]
    fn test_schedule_without_catchup_runs_latest_only() {
        let mut schedule = PipelineConfig::default().schedule;
        schedule.catchup = false;

        let window = RunWindow::from_schedule(&schedule, date("2024-03-01")).unwrap();
        assert_eq!(window.partitions(), vec![key("2024-01-06")]);
    }
}
