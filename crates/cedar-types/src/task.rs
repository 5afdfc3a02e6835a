//! Tasks scored by expected free energy.
//!
//! A task carries the raw terms of its EFE score; the reactive level
//! recomputes `efe` every cycle from current uncertainty, value and
//! urgency instead of assigning a fixed priority once.

use crate::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique task identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task lifecycle status. Tasks only ever move forward into a terminal
/// status; they are retained for audit and metrics, never deleted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Suspended,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Suspended => "suspended",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Submission-time options for a task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskOptions {
    /// Expected information gain from performing the task.
    pub info_gain: f64,
    /// Alignment with current goals, in [0, 1]. Ambiguity is `1 -
    /// pragmatic_value`.
    pub pragmatic_value: f64,
    /// Expected cost of failure.
    pub risk: f64,
    /// Level whose scheduler owns the task.
    pub level: Level,
    /// Whether an interrupt may pre-empt this task while running.
    pub preemptible: bool,
    /// Optional hard deadline. Approaching deadlines lower EFE in
    /// fixed steps.
    pub deadline: Option<DateTime<Utc>>,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            info_gain: 0.0,
            pragmatic_value: 0.5,
            risk: 0.0,
            level: Level::Reactive,
            preemptible: true,
            deadline: None,
        }
    }
}

/// A unit of work tracked by the kernel.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Free-text goal. Opaque to the kernel.
    pub goal: String,
    /// Opaque key/value context.
    pub context: HashMap<String, String>,
    /// Current EFE score; lower is scheduled sooner. Recomputed every
    /// cycle by the reactive level.
    pub efe: f64,
    pub info_gain: f64,
    pub pragmatic_value: f64,
    pub risk: f64,
    pub level: Level,
    pub preemptible: bool,
    pub deadline: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    /// Result recorded on completion.
    pub result: Option<String>,
    /// Error recorded on failure.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(goal: impl Into<String>, context: HashMap<String, String>, options: TaskOptions) -> Self {
        Self {
            id: TaskId::generate(),
            goal: goal.into(),
            context,
            efe: 0.0,
            info_gain: options.info_gain,
            pragmatic_value: options.pragmatic_value.clamp(0.0, 1.0),
            risk: options.risk,
            level: options.level,
            preemptible: options.preemptible,
            deadline: options.deadline,
            status: TaskStatus::Queued,
            result: None,
            error: None,
            created_at: Utc::now(),
            scheduled_at: None,
            finished_at: None,
        }
    }

    /// Whether the scheduler should still consider this task.
    pub fn is_schedulable(&self) -> bool {
        matches!(
            self.status,
            TaskStatus::Queued | TaskStatus::Running | TaskStatus::Suspended
        )
    }

    pub fn mark_running(&mut self) {
        self.status = TaskStatus::Running;
        if self.scheduled_at.is_none() {
            self.scheduled_at = Some(Utc::now());
        }
    }

    pub fn suspend(&mut self) {
        self.status = TaskStatus::Suspended;
    }

    pub fn complete(&mut self, result: impl Into<String>) {
        self.status = TaskStatus::Completed;
        self.result = Some(result.into());
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task() -> Task {
        Task::new("test goal", HashMap::new(), TaskOptions::default())
    }

    #[test]
    fn new_task_is_queued() {
        let task = make_task();
        assert_eq!(task.status, TaskStatus::Queued);
        assert!(task.is_schedulable());
        assert!(!task.status.is_terminal());
    }

    #[test]
    fn completed_task_keeps_result() {
        let mut task = make_task();
        task.mark_running();
        task.complete("done");
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("done"));
        assert!(task.finished_at.is_some());
        assert!(!task.is_schedulable());
    }

    #[test]
    fn failed_task_keeps_error() {
        let mut task = make_task();
        task.fail("boom");
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[test]
    fn pragmatic_value_is_clamped() {
        let task = Task::new(
            "g",
            HashMap::new(),
            TaskOptions {
                pragmatic_value: 2.0,
                ..TaskOptions::default()
            },
        );
        assert_eq!(task.pragmatic_value, 1.0);
    }

    #[test]
    fn suspended_task_is_still_schedulable() {
        let mut task = make_task();
        task.mark_running();
        task.suspend();
        assert!(task.is_schedulable());
    }
}
