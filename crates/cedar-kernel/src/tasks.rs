//! The kernel task table.
//!
//! Owned exclusively by the orchestrator. Tasks are never deleted:
//! they transition to a terminal status and are retained for audit and
//! metrics. The reactive level sees read-only copies and returns fresh
//! EFE scores; only this table mutates task records.

use crate::{KernelError, KernelResult};
use cedar_levels::ScheduledTask;
use cedar_types::{Level, Task, TaskId, TaskOptions};
use std::collections::HashMap;

/// Task storage plus the most recent EFE schedule.
#[derive(Debug, Default)]
pub struct TaskTable {
    tasks: HashMap<TaskId, Task>,
    /// Schedulable task ids, ascending by EFE, from the last cycle.
    schedule: Vec<TaskId>,
}

impl TaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new queued task.
    pub fn submit(
        &mut self,
        goal: impl Into<String>,
        context: HashMap<String, String>,
        options: TaskOptions,
    ) -> TaskId {
        let task = Task::new(goal, context, options);
        let id = task.id;
        self.tasks.insert(id, task);
        id
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Read-only copies of all schedulable tasks, for the reactive
    /// level's input.
    pub fn schedulable_view(&self) -> Vec<Task> {
        self.tasks
            .values()
            .filter(|t| t.is_schedulable())
            .cloned()
            .collect()
    }

    /// Count of non-terminal tasks.
    pub fn active_count(&self) -> usize {
        self.tasks.values().filter(|t| t.is_schedulable()).count()
    }

    /// Apply a freshly computed schedule: store EFE scores, mark the
    /// head running, and demote a previously running task that lost
    /// its slot back to queued.
    pub fn apply_schedule(&mut self, schedule: &[ScheduledTask]) {
        for entry in schedule {
            if let Some(task) = self.tasks.get_mut(&entry.id) {
                task.efe = entry.efe;
            }
        }
        self.schedule = schedule.iter().map(|s| s.id).collect();

        let head = self.schedule.first().copied();
        for task in self.tasks.values_mut() {
            if !task.is_schedulable() {
                continue;
            }
            match (head, task.status) {
                (Some(next), _) if task.id == next => task.mark_running(),
                (_, cedar_types::TaskStatus::Running) => task.status = cedar_types::TaskStatus::Queued,
                _ => {}
            }
        }
    }

    /// Suspend a running task pre-empted by an interrupt.
    pub fn preempt(&mut self, id: &TaskId) {
        if let Some(task) = self.tasks.get_mut(id) {
            if task.preemptible {
                task.suspend();
            }
        }
    }

    /// Mark a task completed with its result.
    pub fn complete(&mut self, id: &TaskId, result: impl Into<String>) -> KernelResult<()> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or(KernelError::TaskNotFound(*id))?;
        if task.status.is_terminal() {
            return Err(KernelError::TaskAlreadyTerminal {
                id: *id,
                status: task.status,
            });
        }
        task.complete(result);
        Ok(())
    }

    /// Mark a task failed; returns the owning level so the caller can
    /// report the failure to the supervision tree.
    pub fn fail(&mut self, id: &TaskId, error: impl Into<String>) -> KernelResult<Level> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or(KernelError::TaskNotFound(*id))?;
        if task.status.is_terminal() {
            return Err(KernelError::TaskAlreadyTerminal {
                id: *id,
                status: task.status,
            });
        }
        task.fail(error);
        Ok(task.level)
    }

    /// The current schedule as full task records, ascending by EFE.
    pub fn schedule(&self) -> Vec<Task> {
        self.schedule
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.is_schedulable())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_types::TaskStatus;

    fn submit(table: &mut TaskTable) -> TaskId {
        table.submit("goal", HashMap::new(), TaskOptions::default())
    }

    #[test]
    fn submit_then_complete_round_trips() {
        let mut table = TaskTable::new();
        let id = submit(&mut table);

        table.complete(&id, "result payload").unwrap();
        let task = table.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("result payload"));
    }

    #[test]
    fn submit_then_fail_reports_owning_level() {
        let mut table = TaskTable::new();
        let id = table.submit(
            "goal",
            HashMap::new(),
            TaskOptions {
                level: Level::Cognitive,
                ..TaskOptions::default()
            },
        );

        let level = table.fail(&id, "exploded").unwrap();
        assert_eq!(level, Level::Cognitive);
        let task = table.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("exploded"));
    }

    #[test]
    fn double_completion_is_rejected() {
        let mut table = TaskTable::new();
        let id = submit(&mut table);
        table.complete(&id, "first").unwrap();

        let result = table.complete(&id, "second");
        assert!(matches!(
            result,
            Err(KernelError::TaskAlreadyTerminal { .. })
        ));
        // Original result retained.
        assert_eq!(table.get(&id).unwrap().result.as_deref(), Some("first"));
    }

    #[test]
    fn unknown_task_is_an_error() {
        let mut table = TaskTable::new();
        let ghost = TaskId::generate();
        assert!(matches!(
            table.complete(&ghost, "x"),
            Err(KernelError::TaskNotFound(_))
        ));
    }

    #[test]
    fn apply_schedule_marks_the_head_running() {
        let mut table = TaskTable::new();
        let a = submit(&mut table);
        let b = submit(&mut table);

        table.apply_schedule(&[
            ScheduledTask { id: b, efe: -1.0 },
            ScheduledTask { id: a, efe: 0.5 },
        ]);

        assert_eq!(table.get(&b).unwrap().status, TaskStatus::Running);
        assert_eq!(table.get(&a).unwrap().status, TaskStatus::Queued);
        assert!((table.get(&b).unwrap().efe - -1.0).abs() < 1e-12);
    }

    #[test]
    fn losing_the_slot_demotes_to_queued() {
        let mut table = TaskTable::new();
        let a = submit(&mut table);
        let b = submit(&mut table);

        table.apply_schedule(&[
            ScheduledTask { id: a, efe: 0.0 },
            ScheduledTask { id: b, efe: 1.0 },
        ]);
        assert_eq!(table.get(&a).unwrap().status, TaskStatus::Running);

        table.apply_schedule(&[
            ScheduledTask { id: b, efe: -2.0 },
            ScheduledTask { id: a, efe: 0.0 },
        ]);
        assert_eq!(table.get(&b).unwrap().status, TaskStatus::Running);
        assert_eq!(table.get(&a).unwrap().status, TaskStatus::Queued);
    }

    #[test]
    fn preempt_suspends_only_preemptible_tasks() {
        let mut table = TaskTable::new();
        let stubborn = table.submit(
            "goal",
            HashMap::new(),
            TaskOptions {
                preemptible: false,
                ..TaskOptions::default()
            },
        );
        table.apply_schedule(&[ScheduledTask {
            id: stubborn,
            efe: 0.0,
        }]);

        table.preempt(&stubborn);
        assert_eq!(table.get(&stubborn).unwrap().status, TaskStatus::Running);
    }

    #[test]
    fn schedule_omits_terminal_tasks() {
        let mut table = TaskTable::new();
        let a = submit(&mut table);
        let b = submit(&mut table);
        table.apply_schedule(&[
            ScheduledTask { id: a, efe: 0.0 },
            ScheduledTask { id: b, efe: 1.0 },
        ]);
        table.fail(&a, "gone").unwrap();

        let schedule = table.schedule();
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule[0].id, b);
    }
}
