//! Reactive level (L2): EFE scheduling, allostasis, interrupts.
//!
//! The core of task scheduling: every cycle, every schedulable task is
//! re-scored by expected free energy and the lowest score is scheduled
//! next. There are no fixed priorities anywhere. Alongside scheduling,
//! L2 regulates resources through anticipatory (allostatic) setpoints,
//! maintains a simple emotional state, and proposes (never applies)
//! mode transitions.

use cedar_types::{KernelMode, Level, PredictionError, Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Samples of recent history kept per setpoint for trend projection.
const SETPOINT_HISTORY: usize = 10;

/// Precision assigned to L2's own forecast-mismatch errors.
const FORECAST_PRECISION: f64 = 1.0;

/// A task id with its freshly computed EFE score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub efe: f64,
}

/// An allostatic setpoint: anticipatory regulation of one resource.
///
/// Urgency is raised in proportion to the *predicted* deviation from
/// target, projected from the recent trend, not the current one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Setpoint {
    pub current: f64,
    pub predicted: f64,
    pub target: f64,
    pub urgency: f64,
    /// How many cycles ahead the trend is projected.
    pub anticipation_horizon: f64,
    history: VecDeque<f64>,
}

impl Setpoint {
    pub fn new(target: f64, anticipation_horizon: f64) -> Self {
        Self {
            current: target,
            predicted: target,
            target,
            urgency: 0.0,
            anticipation_horizon,
            history: VecDeque::with_capacity(SETPOINT_HISTORY),
        }
    }

    /// Record a new observation, project the trend forward, and update
    /// urgency from the predicted deviation.
    pub fn observe(&mut self, value: f64) {
        self.current = value;
        if self.history.len() == SETPOINT_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(value);

        let trend = match (self.history.front(), self.history.back()) {
            (Some(first), Some(last)) if self.history.len() > 1 => {
                (last - first) / (self.history.len() - 1) as f64
            }
            _ => 0.0,
        };
        self.predicted = value + trend * self.anticipation_horizon;

        let deviation = (self.predicted - self.target).abs();
        self.urgency = (deviation / self.target.max(f64::EPSILON)).clamp(0.0, 1.0);
    }
}

/// Fixed-shape resource setpoints tracked by L2.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AllostaticSetpoints {
    pub energy: Setpoint,
    pub load: Setpoint,
}

impl Default for AllostaticSetpoints {
    fn default() -> Self {
        Self {
            energy: Setpoint::new(0.7, 5.0),
            load: Setpoint::new(0.5, 5.0),
        }
    }
}

/// Valence/arousal pair derived from free energy and error pressure.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct EmotionalState {
    /// In [-1, 1]. Negative under high free energy.
    pub valence: f64,
    /// In [0, 1]. Grows with error count and free energy.
    pub arousal: f64,
}

/// A mode transition proposed by L2. The orchestrator decides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModeProposal {
    pub mode: KernelMode,
    pub reason: String,
}

/// An interrupt raised by a single high-weighted error.
#[derive(Clone, Debug)]
pub struct Interrupt {
    pub trigger: PredictionError,
    /// Running preemptible task to suspend, if any.
    pub preempted: Option<TaskId>,
}

/// The downward forecast L2 receives from L3. L2 does not invent its
/// own forecast of L3's behavior.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LoadForecast {
    pub expected_task_load: f64,
    pub expected_latency: f64,
}

impl Default for LoadForecast {
    fn default() -> Self {
        // Neutral placeholder used before L3 has ever run.
        Self {
            expected_task_load: 0.5,
            expected_latency: 1.0,
        }
    }
}

/// Output of one reactive step.
#[derive(Clone, Debug)]
pub struct ReactiveOutput {
    /// Unexplained errors addressed to L3.
    pub errors: Vec<PredictionError>,
    /// All schedulable tasks, ascending by EFE.
    pub schedule: Vec<ScheduledTask>,
    /// The task to run next (lowest EFE), if any.
    pub next_task: Option<TaskId>,
    pub interrupt: Option<Interrupt>,
    pub mode_proposal: Option<ModeProposal>,
    pub emotional_state: EmotionalState,
}

/// The reactive level.
#[derive(Clone, Debug)]
pub struct ReactiveLevel {
    setpoints: AllostaticSetpoints,
    emotional_state: EmotionalState,
    /// Errors with magnitude below this are explained away locally.
    suppression_threshold: f64,
    /// A single error whose magnitude x precision exceeds this fires
    /// an interrupt.
    interrupt_threshold: f64,
    free_energy: f64,
}

impl ReactiveLevel {
    pub fn new(suppression_threshold: f64, interrupt_threshold: f64) -> Self {
        Self {
            setpoints: AllostaticSetpoints::default(),
            emotional_state: EmotionalState::default(),
            suppression_threshold,
            interrupt_threshold,
            free_energy: 0.0,
        }
    }

    pub fn free_energy(&self) -> f64 {
        self.free_energy
    }

    pub fn emotional_state(&self) -> EmotionalState {
        self.emotional_state
    }

    pub fn setpoints(&self) -> &AllostaticSetpoints {
        &self.setpoints
    }

    /// Feed current resource readings into the allostatic setpoints.
    /// Called by the orchestrator before `step`.
    pub fn observe_resources(&mut self, energy: f64, load: f64) {
        self.setpoints.energy.observe(energy);
        self.setpoints.load.observe(load);
    }

    /// Compute a task's EFE at `now`.
    ///
    /// `efe = ambiguity + risk - info_gain - pragmatic_value -
    /// deadline_boost`, with `ambiguity = 1 - pragmatic_value`.
    pub fn compute_efe(task: &Task, now: DateTime<Utc>) -> f64 {
        let ambiguity = 1.0 - task.pragmatic_value;
        ambiguity + task.risk - task.info_gain - task.pragmatic_value - deadline_boost(task, now)
    }

    /// One reactive cycle.
    pub fn step(
        &mut self,
        l1_errors: &[PredictionError],
        forecast: &LoadForecast,
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> ReactiveOutput {
        // ── EFE scheduling ───────────────────────────────────────────
        let mut schedule: Vec<ScheduledTask> = tasks
            .iter()
            .filter(|t| t.is_schedulable())
            .map(|t| ScheduledTask {
                id: t.id,
                efe: Self::compute_efe(t, now),
            })
            .collect();
        schedule.sort_by(|a, b| a.efe.total_cmp(&b.efe));
        let next_task = schedule.first().map(|s| s.id);

        // ── Error accounting ─────────────────────────────────────────
        let mut free_energy: f64 = l1_errors.iter().map(PredictionError::weighted).sum();
        let mut errors: Vec<PredictionError> = l1_errors
            .iter()
            .filter(|e| e.magnitude >= self.suppression_threshold)
            .map(|e| e.escalated(Level::Reactive, Level::Cognitive))
            .collect();

        // Mismatch between L3's downward forecast and the observed
        // queue pressure is L2's own contribution upward.
        let observed_load = (schedule.len() as f64 / 10.0).min(1.0);
        let load_miss = (observed_load - forecast.expected_task_load).abs();
        free_energy += load_miss * FORECAST_PRECISION;
        if load_miss >= self.suppression_threshold {
            // The prefix carries the sign of the miss so L3 can adjust
            // its estimate in the right direction.
            let prefix = if observed_load > forecast.expected_task_load {
                "task_load_surge"
            } else {
                "task_load_slack"
            };
            errors.push(PredictionError::new(
                Level::Reactive,
                Level::Cognitive,
                load_miss,
                FORECAST_PRECISION,
                format!(
                    "{}: forecast {:.3}, observed {:.3}",
                    prefix, forecast.expected_task_load, observed_load
                ),
            ));
        }

        self.free_energy = free_energy;

        // ── Emotional state ──────────────────────────────────────────
        let bounded_fe = free_energy.min(1.0);
        let valence = 1.0 - 2.0 * bounded_fe;
        let arousal = (0.1 * l1_errors.len() as f64 + 0.5 * bounded_fe).clamp(0.0, 1.0);
        self.emotional_state = EmotionalState { valence, arousal };

        // ── Interrupts ───────────────────────────────────────────────
        let interrupt = l1_errors
            .iter()
            .find(|e| e.weighted() > self.interrupt_threshold)
            .map(|e| Interrupt {
                trigger: e.clone(),
                preempted: tasks
                    .iter()
                    .find(|t| t.status == cedar_types::TaskStatus::Running && t.preemptible)
                    .map(|t| t.id),
            });
        if let Some(i) = &interrupt {
            debug!(weighted = i.trigger.weighted(), "Interrupt threshold crossed");
        }

        // ── Mode proposals (evaluated, never forced) ─────────────────
        let mode_proposal = if arousal > 0.8 && valence < -0.5 {
            Some(ModeProposal {
                mode: KernelMode::Vigilant,
                reason: format!("arousal {:.2} with valence {:.2}", arousal, valence),
            })
        } else if self.setpoints.energy.urgency > 0.8 {
            Some(ModeProposal {
                mode: KernelMode::Dormant,
                reason: format!("energy urgency {:.2}", self.setpoints.energy.urgency),
            })
        } else if arousal < 0.1 && schedule.is_empty() {
            Some(ModeProposal {
                mode: KernelMode::Dormant,
                reason: "idle with empty queue".to_string(),
            })
        } else {
            None
        };

        ReactiveOutput {
            errors,
            schedule,
            next_task,
            interrupt,
            mode_proposal,
            emotional_state: self.emotional_state,
        }
    }
}

impl Default for ReactiveLevel {
    fn default() -> Self {
        Self::new(0.2, 3.0)
    }
}

/// Step function of time-to-deadline: urgent deadlines lower EFE in
/// fixed increments.
fn deadline_boost(task: &Task, now: DateTime<Utc>) -> f64 {
    let Some(deadline) = task.deadline else {
        return 0.0;
    };
    let remaining = deadline - now;
    if remaining < chrono::Duration::seconds(1) {
        2.0
    } else if remaining < chrono::Duration::seconds(5) {
        1.0
    } else if remaining < chrono::Duration::seconds(30) {
        0.3
    } else {
        0.0
    }
}
