//! Executive level (L4): self-model, goals, policy revision.
//!
//! The slowest level. Maintains a goal table and a self-model, runs a
//! slow precision-weighted correction of its two tracked predictions,
//! and may request self-modification. The request is only advisory:
//! the orchestrator must additionally confirm external stability
//! before entering the self-improving mode.

use cedar_types::{KernelMode, PredictionError, TrackedPrediction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slow correction rate for the executive's tracked predictions.
const LEARNING_RATE: f64 = 0.05;

/// Damping applied to the total-system-FE term of the level's own FE.
const SYSTEM_FE_DAMPING: f64 = 0.3;

/// A goal under executive management.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Goal {
    pub id: String,
    pub description: String,
    /// Relative importance, in [0, 1].
    pub priority: f64,
    /// Progress toward completion, in [0, 1].
    pub progress: f64,
    pub deadline: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(id: impl Into<String>, description: impl Into<String>, priority: f64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            priority: priority.clamp(0.0, 1.0),
            progress: 0.0,
            deadline: None,
        }
    }
}

/// The executive's model of the system itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelfModel {
    pub capabilities: Vec<String>,
    pub limitations: Vec<String>,
    pub values: Vec<String>,
    /// How settled the self-model is, in [0, 1].
    pub identity_strength: f64,
}

impl Default for SelfModel {
    fn default() -> Self {
        Self {
            capabilities: vec!["task scheduling".into(), "fault recovery".into()],
            limitations: vec!["no direct world access".into()],
            values: vec!["stability".into(), "efficiency".into()],
            identity_strength: 0.5,
        }
    }
}

/// Advisory policy revision, chosen from the dominant error category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyUpdate {
    IncreaseStrategyComplexity,
    ReviseGoals,
    IncreaseExploration,
}

/// The downward predictions L4 sends to L3.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ExecutivePredictions {
    pub system_stability: f64,
    pub goal_achievement_rate: f64,
}

/// System-wide context the orchestrator passes down to L4.
#[derive(Clone, Copy, Debug)]
pub struct SystemState {
    pub total_free_energy: f64,
    /// Externally supplied consciousness/integration proxy.
    pub phi: f64,
    pub mode: KernelMode,
}

/// Advisory executive actions.
#[derive(Clone, Debug)]
pub struct ExecutiveActions {
    /// Requested only when FE > the threshold AND phi > the phi gate.
    /// The orchestrator applies a third, external stability check.
    pub self_modify: bool,
    pub policy_update: Option<PolicyUpdate>,
}

/// Output of one executive step.
#[derive(Clone, Debug)]
pub struct ExecutiveOutput {
    pub actions: ExecutiveActions,
    pub predictions_for_l3: ExecutivePredictions,
}

/// The executive level.
#[derive(Clone, Debug)]
pub struct ExecutiveLevel {
    goals: Vec<Goal>,
    self_model: SelfModel,
    stability: TrackedPrediction,
    achievement: TrackedPrediction,
    /// FE above which self-modification may be requested.
    fe_threshold: f64,
    /// Phi gate for self-modification requests.
    phi_threshold: f64,
    /// FE below which no policy update is issued. The executive has
    /// nothing above it to explain errors away to, so this plays the
    /// suppression role the lower levels' thresholds play.
    policy_threshold: f64,
    free_energy: f64,
}

impl ExecutiveLevel {
    pub fn new(fe_threshold: f64, phi_threshold: f64, policy_threshold: f64) -> Self {
        Self {
            goals: Vec::new(),
            self_model: SelfModel::default(),
            stability: TrackedPrediction::new(0.8, 1.0),
            achievement: TrackedPrediction::new(0.5, 1.0),
            fe_threshold,
            phi_threshold,
            policy_threshold,
            free_energy: 0.0,
        }
    }

    pub fn free_energy(&self) -> f64 {
        self.free_energy
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn self_model(&self) -> &SelfModel {
        &self.self_model
    }

    pub fn predictions(&self) -> ExecutivePredictions {
        ExecutivePredictions {
            system_stability: self.stability.predicted(),
            goal_achievement_rate: self.achievement.predicted(),
        }
    }

    pub fn add_goal(&mut self, goal: Goal) {
        self.goals.push(goal);
    }

    /// Update progress on a goal. Unknown ids are ignored.
    pub fn update_goal_progress(&mut self, goal_id: &str, progress: f64) {
        if let Some(goal) = self.goals.iter_mut().find(|g| g.id == goal_id) {
            goal.progress = progress.clamp(0.0, 1.0);
        }
    }

    /// One executive cycle.
    pub fn step(&mut self, l3_errors: &[PredictionError], state: &SystemState) -> ExecutiveOutput {
        // ── Level free energy: three terms ───────────────────────────
        let unexplained: f64 = l3_errors.iter().map(PredictionError::weighted).sum();
        let goal_deviation = if self.goals.is_empty() {
            0.0
        } else {
            self.goals
                .iter()
                .map(|g| g.priority * (1.0 - g.progress))
                .sum::<f64>()
                / self.goals.len() as f64
        };
        self.free_energy = unexplained + goal_deviation + SYSTEM_FE_DAMPING * state.total_free_energy;

        // ── Slow Bayesian-style correction ───────────────────────────
        // Observed stability falls as total system FE rises; observed
        // achievement is mean goal progress.
        let observed_stability = (1.0 - state.total_free_energy.min(1.0)).max(0.0);
        self.stability.observe(observed_stability, LEARNING_RATE);

        if !self.goals.is_empty() {
            let observed_achievement =
                self.goals.iter().map(|g| g.progress).sum::<f64>() / self.goals.len() as f64;
            self.achievement.observe(observed_achievement, LEARNING_RATE);
        }

        // ── Advisory actions ─────────────────────────────────────────
        let self_modify = self.free_energy > self.fe_threshold && state.phi > self.phi_threshold;

        let policy_update = if self.free_energy < self.policy_threshold {
            None
        } else if unexplained > goal_deviation && unexplained > SYSTEM_FE_DAMPING * state.total_free_energy
        {
            Some(PolicyUpdate::IncreaseStrategyComplexity)
        } else if goal_deviation >= unexplained && goal_deviation > 0.0 {
            Some(PolicyUpdate::ReviseGoals)
        } else {
            Some(PolicyUpdate::IncreaseExploration)
        };

        ExecutiveOutput {
            actions: ExecutiveActions {
                self_modify,
                policy_update,
            },
            predictions_for_l3: self.predictions(),
        }
    }
}

impl Default for ExecutiveLevel {
    fn default() -> Self {
        Self::new(1.5, 0.6, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedar_types::Level;

    fn l3_error(magnitude: f64, precision: f64) -> PredictionError {
        PredictionError::new(Level::Cognitive, Level::Executive, magnitude, precision, "e")
    }

    fn calm_state() -> SystemState {
        SystemState {
            total_free_energy: 0.1,
            phi: 0.3,
            mode: KernelMode::Awake,
        }
    }

    #[test]
    fn free_energy_sums_three_terms() {
        let mut level = ExecutiveLevel::default();
        let mut goal = Goal::new("g1", "test goal", 1.0);
        goal.progress = 0.5;
        level.add_goal(goal);

        let state = SystemState {
            total_free_energy: 1.0,
            phi: 0.0,
            mode: KernelMode::Awake,
        };
        level.step(&[l3_error(0.5, 2.0)], &state);

        // unexplained 1.0 + goal deviation 0.5 + 0.3 * 1.0
        assert!((level.free_energy() - 1.8).abs() < 1e-9);
    }

    #[test]
    fn self_modify_requires_both_fe_and_phi() {
        let mut level = ExecutiveLevel::default();
        let heavy = vec![l3_error(1.0, 2.0)]; // unexplained 2.0 > 1.5

        // High FE, low phi: no request.
        let out = level.step(&heavy, &calm_state());
        assert!(!out.actions.self_modify);

        // High FE, high phi: request.
        let state = SystemState {
            phi: 0.9,
            ..calm_state()
        };
        let out = level.step(&heavy, &state);
        assert!(out.actions.self_modify);

        // Low FE, high phi: no request.
        let mut calm_level = ExecutiveLevel::default();
        let out = calm_level.step(&[], &state);
        assert!(!out.actions.self_modify);
    }

    #[test]
    fn stability_prediction_corrects_slowly() {
        let mut level = ExecutiveLevel::default();
        let before = level.predictions().system_stability;

        let state = SystemState {
            total_free_energy: 1.0, // observed stability 0.0
            phi: 0.0,
            mode: KernelMode::Awake,
        };
        level.step(&[], &state);
        let after = level.predictions().system_stability;

        assert!(after < before);
        // Learning rate 0.05: a single step moves at most 5% of the gap.
        assert!((before - after) <= 0.05 * before + 1e-9);
    }

    #[test]
    fn dominant_unexplained_errors_suggest_strategy_complexity() {
        let mut level = ExecutiveLevel::default();
        let out = level.step(&[l3_error(0.8, 1.0)], &calm_state());
        assert_eq!(
            out.actions.policy_update,
            Some(PolicyUpdate::IncreaseStrategyComplexity)
        );
    }

    #[test]
    fn dominant_goal_deviation_suggests_goal_revision() {
        let mut level = ExecutiveLevel::default();
        level.add_goal(Goal::new("g1", "stalled goal", 1.0)); // progress 0
        let out = level.step(&[], &SystemState {
            total_free_energy: 0.2,
            phi: 0.0,
            mode: KernelMode::Awake,
        });
        assert_eq!(out.actions.policy_update, Some(PolicyUpdate::ReviseGoals));
    }

    #[test]
    fn calm_system_suggests_no_policy_update() {
        let mut level = ExecutiveLevel::default();
        let out = level.step(&[], &calm_state());
        assert_eq!(out.actions.policy_update, None);
    }

    #[test]
    fn goal_progress_updates_are_clamped() {
        let mut level = ExecutiveLevel::default();
        level.add_goal(Goal::new("g1", "goal", 0.5));
        level.update_goal_progress("g1", 1.7);
        assert_eq!(level.goals()[0].progress, 1.0);
    }
}
