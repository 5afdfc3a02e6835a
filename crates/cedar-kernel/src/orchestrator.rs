//! The kernel orchestrator.
//!
//! Owns the four levels, the supervision tree, the task table and the
//! free-energy history, and drives one synchronous cycle per tick.
//! Levels only propose; every mode mutation and every cross-level
//! hand-off happens here, in a fixed order that must be reproduced
//! exactly since each level's output is the next level's input within
//! the same tick.

use crate::budget::{project_fixed_sum, roi_gradient};
use crate::collaborators::{
    BudgetIntegrator, EconomicLedger, EconomySample, StabilityMonitor, SteadyStateMonitor,
};
use crate::config::KernelConfig;
use crate::error::{KernelError, KernelResult};
use crate::events::KernelEvent;
use crate::tasks::TaskTable;
use cedar_levels::{
    AutonomicLevel, CognitiveLevel, EmotionalState, ExecutiveLevel, Goal, LoadForecast,
    PolicyUpdate, ReactiveLevel, RestartScope, Strategy, SystemState, VitalObservations,
};
use cedar_supervision::{EscalationTarget, NodeId, SupervisionAction, SupervisionTree};
use cedar_types::{KernelMode, Level, PredictionError, Task, TaskId, TaskOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Ledger module ids for the four levels, in `Level::ALL` order.
const LEVEL_MODULES: [&str; 4] = [
    "level.autonomic",
    "level.reactive",
    "level.cognitive",
    "level.executive",
];

/// Inputs for one kernel cycle.
#[derive(Clone, Copy, Debug)]
pub struct CycleInputs {
    pub vitals: VitalObservations,
    /// Externally supplied consciousness/integration proxy.
    pub phi: f64,
    /// Economy sample for the steady-state monitor, if one is due.
    pub economy: Option<EconomySample>,
}

/// Per-level free energy of one cycle.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LevelFreeEnergies {
    pub autonomic: f64,
    pub reactive: f64,
    pub cognitive: f64,
    pub executive: f64,
}

impl LevelFreeEnergies {
    /// The fixed weighted sum defining total system free energy.
    pub fn weighted_total(&self) -> f64 {
        Level::Autonomic.fe_weight() * self.autonomic
            + Level::Reactive.fe_weight() * self.reactive
            + Level::Cognitive.fe_weight() * self.cognitive
            + Level::Executive.fe_weight() * self.executive
    }
}

/// Snapshot returned by `cycle` and broadcast to subscribers.
#[derive(Clone, Debug, Serialize)]
pub struct CycleState {
    pub cycle: u64,
    pub timestamp: DateTime<Utc>,
    pub mode: KernelMode,
    pub level_fe: LevelFreeEnergies,
    pub total_free_energy: f64,
    /// Task scheduled to run next (lowest EFE), if any.
    pub scheduled_task: Option<TaskId>,
    pub interrupted: bool,
    pub emotional_state: EmotionalState,
    pub strategy: Option<Strategy>,
    pub policy_update: Option<PolicyUpdate>,
    pub self_mod_requested: bool,
    pub self_mod_granted: bool,
    pub active_tasks: usize,
}

/// One sample in the bounded free-energy history.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct FreeEnergySample {
    pub cycle: u64,
    pub total: f64,
    pub timestamp: DateTime<Utc>,
}

/// Full diagnostic snapshot.
#[derive(Clone, Debug, Serialize)]
pub struct KernelStatus {
    pub running: bool,
    pub mode: KernelMode,
    pub cycle_count: u64,
    pub total_tasks: usize,
    pub active_tasks: usize,
    pub crash_log_len: usize,
    pub latest_total_fe: Option<f64>,
    pub allocations: Vec<f64>,
    pub history_len: usize,
}

/// The cedar kernel. Explicitly constructed and owned; there is no
/// process-wide default instance.
pub struct Kernel {
    config: KernelConfig,
    mode: KernelMode,
    running: bool,
    cycle_count: u64,

    autonomic: AutonomicLevel,
    reactive: ReactiveLevel,
    cognitive: CognitiveLevel,
    executive: ExecutiveLevel,

    tree: SupervisionTree,
    tasks: TaskTable,

    ledger: Box<dyn EconomicLedger>,
    stability: Box<dyn StabilityMonitor>,
    integrator: Box<dyn BudgetIntegrator>,
    steady_state: Box<dyn SteadyStateMonitor>,

    fe_history: VecDeque<FreeEnergySample>,
    prev_beliefs: Vec<f64>,
    /// L3's downward forecast from the previous cycle; neutral
    /// placeholder until L3 first runs.
    l3_forecast: LoadForecast,
    allocations: Vec<f64>,
    allocation_momentum: Vec<f64>,

    event_tx: broadcast::Sender<KernelEvent>,
}

impl Kernel {
    pub fn new(
        config: KernelConfig,
        mut ledger: Box<dyn EconomicLedger>,
        stability: Box<dyn StabilityMonitor>,
        integrator: Box<dyn BudgetIntegrator>,
        steady_state: Box<dyn SteadyStateMonitor>,
    ) -> Self {
        for module in LEVEL_MODULES {
            ledger.register_module(module);
        }
        let uniform = ledger.total_budget() / LEVEL_MODULES.len() as f64;
        let allocations = vec![uniform; LEVEL_MODULES.len()];
        ledger.set_allocations(&allocations);

        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        let autonomic = AutonomicLevel::new(config.thresholds.autonomic);
        let reactive = ReactiveLevel::new(config.thresholds.reactive, config.interrupt_threshold);
        let cognitive = CognitiveLevel::new(config.thresholds.cognitive);
        let executive = ExecutiveLevel::new(
            config.self_mod_fe_threshold,
            config.self_mod_phi_threshold,
            config.thresholds.executive,
        );

        let mut kernel = Self {
            config,
            mode: KernelMode::Awake,
            running: false,
            cycle_count: 0,
            autonomic,
            reactive,
            cognitive,
            executive,
            tree: SupervisionTree::default_topology(),
            tasks: TaskTable::new(),
            ledger,
            stability,
            integrator,
            steady_state,
            fe_history: VecDeque::new(),
            prev_beliefs: Vec::new(),
            l3_forecast: LoadForecast::default(),
            allocations,
            allocation_momentum: vec![0.0; LEVEL_MODULES.len()],
            event_tx,
        };
        kernel.prev_beliefs = kernel.beliefs();
        kernel
    }

    /// Subscribe to kernel events.
    pub fn subscribe(&self) -> broadcast::Receiver<KernelEvent> {
        self.event_tx.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn start(&mut self) -> KernelResult<()> {
        if self.running {
            return Err(KernelError::AlreadyRunning);
        }
        self.running = true;
        info!(mode = %self.mode, "Kernel started");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running = false;
        info!(cycles = self.cycle_count, "Kernel stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ── Mode ─────────────────────────────────────────────────────────

    pub fn mode(&self) -> KernelMode {
        self.mode
    }

    /// Host-initiated mode override.
    pub fn set_mode(&mut self, mode: KernelMode) {
        self.transition_mode(mode, "host override");
    }

    fn transition_mode(&mut self, to: KernelMode, reason: &str) {
        if self.mode == to {
            return;
        }
        let from = self.mode;
        self.mode = to;
        info!(from = %from, to = %to, reason, "Mode transition");
        let _ = self.event_tx.send(KernelEvent::ModeChanged {
            from,
            to,
            reason: reason.to_string(),
        });
    }

    // ── Tasks ────────────────────────────────────────────────────────

    pub fn submit_task(
        &mut self,
        goal: impl Into<String>,
        context: HashMap<String, String>,
        options: TaskOptions,
    ) -> TaskId {
        let id = self.tasks.submit(goal, context, options);
        debug!(task = %id, "Task submitted");
        id
    }

    pub fn complete_task(&mut self, id: &TaskId, result: impl Into<String>) -> KernelResult<()> {
        self.tasks.complete(id, result)?;
        debug!(task = %id, "Task completed");
        Ok(())
    }

    /// Fail a task and report the failure to the supervision tree
    /// keyed by the task's assigned level. Ordinary task failures
    /// accumulate toward a level-level restart decision.
    pub fn fail_task(&mut self, id: &TaskId, error: impl Into<String>) -> KernelResult<()> {
        let error = error.into();
        let level = self.tasks.fail(id, &error)?;
        warn!(task = %id, level = %level, error = %error, "Task failed");
        let node = SupervisionTree::node_for_level(level);
        self.report_crash(&node, &error)?;
        Ok(())
    }

    pub fn get_task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    /// The current schedule, ascending by EFE.
    pub fn get_schedule(&self) -> Vec<Task> {
        self.tasks.schedule()
    }

    // ── Goals ────────────────────────────────────────────────────────

    pub fn add_goal(&mut self, goal: Goal) {
        self.executive.add_goal(goal);
    }

    pub fn update_goal_progress(&mut self, goal_id: &str, progress: f64) {
        self.executive.update_goal_progress(goal_id, progress);
    }

    // ── Supervision ──────────────────────────────────────────────────

    /// Report a crash and apply the tree's decision, following
    /// escalations up the tree. Escalation past the root is terminal
    /// and surfaces as an error.
    pub fn handle_crash(&mut self, node: &NodeId, error: &str) -> KernelResult<SupervisionAction> {
        self.report_crash(node, error)
    }

    fn report_crash(&mut self, node: &NodeId, error: &str) -> KernelResult<SupervisionAction> {
        let mut action = self.tree.handle_crash(node, error)?;
        loop {
            match &action {
                SupervisionAction::Restart { nodes } => {
                    debug!(count = nodes.len(), "Supervision restart applied");
                    return Ok(action);
                }
                SupervisionAction::Escalate {
                    to: EscalationTarget::Supervisor(supervisor),
                } => {
                    let supervisor = supervisor.clone();
                    action = self
                        .tree
                        .handle_crash(&supervisor, "restart budget exhausted")?;
                }
                SupervisionAction::Escalate {
                    to: EscalationTarget::System,
                } => {
                    return Err(KernelError::RootEscalation(node.clone()));
                }
            }
        }
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    pub fn get_status(&self) -> KernelStatus {
        KernelStatus {
            running: self.running,
            mode: self.mode,
            cycle_count: self.cycle_count,
            total_tasks: self.tasks.len(),
            active_tasks: self.tasks.active_count(),
            crash_log_len: self.tree.crash_log().count(),
            latest_total_fe: self.fe_history.back().map(|s| s.total),
            allocations: self.allocations.clone(),
            history_len: self.fe_history.len(),
        }
    }

    pub fn fe_history(&self) -> impl Iterator<Item = &FreeEnergySample> {
        self.fe_history.iter()
    }

    pub fn level_free_energies(&self) -> LevelFreeEnergies {
        LevelFreeEnergies {
            autonomic: self.autonomic.free_energy(),
            reactive: self.reactive.free_energy(),
            cognitive: self.cognitive.free_energy(),
            executive: self.executive.free_energy(),
        }
    }

    // ── The cycle ────────────────────────────────────────────────────

    /// One synchronous kernel cycle: errors up, predictions down,
    /// then accounting.
    pub fn cycle(&mut self, inputs: &CycleInputs) -> KernelResult<CycleState> {
        if !self.running {
            return Err(KernelError::NotRunning);
        }
        let now = Utc::now();

        // 1. L1: vitals.
        let l1_out = self.autonomic.step(&inputs.vitals);
        self.emit_high_magnitude(&l1_out.errors);

        // 2. L2: scheduling, setpoints, interrupts.
        self.reactive
            .observe_resources(inputs.vitals.energy, inputs.vitals.system_load);
        let task_view = self.tasks.schedulable_view();
        let l2_out = self
            .reactive
            .step(&l1_out.errors, &self.l3_forecast, &task_view, now);
        self.tasks.apply_schedule(&l2_out.schedule);
        let interrupted = if let Some(interrupt) = &l2_out.interrupt {
            warn!(
                trigger = %interrupt.trigger.content,
                weighted = interrupt.trigger.weighted(),
                "Interrupt fired"
            );
            if let Some(preempted) = interrupt.preempted {
                self.tasks.preempt(&preempted);
            }
            true
        } else {
            false
        };
        self.emit_high_magnitude(&l2_out.errors);

        // 3-4. L3 and L4 run only in permissive modes.
        let mut strategy = None;
        let mut policy_update = None;
        let mut self_mod_requested = false;
        let mut self_mod_granted = false;
        if self.mode.permits_cognitive() {
            let current_task = l2_out.next_task.and_then(|id| self.tasks.get(&id)).cloned();
            let l3_out = self.cognitive.step(
                &l2_out.errors,
                &self.executive.predictions(),
                current_task.as_ref(),
            );
            self.l3_forecast = l3_out.predictions_for_l2;
            strategy = Some(l3_out.strategy);

            let system_state = SystemState {
                total_free_energy: self.fe_history.back().map(|s| s.total).unwrap_or(0.0),
                phi: inputs.phi,
                mode: self.mode,
            };
            let l4_out = self.executive.step(&l3_out.errors, &system_state);
            policy_update = l4_out.actions.policy_update;
            self_mod_requested = l4_out.actions.self_modify;

            // Self-modification is double-gated internally (FE and
            // phi) and confirmed externally: the stability monitor
            // must report contraction. A failed check is suppressed,
            // logged, never escalated.
            if self_mod_requested {
                if self.stability.is_stable() {
                    self_mod_granted = true;
                    self.transition_mode(KernelMode::SelfImproving, "executive self-modification");
                } else {
                    debug!("Self-modification suppressed: stability monitor not contracting");
                }
            }
        }

        // 5. Vital-fault decisions. L1 signals are advisory; the
        // orchestrator acts on them here.
        if l1_out.actions.halt {
            warn!("Autonomic halt advisory, stopping the kernel");
            self.stop();
        }
        if l1_out.actions.panic {
            if self.mode.is_relaxed() {
                self.transition_mode(KernelMode::Vigilant, "autonomic panic");
            }
            let node = NodeId::new("vitals-monitor");
            if let Err(err) = self.report_crash(&node, "autonomic panic") {
                warn!(error = %err, "Panic recovery escalated");
            }
        }
        if l1_out.actions.restart == Some(RestartScope::All) {
            let node = NodeId::new("heartbeat");
            if let Err(err) = self.report_crash(&node, "agents unresponsive") {
                warn!(error = %err, "Heartbeat recovery escalated");
            }
        }
        if l1_out.actions.enter_dormancy {
            self.transition_mode(KernelMode::Dormant, "energy exhausted");
        } else if let Some(proposal) = &l2_out.mode_proposal {
            // L2 proposes, the orchestrator decides. Threat escalation
            // is always accepted; dropping to Dormant is accepted only
            // from relaxed modes so a host-pinned Focused session is
            // not idled away underneath the host.
            match proposal.mode {
                KernelMode::Vigilant => {
                    self.transition_mode(KernelMode::Vigilant, &proposal.reason);
                }
                KernelMode::Dormant if self.mode.is_relaxed() => {
                    self.transition_mode(KernelMode::Dormant, &proposal.reason);
                }
                _ => debug!(mode = %proposal.mode, "Ignoring out-of-policy L2 proposal"),
            }
        }

        // 6. Total free energy and history.
        let level_fe = self.level_free_energies();
        let total = level_fe.weighted_total();
        if self.fe_history.len() == self.config.history_capacity {
            self.fe_history.pop_front();
        }
        self.fe_history.push_back(FreeEnergySample {
            cycle: self.cycle_count,
            total,
            timestamp: now,
        });

        // 7. Stability monitor: belief delta plus observation-derived
        // perturbation.
        let beliefs = self.beliefs();
        let perturbation: f64 = l1_out.errors.iter().map(|e| e.magnitude).sum();
        self.stability
            .observe(&self.prev_beliefs, &beliefs, perturbation);
        self.prev_beliefs = beliefs;

        // 8. Per-level overhead costs.
        let overheads = [
            self.config.level_overheads.autonomic,
            self.config.level_overheads.reactive,
            self.config.level_overheads.cognitive,
            self.config.level_overheads.executive,
        ];
        for (module, overhead) in LEVEL_MODULES.iter().zip(overheads) {
            self.ledger.record_cost(module, overhead, "cycle overhead");
        }

        // 9. Periodic budget reallocation.
        self.cycle_count += 1;
        if self.cycle_count % self.config.budget_reallocation_interval == 0 {
            self.reallocate_budget();
        }

        // 10. Periodic steady-state sampling.
        if self.cycle_count % self.config.steady_state_sample_interval == 0 {
            let sample = inputs.economy.unwrap_or_default();
            let reading = self.steady_state.observe(&sample);
            if reading.critical && self.mode.is_relaxed() {
                self.transition_mode(
                    KernelMode::Vigilant,
                    &format!("steady-state deviation {:.2}", reading.deviation),
                );
            }
        }

        let state = CycleState {
            cycle: self.cycle_count,
            timestamp: now,
            mode: self.mode,
            level_fe,
            total_free_energy: total,
            scheduled_task: l2_out.next_task,
            interrupted,
            emotional_state: l2_out.emotional_state,
            strategy,
            policy_update,
            self_mod_requested,
            self_mod_granted,
            active_tasks: self.tasks.active_count(),
        };
        let _ = self
            .event_tx
            .send(KernelEvent::CycleCompleted(Box::new(state.clone())));
        Ok(state)
    }

    /// Belief-state vector fed to the stability monitor: the slowest
    /// predictions each boundary exposes.
    fn beliefs(&self) -> Vec<f64> {
        let executive = self.executive.predictions();
        vec![
            self.autonomic.predicted_energy(),
            self.autonomic.predicted_load(),
            executive.system_stability,
            executive.goal_achievement_rate,
        ]
    }

    fn emit_high_magnitude(&self, errors: &[PredictionError]) {
        for error in errors {
            if error.weighted() > self.config.interrupt_threshold {
                let _ = self
                    .event_tx
                    .send(KernelEvent::HighMagnitudeError(error.clone()));
            }
        }
    }

    /// One gradient step of the resource-allocation integrator under
    /// the fixed-sum, non-negative constraint.
    fn reallocate_budget(&mut self) {
        let rois = self.ledger.rois();
        if rois.len() != self.allocations.len() {
            warn!(
                modules = rois.len(),
                allocations = self.allocations.len(),
                "Ledger module set changed, skipping reallocation"
            );
            return;
        }
        let total = self.ledger.total_budget();

        // Damp momentum by the contraction factor so reallocation
        // slows down while the system is settling.
        let damping = self.stability.damping_factor();
        for m in self.allocation_momentum.iter_mut() {
            *m *= damping;
        }

        let gradient = move |_position: &[f64]| roi_gradient(&rois);
        let (position, momentum) = self.integrator.step(
            &self.allocations,
            &self.allocation_momentum,
            &gradient,
            self.config.integrator_step_size,
            &|values| project_fixed_sum(values, total),
        );
        debug!(?position, "Budget reallocated");
        self.allocations = position;
        self.allocation_momentum = momentum;
        self.ledger.set_allocations(&self.allocations);
    }
}
