//! The supervision tree: nodes, strategies, crash handling.

use crate::{SupervisionError, SupervisionResult};
use cedar_types::Level;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

/// Internal cap on the crash audit log.
const CRASH_LOG_CAP: usize = 500;

/// Identifier of a supervision node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Restart strategy applied by a supervisor when a child crashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartStrategy {
    /// Restart only the crashed child.
    OneForOne,
    /// Restart every child of the supervisor.
    OneForAll,
    /// Restart the crashed child and every child listed after it.
    RestForOne,
}

/// Where an exhausted restart budget escalates to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTarget {
    /// The crashed node's supervisor must itself be restarted.
    Supervisor(NodeId),
    /// The root's budget is exhausted; the host must intervene.
    System,
}

/// Decision returned by `handle_crash`. The orchestrator applies it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SupervisionAction {
    /// Restart these nodes, in order.
    Restart { nodes: Vec<NodeId> },
    /// Escalate beyond the crashed node's supervisor.
    Escalate { to: EscalationTarget },
}

/// A node in the supervision tree.
#[derive(Clone, Debug)]
pub struct SupervisorNode {
    pub id: NodeId,
    /// Hierarchy level this node belongs to, if it maps onto one.
    pub level: Option<Level>,
    pub strategy: RestartStrategy,
    /// Restarts tolerated within the window before escalating.
    pub max_restarts: u32,
    pub restart_window: Duration,
    /// Ordered children; order matters for `RestForOne`.
    pub children: Vec<NodeId>,
    pub restart_count: u32,
    pub last_restart: Option<DateTime<Utc>>,
}

impl SupervisorNode {
    pub fn new(
        id: impl Into<String>,
        strategy: RestartStrategy,
        max_restarts: u32,
        restart_window: Duration,
    ) -> Self {
        Self {
            id: NodeId::new(id),
            level: None,
            strategy,
            max_restarts,
            restart_window,
            children: Vec::new(),
            restart_count: 0,
            last_restart: None,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    /// A leaf node: strategy is irrelevant, it never supervises.
    pub fn leaf(id: impl Into<String>) -> Self {
        Self::new(id, RestartStrategy::OneForOne, 0, Duration::seconds(60))
    }
}

/// One entry in the crash audit log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrashRecord {
    pub id: Uuid,
    pub node: NodeId,
    pub error: String,
    pub action: SupervisionAction,
    pub timestamp: DateTime<Utc>,
}

/// The supervision tree.
#[derive(Clone, Debug)]
pub struct SupervisionTree {
    nodes: HashMap<NodeId, SupervisorNode>,
    parents: HashMap<NodeId, NodeId>,
    root: NodeId,
    /// Crash timestamps per node, for windowed counting.
    crash_times: HashMap<NodeId, Vec<DateTime<Utc>>>,
    crash_log: VecDeque<CrashRecord>,
}

impl SupervisionTree {
    /// Create a tree with only a root supervisor.
    pub fn new(root: SupervisorNode) -> Self {
        let root_id = root.id.clone();
        let mut nodes = HashMap::new();
        nodes.insert(root_id.clone(), root);
        Self {
            nodes,
            parents: HashMap::new(),
            root: root_id,
            crash_times: HashMap::new(),
            crash_log: VecDeque::new(),
        }
    }

    /// The default topology: a `OneForOne` root over three level
    /// supervisors, each owning a small set of named children. Task
    /// failures crash the `{level}-tasks` child of the owning level's
    /// supervisor.
    pub fn default_topology() -> Self {
        let mut tree = Self::new(SupervisorNode::new(
            "root",
            RestartStrategy::OneForOne,
            3,
            Duration::seconds(60),
        ));

        let autonomic = SupervisorNode::new(
            "autonomic-supervisor",
            RestartStrategy::OneForAll,
            5,
            Duration::seconds(60),
        )
        .with_level(Level::Autonomic);
        let reactive = SupervisorNode::new(
            "reactive-supervisor",
            RestartStrategy::RestForOne,
            3,
            Duration::seconds(30),
        )
        .with_level(Level::Reactive);
        let cognitive = SupervisorNode::new(
            "cognitive-supervisor",
            RestartStrategy::OneForOne,
            2,
            Duration::seconds(120),
        )
        .with_level(Level::Cognitive);

        // Infallible: ids are distinct and each child has one parent.
        let _ = tree.add_child(&NodeId::new("root"), autonomic);
        let _ = tree.add_child(&NodeId::new("root"), reactive);
        let _ = tree.add_child(&NodeId::new("root"), cognitive);

        let autonomic_id = NodeId::new("autonomic-supervisor");
        for child in ["heartbeat", "vitals-monitor", "autonomic-tasks"] {
            let _ = tree.add_child(&autonomic_id, SupervisorNode::leaf(child));
        }
        let reactive_id = NodeId::new("reactive-supervisor");
        for child in ["scheduler", "setpoint-regulator", "reactive-tasks"] {
            let _ = tree.add_child(&reactive_id, SupervisorNode::leaf(child));
        }
        let cognitive_id = NodeId::new("cognitive-supervisor");
        for child in [
            "strategy-selector",
            "goal-manager",
            "cognitive-tasks",
            "executive-tasks",
        ] {
            let _ = tree.add_child(&cognitive_id, SupervisorNode::leaf(child));
        }

        tree
    }

    /// The node that absorbs task failures for a level.
    pub fn node_for_level(level: Level) -> NodeId {
        NodeId::new(format!("{}-tasks", level))
    }

    /// Add `node` as the last child of `parent`.
    ///
    /// Enforces the single-parent invariant: a node may never appear
    /// as a child of two supervisors.
    pub fn add_child(&mut self, parent: &NodeId, node: SupervisorNode) -> SupervisionResult<()> {
        if !self.nodes.contains_key(parent) {
            return Err(SupervisionError::NodeNotFound(parent.clone()));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(SupervisionError::DuplicateNode(node.id.clone()));
        }
        if let Some(existing) = self.parents.get(&node.id) {
            return Err(SupervisionError::DuplicateParent {
                child: node.id.clone(),
                parent: existing.clone(),
            });
        }

        let id = node.id.clone();
        self.parents.insert(id.clone(), parent.clone());
        self.nodes.insert(id.clone(), node);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(id);
        }
        Ok(())
    }

    pub fn get(&self, id: &NodeId) -> Option<&SupervisorNode> {
        self.nodes.get(id)
    }

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// The crash audit log, oldest first. Internally capped.
    pub fn crash_log(&self) -> impl Iterator<Item = &CrashRecord> {
        self.crash_log.iter()
    }

    /// Decide what to do about a crash of `node_id`.
    pub fn handle_crash(
        &mut self,
        node_id: &NodeId,
        error: &str,
    ) -> SupervisionResult<SupervisionAction> {
        if !self.nodes.contains_key(node_id) {
            return Err(SupervisionError::NodeNotFound(node_id.clone()));
        }

        let now = Utc::now();
        let action = match self.parents.get(node_id).cloned() {
            None => {
                // The root has no supervisor: terminal escalation.
                warn!(node = %node_id, error = %error, "Crash at supervision root");
                SupervisionAction::Escalate {
                    to: EscalationTarget::System,
                }
            }
            Some(parent_id) => {
                let parent = self
                    .nodes
                    .get(&parent_id)
                    .ok_or_else(|| SupervisionError::NodeNotFound(parent_id.clone()))?;
                let window = parent.restart_window;
                let max_restarts = parent.max_restarts;
                let strategy = parent.strategy;
                let children = parent.children.clone();

                // Count this crash within the supervisor's window.
                let times = self.crash_times.entry(node_id.clone()).or_default();
                times.retain(|t| now - *t <= window);
                times.push(now);
                let crashes = times.len() as u32;

                if crashes > max_restarts {
                    warn!(
                        node = %node_id,
                        supervisor = %parent_id,
                        crashes,
                        max_restarts,
                        "Restart budget exhausted, escalating"
                    );
                    SupervisionAction::Escalate {
                        to: EscalationTarget::Supervisor(parent_id),
                    }
                } else {
                    let nodes = match strategy {
                        RestartStrategy::OneForOne => vec![node_id.clone()],
                        RestartStrategy::OneForAll => children,
                        RestartStrategy::RestForOne => {
                            let position = children.iter().position(|c| c == node_id).unwrap_or(0);
                            children[position..].to_vec()
                        }
                    };
                    info!(
                        node = %node_id,
                        supervisor = %parent_id,
                        strategy = ?strategy,
                        restarting = nodes.len(),
                        "Restarting after crash"
                    );
                    if let Some(crashed) = self.nodes.get_mut(node_id) {
                        crashed.restart_count += 1;
                        crashed.last_restart = Some(now);
                    }
                    SupervisionAction::Restart { nodes }
                }
            }
        };

        self.record_crash(node_id.clone(), error, action.clone(), now);
        Ok(action)
    }

    fn record_crash(
        &mut self,
        node: NodeId,
        error: &str,
        action: SupervisionAction,
        timestamp: DateTime<Utc>,
    ) {
        if self.crash_log.len() == CRASH_LOG_CAP {
            self.crash_log.pop_front();
        }
        self.crash_log.push_back(CrashRecord {
            id: Uuid::new_v4(),
            node,
            error: error.to_string(),
            action,
            timestamp,
        });
    }
}

impl Default for SupervisionTree {
    fn default() -> Self {
        Self::default_topology()
    }
}
