//! Error types for the cedar kernel.

use cedar_supervision::{NodeId, SupervisionError};
use cedar_types::{TaskId, TaskStatus};
use thiserror::Error;

/// Errors returned by kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// The referenced task does not exist.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// A terminal task cannot transition again.
    #[error("task {id} is already {status}")]
    TaskAlreadyTerminal { id: TaskId, status: TaskStatus },

    /// The kernel must be started before cycling.
    #[error("kernel is not running")]
    NotRunning,

    /// `start` on an already-running kernel.
    #[error("kernel is already running")]
    AlreadyRunning,

    /// Supervision escalated past the root; the host must intervene.
    #[error("supervision escalated to system from node {0}")]
    RootEscalation(NodeId),

    /// Supervision tree error.
    #[error(transparent)]
    Supervision(#[from] SupervisionError),
}

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;
