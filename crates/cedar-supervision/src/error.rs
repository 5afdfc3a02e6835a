//! Error types for the supervision tree.

use crate::NodeId;
use thiserror::Error;

/// Errors from supervision-tree operations.
#[derive(Debug, Error)]
pub enum SupervisionError {
    /// The referenced node is not in the tree.
    #[error("supervision node not found: {0}")]
    NodeNotFound(NodeId),

    /// A node was added as a child of two supervisors.
    #[error("node {child} already has parent {parent}")]
    DuplicateParent { child: NodeId, parent: NodeId },

    /// A node id was registered twice.
    #[error("node already registered: {0}")]
    DuplicateNode(NodeId),
}

/// Result type for supervision operations.
pub type SupervisionResult<T> = Result<T, SupervisionError>;
