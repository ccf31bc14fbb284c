use super::extended::Label;
use flowgraph_core::{CfgError, TreeId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Unexpected {kind} tree {tree} {context}")]
    UnexpectedTree {
        tree: TreeId,
        kind: &'static str,
        context: String,
    },

    #[error("No jump target for {0}")]
    NoJumpTarget(String),

    #[error("Label {0} was never bound to a position")]
    UnboundLabel(Label),

    #[error("Label {0} is bound twice")]
    DuplicateLabel(Label),

    #[error("Sequence index {0} has no block")]
    UnplacedIndex(usize),

    #[error("Invalid varargs call: {0}")]
    InvalidVarargs(String),

    #[error("Call {tree} passes {found} arguments to {expected} parameters")]
    ArityMismatch {
        tree: TreeId,
        expected: usize,
        found: usize,
    },

    #[error("Type error: {0}")]
    InvalidType(String),

    #[error("Graph error: {0}")]
    Graph(#[from] CfgError),
}

pub type Result<T> = std::result::Result<T, BuildError>;
