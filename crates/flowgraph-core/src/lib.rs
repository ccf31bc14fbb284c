/*! Data model for control-flow graphs with exceptional edges.
 *
 * Dataflow analyses need more than a list of statements: they need to know every way control can
 * leave an operation, including the exceptions it may throw. This crate holds the typed input tree,
 * the oracle that answers type questions about it, and the block graph the builder produces,
 * together with the invariants that graph must satisfy.
 */

pub mod ast;
pub mod block;
pub mod config;
pub mod graph;
pub mod node;
pub mod oracle;
pub mod types;

pub use ast::{
    AstBuilder, BinaryOp, Literal, MethodSig, Symbol, SyntaxTree, Tree, TreeId, TreeKind, UnaryOp,
    UnderlyingAst,
};
pub use block::{Block, BlockContent, BlockId, BlockKind, EdgeSlot, FlowRule, SpecialKind};
pub use config::{AssertionMode, BuilderConfig};
pub use graph::{AstLookups, ControlFlowGraph};
pub use node::{Node, NodeArena, NodeId, NodeKind};
pub use oracle::{ClassHierarchy, TypeOracle, WellKnown};
pub use types::{PrimitiveKind, TypeRef};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CfgError {
    #[error("Unknown tree: {0}")]
    UnknownTree(TreeId),
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),
    #[error("Unknown or removed block: {0}")]
    UnknownBlock(BlockId),
    #[error("Block {block} is not a {expected} block")]
    WrongBlockKind { block: BlockId, expected: &'static str },
    #[error("Block {block} has no {slot} edge")]
    InvalidEdge { block: BlockId, slot: String },
    #[error("Special block {0} cannot be removed")]
    SpecialBlockRemoval(BlockId),
    #[error("Expected exactly one {kind:?} block, found {count}")]
    SpecialBlockCount { kind: SpecialKind, count: usize },
    #[error("Entry block has predecessor {0}")]
    EntryHasPredecessor(BlockId),
    #[error("Node {node} in {block} believes it belongs to {recorded:?}")]
    NodeBlockMismatch {
        node: NodeId,
        block: BlockId,
        recorded: Option<BlockId>,
    },
    #[error("Block {block} has successor {successor} but is not among its predecessors")]
    MissingPredecessor { block: BlockId, successor: BlockId },
    #[error("Block {block} has predecessor {predecessor} but is not among its successors")]
    MissingSuccessor { block: BlockId, predecessor: BlockId },
    #[error("Node {node} for {tree} is not placed in any block")]
    UnplacedNode { tree: TreeId, node: NodeId },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CfgError>;

#[cfg(test)]
mod tests;
