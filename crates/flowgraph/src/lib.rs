/*! Control-flow graphs with exceptional edges, in one import.
 *
 * Describe a method, lambda or initializer body as a typed syntax tree, build its graph, and
 * render or query it. The member crates stay usable on their own; this one re-exports the pieces
 * most callers reach for.
 */

pub use flowgraph_build as build;
pub use flowgraph_core as core;
pub use flowgraph_emit as emit;

pub use flowgraph_core::{
    AssertionMode, AstBuilder, Block, BlockId, BlockKind, BuilderConfig, ClassHierarchy, ControlFlowGraph,
    EdgeSlot, FlowRule, Node, NodeId, NodeKind, SyntaxTree, TreeId, TypeOracle, TypeRef, UnderlyingAst,
};

pub use flowgraph_emit::{DotEmitter, Emitter, EmitterConfig, TextEmitter};

pub use flowgraph_build::{build_cfg, BuildError};
