/*! Build a control-flow graph from an attributed tree in three phases.
 *
 * Phase one walks the tree and emits a flat sequence of extended nodes: plain operations, throwing
 * operations, jumps and two-way branches, with forward references expressed as labels. Phase two
 * cuts that sequence into blocks and wires every edge. Phase three removes what the first two
 * phases over-produce: unreachable predecessors, empty blocks and needless block boundaries.
 */

mod context;
mod conversions;
mod errors;
mod expression_translator;
mod extended;
mod materialize;
mod normalize;
mod statement_translator;
mod try_stack;


use flowgraph_core::{BuilderConfig, ControlFlowGraph, SyntaxTree, TypeOracle, UnderlyingAst};
use tracing::{debug, trace};

pub use errors::{BuildError, Result};
pub use extended::{ExtendedKind, ExtendedNode, Label, PhaseOneResult};
pub use materialize::materialize;
pub use normalize::normalize;

/// Phase one: lowers the body named by `underlying` into an extended-node sequence.
pub fn translate(
    ast: &SyntaxTree,
    underlying: UnderlyingAst,
    oracle: &dyn TypeOracle,
    config: &BuilderConfig,
) -> Result<PhaseOneResult> {
    ast.validate()?;
    let result = context::Translator::new(ast, oracle, config).process(underlying)?;
    debug!(
        nodes = result.nodes.len(),
        sequence = result.sequence.len(),
        labels = result.bindings.len(),
        "phase one finished"
    );
    trace!("extended sequence:\n{}", result);
    Ok(result)
}

/// Runs all three phases and returns the normalized graph.
pub fn build_cfg(
    ast: &SyntaxTree,
    underlying: UnderlyingAst,
    oracle: &dyn TypeOracle,
    config: &BuilderConfig,
) -> Result<ControlFlowGraph> {
    debug!(target_ast = %underlying, assertions = ?config.assertions, "building control-flow graph");
    let phase_one = translate(ast, underlying, oracle, config)?;
    let mut graph = materialize(phase_one)?;
    normalize(&mut graph)?;
    if config.check_invariants {
        graph.check_invariants()?;
    }
    debug!(blocks = graph.all_blocks().len(), "control-flow graph ready");
    Ok(graph)
}
