/*! Render control-flow graphs for people.
 *
 * A graph that only exists as linked blocks is hard to review. These emitters walk the public
 * graph accessors and print either an indented block listing for terminals or a Graphviz
 * document for diagrams, so a surprising edge can be traced back to the node that produced it.
 */

pub mod config;
pub mod dot_emitter;
pub mod emitter;
pub mod text_emitter;

pub use config::{EmitterConfig, VerbosityLevel};
pub use dot_emitter::DotEmitter;
pub use emitter::{EmitContext, EmitHelper, EmitResult, Emitter};
pub use text_emitter::TextEmitter;
