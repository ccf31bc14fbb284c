/*! Lower typed syntax trees into control-flow graphs.
 *
 * An analysis that walks statements directly has to rediscover, for every construct, where control
 * goes next and which exceptions can escape. This crate does that once: a method, lambda or
 * initializer body is flattened into a linear sequence with explicit jumps, cut into basic blocks,
 * and tidied so analyses see the smallest equivalent graph.
 */

pub mod ast_to_cfg;

pub use ast_to_cfg::{
    build_cfg, materialize, normalize, translate, BuildError, ExtendedKind, ExtendedNode, Label,
    PhaseOneResult,
};
