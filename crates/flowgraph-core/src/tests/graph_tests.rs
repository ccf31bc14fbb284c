use crate::ast::{TreeId, UnderlyingAst};
use crate::block::{BlockContent, BlockId, EdgeSlot, FlowRule};
use crate::graph::{AstLookups, ControlFlowGraph};
use crate::node::{NodeArena, NodeKind};
use crate::types::TypeRef;
use crate::CfgError;
use indexmap::IndexSet;
use pretty_assertions::assert_eq;

fn graph_with_nodes(count: usize) -> ControlFlowGraph {
    let mut nodes = NodeArena::new();
    for i in 0..count {
        nodes.alloc(
            NodeKind::LocalVariable {
                name: format!("v{}", i),
            },
            Some(TreeId(i as u32)),
            TypeRef::int(),
        );
    }
    ControlFlowGraph::new(UnderlyingAst::Arbitrary { code: TreeId(0) }, nodes, AstLookups::default())
}

#[test]
fn test_special_blocks_exist() {
    let graph = graph_with_nodes(0);
    assert_ne!(graph.entry_block(), graph.regular_exit_block());
    assert_ne!(graph.regular_exit_block(), graph.exceptional_exit_block());
    assert!(graph.check_invariants().is_ok());
}

#[test]
fn test_set_successor_updates_both_sides() {
    let mut graph = graph_with_nodes(1);
    let block = graph.add_regular_block();
    graph.append_node(block, crate::NodeId(0)).unwrap();
    graph.set_successor(graph.entry_block(), EdgeSlot::Successor, block).unwrap();
    graph
        .set_successor(block, EdgeSlot::Successor, graph.regular_exit_block())
        .unwrap();

    assert_eq!(graph.predecessors(block), vec![graph.entry_block()]);
    assert_eq!(graph.predecessors(graph.regular_exit_block()), vec![block]);
    assert_eq!(graph.block_of(crate::NodeId(0)), Some(block));
    graph.check_invariants().unwrap();
}

#[test]
fn test_overwriting_successor_unlinks_old_target() {
    let mut graph = graph_with_nodes(0);
    let a = graph.add_regular_block();
    let b = graph.add_regular_block();
    graph.set_successor(graph.entry_block(), EdgeSlot::Successor, a).unwrap();
    graph.set_successor(graph.entry_block(), EdgeSlot::Successor, b).unwrap();
    assert!(graph.predecessors(a).is_empty());
    assert_eq!(graph.predecessors(b), vec![graph.entry_block()]);
}

#[test]
fn test_conditional_keeps_link_when_both_sides_share_target() {
    let mut graph = graph_with_nodes(0);
    let cond = graph.add_conditional_block(FlowRule::EachToEach, FlowRule::EachToEach);
    let a = graph.add_regular_block();
    let b = graph.add_regular_block();
    graph.set_successor(cond, EdgeSlot::Then, a).unwrap();
    graph.set_successor(cond, EdgeSlot::Else, a).unwrap();
    graph.set_successor(cond, EdgeSlot::Then, b).unwrap();

    assert_eq!(graph.predecessors(a), vec![cond]);
    assert_eq!(graph.predecessors(b), vec![cond]);
}

#[test]
fn test_redirect_exceptional_edge_replaces_target() {
    let mut graph = graph_with_nodes(1);
    let exc = graph.add_exception_block(crate::NodeId(0)).unwrap();
    let handler = graph.add_regular_block();
    let other = graph.add_regular_block();
    let npe = TypeRef::class("java.lang.NullPointerException");
    let slot = EdgeSlot::Exceptional(npe.clone());
    graph.set_successor(exc, slot.clone(), handler).unwrap();
    graph.set_successor(exc, slot.clone(), graph.exceptional_exit_block()).unwrap();

    graph.redirect_edge(exc, &slot, handler, other).unwrap();

    let block = graph.block(exc).unwrap();
    let targets: Vec<BlockId> = block.exceptional_successors().unwrap()[&npe].iter().copied().collect();
    assert_eq!(targets, vec![other, graph.exceptional_exit_block()]);
    assert!(graph.predecessors(handler).is_empty());
    assert_eq!(graph.predecessors(other), vec![exc]);
}

#[test]
fn test_invalid_slot_is_rejected() {
    let mut graph = graph_with_nodes(0);
    let regular = graph.add_regular_block();
    let target = graph.add_regular_block();
    let err = graph.set_successor(regular, EdgeSlot::Then, target).unwrap_err();
    assert!(matches!(err, CfgError::InvalidEdge { .. }));
}

#[test]
fn test_special_blocks_cannot_be_removed() {
    let mut graph = graph_with_nodes(0);
    let entry = graph.entry_block();
    assert!(matches!(
        graph.remove_block(entry),
        Err(CfgError::SpecialBlockRemoval(_))
    ));
}

#[test]
fn test_block_ids_include_unreachable_and_skip_removed() {
    let mut graph = graph_with_nodes(0);
    let detached = graph.add_regular_block();
    let removed = graph.add_regular_block();
    graph.remove_block(removed).unwrap();

    let ids = graph.block_ids();
    assert_eq!(ids.len(), 4);
    assert!(ids.contains(&detached));
    assert!(!ids.contains(&removed));
    assert!(!graph.all_blocks().contains(&detached));
}

#[test]
fn test_move_nodes_reassigns_owner() {
    let mut graph = graph_with_nodes(2);
    let a = graph.add_regular_block();
    let b = graph.add_regular_block();
    graph.append_node(a, crate::NodeId(0)).unwrap();
    graph.append_node(b, crate::NodeId(1)).unwrap();
    graph.move_nodes(b, a).unwrap();
    assert_eq!(graph.block(a).unwrap().nodes(), &[crate::NodeId(0), crate::NodeId(1)]);
    assert_eq!(graph.block_of(crate::NodeId(1)), Some(a));
    assert!(graph.block(b).unwrap().is_empty_regular());
}

#[test]
fn test_invariant_check_catches_unplaced_lookup_node() {
    let mut nodes = NodeArena::new();
    let n = nodes.alloc(NodeKind::LocalVariable { name: "x".into() }, Some(TreeId(7)), TypeRef::int());
    let mut lookups = AstLookups::default();
    lookups.tree_lookup.insert(TreeId(7), IndexSet::from([n]));
    let graph = ControlFlowGraph::new(UnderlyingAst::Arbitrary { code: TreeId(7) }, nodes, lookups);
    assert!(matches!(
        graph.check_invariants(),
        Err(CfgError::UnplacedNode { .. })
    ));
}

#[test]
fn test_invariant_check_catches_entry_predecessor() {
    let mut graph = graph_with_nodes(0);
    let block = graph.add_regular_block();
    graph.set_successor(graph.entry_block(), EdgeSlot::Successor, block).unwrap();
    graph.set_successor(block, EdgeSlot::Successor, graph.entry_block()).unwrap();
    assert!(matches!(
        graph.check_invariants(),
        Err(CfgError::EntryHasPredecessor(_))
    ));
}

#[test]
fn test_regular_block_content_shape() {
    let mut graph = graph_with_nodes(0);
    let block = graph.add_regular_block();
    match &graph.block(block).unwrap().content {
        BlockContent::Regular { nodes, successor, flow_rule } => {
            assert!(nodes.is_empty());
            assert_eq!(*successor, None);
            assert_eq!(*flow_rule, FlowRule::EachToEach);
        }
        other => panic!("unexpected content {:?}", other),
    }
}
