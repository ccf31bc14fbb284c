use flowgraph_build::build_cfg;
use flowgraph_core::{
    AstBuilder, AstLookups, BinaryOp, BuilderConfig, ClassHierarchy, ControlFlowGraph, EdgeSlot, FlowRule,
    Literal, MethodSig, NodeArena, NodeKind, TreeId, TypeRef, UnderlyingAst,
};
use flowgraph_emit::{DotEmitter, Emitter, EmitterConfig, TextEmitter, VerbosityLevel};

fn underlying() -> UnderlyingAst {
    UnderlyingAst::Method {
        name: "run".to_string(),
        owner: TypeRef::class("com.acme.Worker"),
        body: TreeId(0),
    }
}

/// entry -> [x = 1] -> cond -> then: (a / d) -> [marker] -> exit; else: [marker]
fn sample_graph() -> ControlFlowGraph {
    let mut nodes = NodeArena::new();
    let x = nodes.alloc(NodeKind::LocalVariable { name: "x".into() }, None, TypeRef::int());
    let one = nodes.alloc(NodeKind::Literal { value: Literal::Int(1) }, None, TypeRef::int());
    let assign = nodes.alloc(NodeKind::Assignment { target: x, value: one }, None, TypeRef::int());
    let a = nodes.alloc(NodeKind::LocalVariable { name: "a".into() }, None, TypeRef::int());
    let d = nodes.alloc(NodeKind::LocalVariable { name: "d".into() }, None, TypeRef::int());
    let div = nodes.alloc(
        NodeKind::Binary {
            op: BinaryOp::Div,
            left: a,
            right: d,
        },
        None,
        TypeRef::int(),
    );
    let done = nodes.alloc(NodeKind::Marker { message: "done".into() }, None, TypeRef::Void);

    let mut graph = ControlFlowGraph::new(underlying(), nodes, AstLookups::default());
    let start = graph.add_regular_block();
    for node in [x, one, assign] {
        graph.append_node(start, node).unwrap();
    }
    let cond = graph.add_conditional_block(FlowRule::EachToEach, FlowRule::ElseToElse);
    let throwing = graph.add_exception_block(div).unwrap();
    let end = graph.add_regular_block();
    graph.append_node(end, done).unwrap();

    let entry = graph.entry_block();
    let exit = graph.regular_exit_block();
    let exceptional_exit = graph.exceptional_exit_block();
    let arithmetic = TypeRef::class("java.lang.ArithmeticException");
    graph.set_successor(entry, EdgeSlot::Successor, start).unwrap();
    graph.set_successor(start, EdgeSlot::Successor, cond).unwrap();
    graph.set_successor(cond, EdgeSlot::Then, throwing).unwrap();
    graph.set_successor(cond, EdgeSlot::Else, end).unwrap();
    graph.set_successor(throwing, EdgeSlot::Successor, end).unwrap();
    graph
        .set_successor(throwing, EdgeSlot::Exceptional(arithmetic), exceptional_exit)
        .unwrap();
    graph.set_successor(end, EdgeSlot::Successor, exit).unwrap();
    graph
}

#[test]
fn test_text_listing_snapshot() {
    let output = TextEmitter::new(EmitterConfig::plain())
        .emit_to_string(&sample_graph())
        .unwrap();
    insta::assert_snapshot!(output.trim_end(), @r"
    === method Worker.run ===
    block0 (entry)
        -> block3
    block3 (regular) <- block0
        x
        1
        x = 1
        -> block4
    block4 (conditional) <- block3
        then -> block5 [EACH_TO_EACH]
        else -> block6 [ELSE_TO_ELSE]
    block5 (exception) <- block4
        (a / d)
        -> block6
        ArithmeticException -> block2 (exceptional exit)
    block6 (regular) <- block4, block5
        marker (done)
        -> block1 (regular exit)
    block2 (exceptional exit) <- block5
    block1 (regular exit) <- block6
    ");
}

#[test]
fn test_dot_snapshot() {
    let output = DotEmitter::new(EmitterConfig::plain())
        .emit_to_string(&sample_graph())
        .unwrap();
    insta::assert_snapshot!(output.trim_end(), @r#"
    digraph cfg {
        // method Worker.run
        node [fontname="monospace"];
        block0 [shape=oval, label="block0 (entry)\l"];
        block3 [shape=rectangle, label="block3 (regular)\lx\l1\lx = 1\l"];
        block4 [shape=polygon, sides=8, label="block4 (conditional)\l"];
        block5 [shape=rectangle, style=dashed, label="block5 (exception)\l(a / d)\l"];
        block6 [shape=rectangle, label="block6 (regular)\lmarker (done)\l"];
        block2 [shape=oval, label="block2 (exceptional exit)\l"];
        block1 [shape=oval, label="block1 (regular exit)\l"];
        block0 -> block3;
        block3 -> block4;
        block4 -> block5 [label="then EACH_TO_EACH"];
        block4 -> block6 [label="else ELSE_TO_ELSE"];
        block5 -> block6;
        block5 -> block2 [label="ArithmeticException", style=dashed];
        block6 -> block1;
    }
    "#);
}

#[test]
fn test_quiet_listing_has_only_blocks_and_edges() {
    let config = EmitterConfig::plain().with_verbosity(VerbosityLevel::Quiet);
    let output = TextEmitter::new(config).emit_to_string(&sample_graph()).unwrap();
    assert!(output.contains("block3 (regular) <- block0"));
    assert!(output.contains("-> block4"));
    assert!(!output.contains("x = 1"));
    assert!(!output.contains("marker (done)"));
}

#[test]
fn test_debug_listing_shows_ids_and_types() {
    let config = EmitterConfig::plain().with_verbosity(VerbosityLevel::Debug);
    let output = TextEmitter::new(config).emit_to_string(&sample_graph()).unwrap();
    assert!(output.contains("n2: x = 1 : int"));
    assert!(output.contains("n6: marker (done) : void"));
}

#[test]
fn test_hidden_exception_types() {
    let config = EmitterConfig {
        show_exception_types: false,
        ..EmitterConfig::plain()
    };
    let text = TextEmitter::new(config.clone()).emit_to_string(&sample_graph()).unwrap();
    assert!(text.contains("exception -> block2 (exceptional exit)"));
    assert!(!text.contains("ArithmeticException"));

    let dot = DotEmitter::new(config).emit_to_string(&sample_graph()).unwrap();
    assert!(dot.contains(r#"block5 -> block2 [label="exception", style=dashed];"#));
}

#[test]
fn test_colored_listing_wraps_headers() {
    colored::control::set_override(true);
    let output = TextEmitter::new(EmitterConfig::default())
        .emit_to_string(&sample_graph())
        .unwrap();
    assert!(output.contains("\u{1b}["));
    assert!(output.contains("block3 (regular)"));
}

#[test]
fn test_built_graph_renders_every_reachable_block() {
    let mut b = AstBuilder::new();
    let flag = b.local("flag", TypeRef::boolean());
    let message = b.string("hi");
    let call = b.call(
        None,
        MethodSig::new("log", TypeRef::class("com.acme.Worker")).with_params(vec![TypeRef::string()]),
        vec![message],
    );
    let then_stmt = b.expr_stmt(call);
    let branch = b.if_(flag, then_stmt, None);
    let body = b.block(vec![branch]);
    let ast = b.finish();
    let method = UnderlyingAst::Method {
        name: "run".to_string(),
        owner: TypeRef::class("com.acme.Worker"),
        body,
    };
    let graph = build_cfg(&ast, method, &ClassHierarchy::new(), &BuilderConfig::new()).unwrap();

    let text = TextEmitter::new(EmitterConfig::plain()).emit_to_string(&graph).unwrap();
    let dot = DotEmitter::new(EmitterConfig::plain()).emit_to_string(&graph).unwrap();
    for id in graph.all_blocks() {
        assert!(text.contains(&format!("{} (", id)));
        assert!(dot.contains(&format!("    {} [", id)));
    }
    assert!(text.contains("[EACH_TO_EACH]"));
    assert!(dot.contains(r#"\"hi\""#));
    assert!(dot.starts_with("digraph cfg {\n"));
}
