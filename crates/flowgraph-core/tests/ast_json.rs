use flowgraph_core::{
    AstBuilder, BinaryOp, ClassHierarchy, Literal, MethodSig, NodeArena, NodeId, NodeKind, Symbol, SyntaxTree,
    TreeId, TreeKind, TypeOracle, TypeRef, UnaryOp, UnderlyingAst,
};
use pretty_assertions::assert_eq;

#[test]
fn test_handwritten_tree_deserializes() {
    let json = r#"[
        {"id": 0, "kind": "identifier", "name": "a", "symbol": "local",
         "ty": {"type": "primitive", "kind": "int"}},
        {"id": 1, "kind": "literal", "literal": {"value_kind": "int", "value": 1},
         "ty": {"type": "primitive", "kind": "int"}},
        {"id": 2, "kind": "assignment", "target": 0, "value": 1,
         "ty": {"type": "primitive", "kind": "int"}},
        {"id": 3, "kind": "expression_statement", "expr": 2},
        {"id": 4, "kind": "block", "statements": [3]}
    ]"#;
    let ast: SyntaxTree = serde_json::from_str(&format!(r#"{{"trees": {}}}"#, json)).unwrap();
    ast.validate().unwrap();
    assert_eq!(ast.len(), 5);
    assert_eq!(
        ast.tree(TreeId(1)).unwrap().kind,
        TreeKind::Literal {
            literal: Literal::Int(1)
        }
    );
    assert_eq!(ast.tree(TreeId(3)).unwrap().ty, TypeRef::Void);
    match &ast.tree(TreeId(0)).unwrap().kind {
        TreeKind::Identifier { name, symbol } => {
            assert_eq!(name, "a");
            assert_eq!(symbol, &Symbol::Local);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_builder_output_survives_json() {
    let mut b = AstBuilder::new();
    let owner = TypeRef::class("com.acme.Counter");
    let this = b.this(owner.clone());
    let count = b.select(
        this,
        "count",
        Symbol::Field {
            owner: owner.clone(),
            is_static: false,
        },
        TypeRef::int(),
    );
    let one = b.int(1);
    let sum = b.binary(BinaryOp::Add, count, one, TypeRef::int());
    let log = MethodSig::new("log", owner.clone())
        .with_params(vec![TypeRef::int()])
        .static_method();
    let call = b.call(None, log, vec![sum]);
    let stmt = b.expr_stmt(call);
    let body = b.block(vec![stmt]);
    let ast = b.finish();

    let json = serde_json::to_string(&ast).unwrap();
    let back: SyntaxTree = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ast);

    let underlying = UnderlyingAst::Method {
        name: "bump".into(),
        owner,
        body,
    };
    let json = serde_json::to_string(&underlying).unwrap();
    assert_eq!(serde_json::from_str::<UnderlyingAst>(&json).unwrap(), underlying);
}

#[test]
fn test_malformed_numbering_is_rejected() {
    let json = r#"{"trees": [{"id": 3, "kind": "empty"}]}"#;
    let ast: SyntaxTree = serde_json::from_str(json).unwrap();
    assert!(ast.validate().is_err());
    assert!(ast.get(TreeId(0)).is_none());
}

#[test]
fn test_hierarchy_from_json_extends_core_classes() {
    let mut hierarchy = ClassHierarchy::new();
    let user = ClassHierarchy::from_json(
        r#"{"supertypes": {"com.acme.BadInput": ["java.lang.IllegalArgumentException"]}}"#,
    )
    .unwrap();
    hierarchy.extend(&user);
    assert!(hierarchy.is_subtype(
        &TypeRef::class("com.acme.BadInput"),
        &TypeRef::class("java.lang.RuntimeException")
    ));
}

#[test]
fn test_operator_nodes_keep_their_operator() {
    let mut nodes = NodeArena::new();
    let a = nodes.alloc(NodeKind::LocalVariable { name: "a".into() }, None, TypeRef::int());
    let d = nodes.alloc(NodeKind::LocalVariable { name: "d".into() }, None, TypeRef::int());
    let div = nodes.alloc(
        NodeKind::Binary {
            op: BinaryOp::Div,
            left: a,
            right: d,
        },
        Some(TreeId(2)),
        TypeRef::int(),
    );
    let neg = nodes.alloc(NodeKind::Unary { op: UnaryOp::Minus, operand: div }, None, TypeRef::int());

    for id in [div, neg] {
        let node = nodes.get(id).unwrap();
        let json = serde_json::to_string(node).unwrap();
        let back: flowgraph_core::Node = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, node);
    }

    let value = serde_json::to_value(&nodes.get(div).unwrap().kind).unwrap();
    assert_eq!(value["kind"], "binary");
    assert_eq!(value["op"], "div");
    assert_eq!(value["left"], 0);
    let value = serde_json::to_value(&nodes.get(neg).unwrap().kind).unwrap();
    assert_eq!(value["kind"], "unary");
    assert_eq!(value["op"], "minus");
    assert_eq!(NodeId(3), neg);
}
