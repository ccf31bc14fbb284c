use flowgraph::{
    build_cfg, AstBuilder, BlockKind, BuilderConfig, ClassHierarchy, Emitter, EmitterConfig, TextEmitter,
    TypeRef, UnderlyingAst,
};

#[test]
fn test_build_and_render_through_umbrella() {
    let mut b = AstBuilder::new();
    let flag = b.local("flag", TypeRef::boolean());
    let body_stmt = b.empty();
    let looping = b.while_(flag, body_stmt);
    let body = b.block(vec![looping]);
    let ast = b.finish();
    let code = UnderlyingAst::Arbitrary { code: body };

    let graph = build_cfg(&ast, code, &ClassHierarchy::new(), &BuilderConfig::default()).unwrap();
    assert_eq!(graph.block_kind_counts().get(&BlockKind::Conditional), Some(&1));

    let text = TextEmitter::new(EmitterConfig::plain()).emit_to_string(&graph).unwrap();
    assert!(text.starts_with("=== code "));
}
