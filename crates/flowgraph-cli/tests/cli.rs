use assert_cmd::Command;
use flowgraph_core::{AstBuilder, BinaryOp, MethodSig, SyntaxTree, TreeId, TypeRef, UnderlyingAst};
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn owner() -> TypeRef {
    TypeRef::class("com.acme.Worker")
}

fn write_input(dir: &TempDir, ast: &SyntaxTree, body: TreeId) -> PathBuf {
    let underlying = UnderlyingAst::Method {
        name: "run".to_string(),
        owner: owner(),
        body,
    };
    let document = json!({
        "ast": ast,
        "underlying": underlying,
        "hierarchy": { "supertypes": { "com.acme.Worker": ["java.lang.Object"] } },
    });
    let path = dir.path().join("input.json");
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();
    path
}

/// `{ r = a / d; }`
fn division_body(dir: &TempDir) -> PathBuf {
    let mut b = AstBuilder::new();
    let r = b.local("r", TypeRef::int());
    let a = b.local("a", TypeRef::int());
    let d = b.local("d", TypeRef::int());
    let div = b.binary(BinaryOp::Div, a, d, TypeRef::int());
    let stmt = b.assign_stmt(r, div);
    let body = b.block(vec![stmt]);
    write_input(dir, &b.finish(), body)
}

fn flowgraph() -> Command {
    let mut cmd = Command::cargo_bin("flowgraph").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_build_prints_text_listing() {
    let dir = TempDir::new().unwrap();
    let input = division_body(&dir);

    flowgraph()
        .args(["build", "--no-color"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("=== method Worker.run ==="))
        .stdout(predicate::str::contains("(exception)"))
        .stdout(predicate::str::contains("ArithmeticException -> block2 (exceptional exit)"));
}

#[test]
fn test_build_writes_dot_file() {
    let dir = TempDir::new().unwrap();
    let input = division_body(&dir);
    let output = dir.path().join("graph.dot");

    flowgraph()
        .args(["build", "--format", "dot", "--output"])
        .arg(&output)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let dot = fs::read_to_string(&output).unwrap();
    assert!(dot.starts_with("digraph cfg {"));
    assert!(dot.contains("style=dashed"));
    assert!(!dot.contains("\u{1b}["));
}

#[test]
fn test_build_can_hide_exception_types() {
    let dir = TempDir::new().unwrap();
    let input = division_body(&dir);

    flowgraph()
        .args(["build", "--no-color", "--hide-exception-types"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("exception -> block2"))
        .stdout(predicate::str::contains("ArithmeticException").not());
}

#[test]
fn test_check_prints_summary() {
    let dir = TempDir::new().unwrap();
    let input = division_body(&dir);

    flowgraph()
        .arg("check")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("VALID method Worker.run"))
        .stdout(predicate::str::contains("exception: 1"))
        .stdout(predicate::str::contains("Return nodes: 0"));
}

#[test]
fn test_verbose_logs_phases_to_stderr() {
    let dir = TempDir::new().unwrap();
    let input = division_body(&dir);

    flowgraph()
        .args(["check", "-v"])
        .arg(&input)
        .assert()
        .success()
        .stderr(predicate::str::contains("phase one finished"))
        .stderr(predicate::str::contains("phase three finished"))
        .stdout(predicate::str::contains("Reverse postorder: block0"));
}

#[test]
fn test_conflicting_assertion_flags_fail() {
    let dir = TempDir::new().unwrap();
    let input = division_body(&dir);

    flowgraph()
        .args(["build", "--assertions-enabled", "--assertions-disabled"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("both enabled and disabled"));
}

#[test]
fn test_assertion_mode_reaches_builder() {
    let dir = TempDir::new().unwrap();
    let mut b = AstBuilder::new();
    let flag = b.local("flag", TypeRef::boolean());
    let check = b.assert(flag, None);
    let body = b.block(vec![check]);
    let input = write_input(&dir, &b.finish(), body);

    flowgraph()
        .args(["build", "--no-color", "--assertions-enabled"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("AssertionError"))
        .stdout(predicate::str::contains("assertionsEnabled").not());

    flowgraph()
        .args(["build", "--no-color", "--assertions-disabled"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("AssertionError").not());
}

#[test]
fn test_malformed_input_is_reported() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.json");
    fs::write(&input, "{ \"ast\": ").unwrap();

    flowgraph()
        .arg("check")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn test_untranslatable_body_fails_check() {
    let dir = TempDir::new().unwrap();
    let mut b = AstBuilder::new();
    let stray = b.case(None, vec![]);
    let body = b.block(vec![stray]);
    let input = write_input(&dir, &b.finish(), body);

    flowgraph()
        .arg("check")
        .arg(&input)
        .assert()
        .failure()
        .stdout(predicate::str::contains("INVALID method Worker.run"))
        .stderr(predicate::str::contains("outside a switch"));
}

#[test]
fn test_terminating_call_has_no_regular_exit() {
    let dir = TempDir::new().unwrap();
    let mut b = AstBuilder::new();
    let exit = MethodSig::new("exit", TypeRef::class("java.lang.System"))
        .with_params(vec![TypeRef::int()])
        .static_method()
        .terminating();
    let status = b.int(0);
    let call = b.call(None, exit, vec![status]);
    let stmt = b.expr_stmt(call);
    let body = b.block(vec![stmt]);
    let input = write_input(&dir, &b.finish(), body);

    flowgraph()
        .args(["build", "--no-color"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("(regular exit)").not());
}
