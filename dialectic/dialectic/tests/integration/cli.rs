#![cfg(all(not(target_family = "wasm"), feature = "cli"))]

use std::fs;
use std::process::Command;

use dialectic::ir::*;
use insta_cmd::assert_cmd_snapshot;
use insta_cmd::get_cargo_bin;

#[test]
fn list_dialects() {
    assert_cmd_snapshot!(dialectic_command().arg("list-dialects"), @r"
    success: true
    exit_code: 0
    ----- stdout -----
    bigquery
    duckdb
    duckdb_wasm
    mysql
    postgres
    presto
    redshift
    snowflake
    trino

    ----- stderr -----
    ");
}

#[test]
fn compile_stdin() {
    assert_cmd_snapshot!(dialectic_command()
        .args(["compile", "--hide-signature-comment", "--no-format", "-d", "postgres"])
        .pass_stdin(totals_json()), @r"
    success: true
    exit_code: 0
    ----- stdout -----
    SELECT SUM(orders.amount) AS total FROM orders AS orders

    ----- stderr -----
    ");
}

#[test]
fn compile_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("query.json");
    let output = dir.path().join("query.sql");
    fs::write(&input, totals_json()).unwrap();

    let status = dialectic_command()
        .args(["compile", "--hide-signature-comment", "--no-format"])
        .args(["--dialect", "bigquery"])
        .arg(&input)
        .arg(&output)
        .status()
        .unwrap();
    assert!(status.success());
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "SELECT SUM(orders.amount) AS total FROM orders AS orders\n"
    );
}

#[test]
fn compile_unknown_dialect() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("query.json");
    fs::write(&input, totals_json()).unwrap();

    let output = dialectic_command()
        .args(["compile", "--dialect", "oracle"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("[E0301] Error: unknown dialect `oracle`"));
}

#[test]
fn json_schema() {
    let output = dialectic_command()
        .args(["debug", "json-schema"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let schema: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["title"], "Query");
}

fn totals_json() -> String {
    let amount = Expr::field(
        FieldRef::new("orders", RelationKind::Table, "amount"),
        SemanticType::float(),
    );
    let root = Segment::new("totals").measure(
        "total",
        Expr::aggregate(AggregateFunc::Sum, Some(amount), SemanticType::float()),
    );
    dialectic::json::from_query(&Query::new("orders", "orders", root)).unwrap()
}

fn dialectic_command() -> Command {
    let mut cmd = Command::new(get_cargo_bin("dialectic"));
    normalize_dialectic(&mut cmd);
    cmd
}

fn normalize_dialectic(cmd: &mut Command) -> &mut Command {
    cmd
        // Color would end up in the snapshots otherwise.
        .env_remove("CLICOLOR_FORCE")
        .env("NO_COLOR", "1")
        .args(["--color=never"])
        .env_remove("DIALECTIC_DIALECT")
        .env_remove("RUST_BACKTRACE")
        .env_remove("RUST_LOG")
}
