//! Compiling whole queries through the public API.

use dialectic::ir::*;
use dialectic::{compile, MessageKind, Options};
use insta::assert_snapshot;
use rstest::rstest;

fn field(relation: &str, name: &str, ty: SemanticType) -> Expr {
    Expr::field(FieldRef::new(relation, RelationKind::Table, name), ty)
}

fn count() -> Expr {
    Expr::aggregate(AggregateFunc::Count, None, SemanticType::integer())
}

fn options(dialect: &str) -> Options {
    Options::default()
        .with_dialect(dialect)
        .no_format()
        .no_signature()
}

fn flights_by_state() -> Query {
    let root = Segment::new("by_state")
        .dimension("state", field("base", "state", SemanticType::String))
        .measure("flight_count", count())
        .limit(10);
    Query::new("flights", "base", root)
}

#[rstest]
#[case::bigquery("bigquery", "ORDER BY flight_count DESC LIMIT 10")]
#[case::duckdb("duckdb", "ORDER BY flight_count DESC NULLS LAST LIMIT 10")]
#[case::duckdb_wasm("duckdb_wasm", "ORDER BY flight_count DESC NULLS LAST LIMIT 10")]
#[case::mysql("mysql", "ORDER BY flight_count DESC LIMIT 10")]
#[case::postgres("postgres", "ORDER BY flight_count DESC NULLS LAST LIMIT 10")]
#[case::presto("presto", "ORDER BY flight_count DESC NULLS LAST LIMIT 10")]
#[case::redshift("redshift", "ORDER BY flight_count DESC NULLS LAST LIMIT 10")]
#[case::snowflake("snowflake", "ORDER BY flight_count DESC NULLS LAST LIMIT 10")]
#[case::trino("trino", "ORDER BY flight_count DESC NULLS LAST LIMIT 10")]
fn flat_query(#[case] dialect: &str, #[case] ordering: &str) {
    let compiled = compile(&flights_by_state(), &options(dialect)).unwrap();
    similar_asserts::assert_eq!(
        compiled.sql,
        format!(
            "SELECT base.state AS state, COUNT(1) AS flight_count FROM flights AS base GROUP BY 1 {ordering}"
        )
    );
    assert!(compiled.diagnostics.is_empty());
}

#[test]
fn formatted_with_signature() {
    let compiled = compile(
        &flights_by_state(),
        &Options::default().with_dialect("postgres"),
    )
    .unwrap();
    let mut lines = compiled.sql.lines();
    assert_eq!(
        lines.next().unwrap(),
        format!(
            "-- Generated by dialectic version:{} target:postgres",
            dialectic::compiler_version()
        )
    );
    assert!(lines.count() > 3);
}

fn nested_query() -> Query {
    let root = Segment::new("by_state")
        .dimension("state", field("base", "state", SemanticType::String))
        .measure("flight_count", count())
        .nest(
            Segment::new("by_carrier")
                .dimension("carrier", field("base", "carrier", SemanticType::String))
                .measure("flight_count", count())
                .limit(3),
        );
    Query::new("flights", "base", root)
}

#[test]
fn nested_query_output() {
    let compiled = compile(&nested_query(), &options("duckdb")).unwrap();
    assert!(compiled.sql.starts_with("WITH __stage0 AS ("));
    assert!(compiled.sql.contains("group_set"));

    let names = compiled.fields.iter().map(|f| f.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, ["state", "flight_count", "by_carrier"]);
    assert_eq!(compiled.fields[2].shape, FieldShape::Nested);
}

#[test]
fn nesting_unsupported() {
    let error = compile(&nested_query(), &options("redshift")).unwrap_err();
    assert_eq!(error.inner[0].code.as_deref(), Some("E0101"));
    assert_snapshot!(
        error.inner[0].reason,
        @"nested segments is not supported by dialect `redshift`"
    );
}

#[test]
fn fan_out_lint() {
    let root = Segment::new("totals").measure(
        "total",
        Expr::aggregate(
            AggregateFunc::Sum,
            Some(field("orders", "amount", SemanticType::float())),
            SemanticType::float(),
        ),
    );
    let mut query = Query::new("orders", "orders", root);
    query.joins.push(Join {
        alias: "items".to_string(),
        kind: JoinKind::Table {
            table: "order_items".to_string(),
            on: Expr::binary(
                field("items", "order_id", SemanticType::integer()),
                BinOp::Eq,
                field("orders", "id", SemanticType::integer()),
                SemanticType::Boolean,
            ),
            cardinality: Cardinality::Many,
        },
    });

    let compiled = compile(&query, &options("postgres")).unwrap();
    assert_snapshot!(
        compiled.sql,
        @"SELECT SUM(orders.amount) AS total FROM orders AS orders LEFT JOIN order_items AS items ON items.order_id = orders.id"
    );
    assert_eq!(compiled.diagnostics.len(), 1);
    let lint = &compiled.diagnostics[0];
    assert_eq!(lint.kind, MessageKind::Lint);
    assert_snapshot!(lint.reason, @"SUM over `orders` counts rows repeated by joining `items`");
}

#[test]
fn emulated_unnest_warning() {
    let element = SemanticType::Record(vec![RecordField {
        name: "sku".to_string(),
        ty: SemanticType::String,
    }]);
    let root = Segment::new("skus").measure("n", count());
    let mut query = Query::new("orders", "base", root);
    query.joins.push(Join {
        alias: "items".to_string(),
        kind: JoinKind::Unnest(Unnest {
            source: field("base", "items", SemanticType::Array(Box::new(element))),
            fields: vec![],
            needs_distinct_key: false,
            array_of_scalars: false,
            in_nested_pipeline: true,
        }),
    });

    let compiled = compile(&query, &options("duckdb_wasm").with_unnest_bound(50)).unwrap();
    assert_eq!(compiled.diagnostics.len(), 1);
    assert_eq!(compiled.diagnostics[0].kind, MessageKind::Warning);
    assert_snapshot!(
        compiled.diagnostics[0].reason,
        @"unnesting `items` through a number series; arrays longer than 50 elements are truncated"
    );

    let compiled = compile(&query, &options("duckdb")).unwrap();
    assert!(compiled.diagnostics.is_empty());
}

#[test]
fn aggregate_row_filter() {
    let mut query = flights_by_state();
    query.filters.push(Expr::binary(
        count(),
        BinOp::Gt,
        Expr::number(1),
        SemanticType::Boolean,
    ));
    let error = compile(&query, &options("duckdb")).unwrap_err();
    assert_snapshot!(error.inner[0].reason, @"unexpected aggregate in a row filter (Binary)");
    assert_eq!(error.inner[0].hints.len(), 1);
}
