//! Runs generated SQL against an in-process DuckDB.
#![cfg(not(target_family = "wasm"))]

use dialectic::ir::*;
use dialectic::{compile, compile_expr, Options};
use duckdb::Connection;

fn options() -> Options {
    Options::default()
        .with_dialect("duckdb")
        .no_format()
        .no_signature()
}

fn field(relation: &str, name: &str, ty: SemanticType) -> Expr {
    Expr::field(FieldRef::new(relation, RelationKind::Table, name), ty)
}

fn count() -> Expr {
    Expr::aggregate(AggregateFunc::Count, None, SemanticType::integer())
}

fn connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "
        CREATE TABLE orders (id INTEGER, amount DOUBLE);
        INSERT INTO orders VALUES (1, 10), (2, 20), (3, 30);
        CREATE TABLE order_items (order_id INTEGER, sku VARCHAR);
        INSERT INTO order_items VALUES
            (1, 'a'), (1, 'b'), (2, 'a'), (2, 'c'), (3, 'd'), (3, 'e'), (3, 'f');
        CREATE TABLE refunds (id INTEGER, amount DOUBLE);
        INSERT INTO refunds VALUES (1, 10), (2, NULL), (3, 30), (4, 0);
        CREATE TABLE refund_lines (refund_id INTEGER);
        INSERT INTO refund_lines VALUES (1), (1), (2), (2), (3), (3), (3), (4), (4);
        CREATE TABLE flights (state VARCHAR, carrier VARCHAR);
        INSERT INTO flights VALUES ('CA', 'AA'), ('CA', 'AA'), ('CA', 'UA'), ('NY', 'AA');
        ",
    )
    .unwrap();
    conn
}

#[test]
fn symmetric_sum_over_fan_out() {
    let sum = |key: Option<Expr>| {
        let sum = Expr::aggregate(
            AggregateFunc::Sum,
            Some(field("orders", "amount", SemanticType::float())),
            SemanticType::float(),
        );
        match key {
            Some(key) => sum.with_distinct_key(key),
            None => sum,
        }
    };
    let query = |measure: Expr| {
        let mut query = Query::new("orders", "orders", Segment::new("q").measure("total", measure));
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
        query
    };

    let conn = connection();
    let total = |query: &Query| -> f64 {
        let sql = compile(query, &options()).unwrap().sql;
        conn.query_row(&sql, [], |row| row.get(0)).unwrap()
    };

    let key = field("orders", "id", SemanticType::integer());
    assert_eq!(total(&query(sum(Some(key)))), 60.0);
    // without a key, orders with several items are counted repeatedly
    assert_eq!(total(&query(sum(None))), 150.0);
}

#[test]
fn symmetric_aggregates_with_null_and_zero() {
    let measure = |func: AggregateFunc| {
        Expr::aggregate(
            func,
            Some(field("refunds", "amount", SemanticType::float())),
            SemanticType::float(),
        )
        .with_distinct_key(field("refunds", "id", SemanticType::integer()))
    };
    let mut query = Query::new(
        "refunds",
        "refunds",
        Segment::new("q")
            .measure("total", measure(AggregateFunc::Sum))
            .measure("average", measure(AggregateFunc::Avg)),
    );
    query.joins.push(Join {
        alias: "lines".to_string(),
        kind: JoinKind::Table {
            table: "refund_lines".to_string(),
            on: Expr::binary(
                field("lines", "refund_id", SemanticType::integer()),
                BinOp::Eq,
                field("refunds", "id", SemanticType::integer()),
                SemanticType::Boolean,
            ),
            cardinality: Cardinality::Many,
        },
    });

    let sql = compile(&query, &options()).unwrap().sql;
    let (total, average): (f64, f64) = connection()
        .query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap();
    assert_eq!(total, 40.0);
    // the null amount is left out, the zero is not
    assert!((average - 40.0 / 3.0).abs() < 1e-9, "{average}");
}

#[test]
fn week_truncation_starts_on_monday() {
    let conn = connection();
    // 2024-01-03 is a Wednesday
    let expr = Expr::truncate(Expr::date("2024-01-03"), TimestampUnit::Week);
    let sql = compile_expr(&expr, &options()).unwrap();
    let monday: String = conn
        .query_row(&format!("SELECT CAST({sql} AS VARCHAR)"), [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(monday, "2024-01-01");
}

#[test]
fn day_of_week_counts_from_monday() {
    let conn = connection();
    let day_of_week = |date: &str| -> i64 {
        let expr = Expr::new(
            ExprKind::Extract {
                expr: Box::new(Expr::date(date)),
                unit: ExtractUnit::DayOfWeek,
            },
            SemanticType::integer(),
        );
        let sql = compile_expr(&expr, &options()).unwrap();
        conn.query_row(&format!("SELECT CAST({sql} AS BIGINT)"), [], |row| row.get(0))
            .unwrap()
    };
    assert_eq!(day_of_week("2024-01-01"), 1);
    assert_eq!(day_of_week("2024-01-06"), 6);
    assert_eq!(day_of_week("2024-01-07"), 7);
}

#[test]
fn nested_group_sets() {
    let root = Segment::new("by_state")
        .dimension("state", field("base", "state", SemanticType::String))
        .measure("flight_count", count())
        .nest(
            Segment::new("by_carrier")
                .dimension("carrier", field("base", "carrier", SemanticType::String))
                .measure("flight_count", count()),
        );
    let query = Query::new("flights", "base", root);
    let sql = compile(&query, &options()).unwrap().sql;

    let conn = connection();
    let mut stmt = conn
        .prepare(&format!(
            "SELECT state, flight_count, len(by_carrier) FROM ({sql}) ORDER BY state"
        ))
        .unwrap();
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(
        rows,
        vec![("CA".to_string(), 3, 2), ("NY".to_string(), 1, 1)]
    );
}
