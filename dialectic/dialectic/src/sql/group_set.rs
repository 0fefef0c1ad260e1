//! Nested segments, compiled by group-set multiplexing.
//!
//! Every segment of the tree is a grouping level with a number, its group
//! set. The source is scanned once, cross joined with the numbers of all
//! group sets, and aggregated by group set and the dimensions of all
//! levels. A dimension is only evaluated for the group sets of its own
//! subtree, and a measure only aggregates the rows of its own group set.
//!
//! The levels are then collapsed bottom up, one `WITH` stage per depth: the
//! rows of each deepest level are folded into an array (or record) valued
//! column of their parent's row, and their group set is renamed to the
//! parent's, until only the root is left.

use itertools::Itertools;

use dialectic_ir::ir::{Segment, SegmentShape};

use super::{gen_expr, group_by, order_and_limit, ordering, segment_type, Context};
use crate::dialect::TurtleField;
use crate::utils::{IdGenerator, NameGenerator};
use crate::{Error, Result};

/// One segment of the tree, numbered in pre-order.
#[derive(Debug)]
struct Level<'s> {
    id: usize,
    parent: Option<usize>,
    depth: usize,
    segment: &'s Segment,
    /// Group sets of this level and all levels below it.
    subtree: Vec<usize>,
}

fn number_levels(root: &Segment) -> Vec<Level> {
    fn visit<'s>(
        segment: &'s Segment,
        parent: Option<usize>,
        depth: usize,
        ids: &mut IdGenerator<usize>,
        levels: &mut Vec<Level<'s>>,
    ) {
        let id = ids.gen();
        let index = levels.len();
        levels.push(Level {
            id,
            parent,
            depth,
            segment,
            subtree: Vec::new(),
        });
        for child in &segment.nested {
            visit(child, Some(id), depth + 1, ids, levels);
        }
        levels[index].subtree = levels[index..].iter().map(|l| l.id).collect();
    }

    let mut levels = Vec::new();
    visit(root, None, 0, &mut IdGenerator::new(), &mut levels);
    levels
}

/// Name of a level's column in the intermediate stages.
fn column(name: &str, group_set: usize) -> String {
    format!("{name}__{group_set}")
}

pub(super) fn gen_nested(
    root: &Segment,
    from: &str,
    filters: Option<&str>,
    ctx: &mut Context,
) -> Result<String> {
    let levels = number_levels(root);
    let depth = root.depth();
    log::debug!(
        "compiling {} nested segments of `{}` to depth {depth}",
        levels.len() - 1,
        root.name
    );

    let mut stages = Vec::new();
    let mut names = NameGenerator::new("__stage");

    let base = gen_base(&levels, from, filters, ctx)?;
    stages.push((names.gen(), base));

    for d in (2..=depth).rev() {
        let (input, _) = stages.last().ok_or_else(|| Error::new_assert("no stage"))?;
        let stage = gen_collapse(&levels, d, input, ctx)?;
        stages.push((names.gen(), stage));
    }

    let (input, _) = stages.last().ok_or_else(|| Error::new_assert("no stage"))?;
    let last = gen_final(&levels, input, ctx)?;

    let with = stages
        .iter()
        .map(|(name, sql)| format!("{name} AS ({sql})"))
        .join(", ");
    Ok(format!("WITH {with} {last}"))
}

/// The single scan: every dimension and measure of every level, by group set.
fn gen_base(
    levels: &[Level],
    from: &str,
    filters: Option<&str>,
    ctx: &mut Context,
) -> Result<String> {
    let mut dimensions = Vec::new();
    let mut measures = Vec::new();

    for level in levels {
        for dimension in &level.segment.dimensions {
            let sql = gen_expr::render(&dimension.expr, ctx)?;
            let sql = if level.subtree.len() == levels.len() {
                sql
            } else {
                let subtree = level.subtree.iter().join(",");
                format!("CASE WHEN group_set IN ({subtree}) THEN {sql} END")
            };
            let name = ctx.ident(&column(&dimension.name, level.id));
            dimensions.push(format!("{sql} AS {name}"));
        }

        ctx.group_set = Some(level.id);
        for measure in &level.segment.measures {
            let sql = gen_expr::render(&measure.expr, ctx)?;
            let name = ctx.ident(&column(&measure.name, level.id));
            measures.push(format!("{sql} AS {name}"));
        }
        ctx.group_set = None;
    }

    let group_set_table = ctx.dialect.group_set_table(levels.len() - 1)?;
    let items = std::iter::once("group_set".to_string())
        .chain(dimensions.iter().cloned())
        .chain(measures)
        .join(", ");
    let mut sql = format!("SELECT {items} {from} {group_set_table}");
    if let Some(filters) = filters {
        sql += &format!(" WHERE {filters}");
    }
    sql += &group_by(1, dimensions.len() + 1);
    Ok(sql)
}

/// Folds the levels at depth `d` into their parents, which are not the root.
fn gen_collapse(levels: &[Level], d: usize, input: &str, ctx: &Context) -> Result<String> {
    let collapsed = levels.iter().filter(|l| l.depth == d).collect_vec();

    let remap = collapsed
        .iter()
        .filter_map(|l| l.parent.map(|p| format!(" WHEN group_set={} THEN {p}", l.id)))
        .join("");
    let mut items = vec![format!("CASE{remap} ELSE group_set END AS group_set")];

    let live = levels.iter().filter(|l| l.depth < d).collect_vec();
    let mut dimensions = 0;
    for level in &live {
        for dimension in &level.segment.dimensions {
            items.push(ctx.ident(&column(&dimension.name, level.id)));
            dimensions += 1;
        }
    }
    for level in &live {
        for measure in &level.segment.measures {
            let name = ctx.ident(&column(&measure.name, level.id));
            let value = ctx.dialect.any_value_last(level.id, &name)?;
            items.push(format!("{value} AS {name}"));
        }
    }
    for level in &collapsed {
        let parent = (level.parent)
            .ok_or_else(|| Error::new_assert("nested level without parent"))?;
        let turtle = gen_turtle(level, levels, ctx)?;
        let name = ctx.ident(&column(&level.segment.name, parent));
        items.push(format!("{turtle} AS {name}"));
    }

    Ok(format!(
        "SELECT {} FROM {input}{}",
        items.join(", "),
        group_by(1, dimensions + 1)
    ))
}

/// Folds the levels just below the root into the root rows, and names the
/// columns as the result names them.
fn gen_final(levels: &[Level], input: &str, ctx: &Context) -> Result<String> {
    let root = levels.first().ok_or_else(|| Error::new_assert("no root level"))?;
    let segment = root.segment;

    let mut items = Vec::new();
    for dimension in &segment.dimensions {
        let col = ctx.ident(&column(&dimension.name, root.id));
        items.push(format!("{col} AS {}", ctx.ident(&dimension.name)));
    }
    for measure in &segment.measures {
        let col = ctx.ident(&column(&measure.name, root.id));
        let value = ctx.dialect.any_value_last(root.id, &col)?;
        items.push(format!("{value} AS {}", ctx.ident(&measure.name)));
    }
    for level in levels.iter().filter(|l| l.depth == 1) {
        let turtle = gen_turtle(level, levels, ctx)?;
        items.push(format!("{turtle} AS {}", ctx.ident(&level.segment.name)));
    }

    let mut sql = format!("SELECT {} FROM {input}", items.join(", "));
    sql += &group_by(1, segment.dimensions.len());
    sql += &order_and_limit(segment, ctx)?;
    Ok(sql)
}

/// The array (or record) a level becomes in its parent's row.
fn gen_turtle(level: &Level, levels: &[Level], ctx: &Context) -> Result<String> {
    let segment = level.segment;
    let children = levels.iter().filter(|l| l.parent == Some(level.id)).collect_vec();

    let columns = segment
        .dimensions
        .iter()
        .chain(&segment.measures)
        .map(|f| ctx.ident(&column(&f.name, level.id)))
        .chain(
            children
                .iter()
                .map(|c| ctx.ident(&column(&c.segment.name, level.id))),
        )
        .collect_vec();
    let types = segment
        .dimensions
        .iter()
        .chain(&segment.measures)
        .map(|f| f.expr.ty.clone())
        .chain(children.iter().map(|c| segment_type(c.segment)))
        .collect_vec();
    let names = segment
        .dimensions
        .iter()
        .chain(&segment.measures)
        .map(|f| f.name.as_str())
        .chain(children.iter().map(|c| c.segment.name.as_str()));

    let fields = names
        .zip(&columns)
        .zip(&types)
        .map(|((name, sql), ty)| TurtleField { name, sql, ty })
        .collect_vec();

    let dialect = ctx.dialect;
    match segment.shape {
        SegmentShape::Array => {
            let order_by = ordering(segment)?
                .into_iter()
                .map(|(name, direction)| {
                    dialect.order_term(&ctx.ident(&column(name, level.id)), direction)
                })
                .collect_vec();
            let order_by = (!order_by.is_empty()).then(|| order_by.join(", "));
            dialect.aggregate_turtle(level.id, &fields, order_by.as_deref(), segment.limit)
        }
        SegmentShape::Record if segment.dimensions.is_empty() => {
            dialect.coalesce_measures_inline(level.id, &fields)
        }
        SegmentShape::Record => dialect.any_value_turtle(level.id, &fields),
    }
}

#[cfg(test)]
mod test {
    use dialectic_ir::ir::{AggregateFunc, Expr, FieldRef, Query, RelationKind, SemanticType};
    use insta::assert_snapshot;

    use crate::Options;

    use super::*;

    fn field(name: &str, ty: SemanticType) -> Expr {
        Expr::field(FieldRef::new("base", RelationKind::Table, name), ty)
    }

    fn count() -> Expr {
        Expr::aggregate(AggregateFunc::Count, None, SemanticType::integer())
    }

    fn compile(dialect: &str, root: Segment) -> Result<String> {
        let query = Query::new("flights", "base", root);
        let options = Options::default()
            .with_dialect(dialect)
            .no_format()
            .no_signature();
        super::super::compile(&query, &options).map(|c| c.sql)
    }

    #[test]
    fn test_numbering() {
        let root = Segment::new("q")
            .nest(Segment::new("a").nest(Segment::new("aa")))
            .nest(Segment::new("b"));
        let levels = number_levels(&root);
        let summary = levels
            .iter()
            .map(|l| (l.segment.name.as_str(), l.id, l.parent, l.depth, l.subtree.clone()))
            .collect_vec();
        assert_eq!(
            summary,
            vec![
                ("q", 0, None, 0, vec![0, 1, 2, 3]),
                ("a", 1, Some(0), 1, vec![1, 2]),
                ("aa", 2, Some(1), 2, vec![2]),
                ("b", 3, Some(0), 1, vec![3]),
            ]
        );
    }

    #[test]
    fn test_one_level() {
        let root = Segment::new("q")
            .dimension("state", field("state", SemanticType::String))
            .nest(
                Segment::new("by_carrier")
                    .dimension("carrier", field("carrier", SemanticType::String))
                    .measure("c", count()),
            );
        assert_snapshot!(
            compile("duckdb", root).unwrap(),
            @r#"WITH __stage0 AS (SELECT group_set, base.state AS state__0, CASE WHEN group_set IN (1) THEN base.carrier END AS carrier__1, COUNT(CASE WHEN group_set=1 THEN 1 END) AS c__1 FROM flights AS base CROSS JOIN (SELECT UNNEST(GENERATE_SERIES(0,1,1)) as group_set  ) as group_set GROUP BY 1,2,3) SELECT state__0 AS state, COALESCE(LIST({"carrier": carrier__1, "c": c__1} ORDER BY c__1 DESC NULLS LAST) FILTER (WHERE group_set=1),[]) AS by_carrier FROM __stage0 GROUP BY 1 ORDER BY state ASC NULLS LAST"#
        );
    }

    #[test]
    fn test_two_levels() {
        let by_month = Segment::new("by_month")
            .dimension("month", field("month", SemanticType::integer()))
            .measure("c", count());
        let root = Segment::new("q")
            .measure("total", count())
            .nest(
                Segment::new("by_carrier")
                    .dimension("carrier", field("carrier", SemanticType::String))
                    .measure("c", count())
                    .nest(by_month),
            );
        let sql = compile("duckdb", root).unwrap();
        assert_snapshot!(
            sql,
            @r#"WITH __stage0 AS (SELECT group_set, CASE WHEN group_set IN (1,2) THEN base.carrier END AS carrier__1, CASE WHEN group_set IN (2) THEN base.month END AS month__2, COUNT(CASE WHEN group_set=0 THEN 1 END) AS total__0, COUNT(CASE WHEN group_set=1 THEN 1 END) AS c__1, COUNT(CASE WHEN group_set=2 THEN 1 END) AS c__2 FROM flights AS base CROSS JOIN (SELECT UNNEST(GENERATE_SERIES(0,2,1)) as group_set  ) as group_set GROUP BY 1,2,3), __stage1 AS (SELECT CASE WHEN group_set=2 THEN 1 ELSE group_set END AS group_set, carrier__1, MAX(CASE WHEN group_set=0 THEN total__0 END) AS total__0, MAX(CASE WHEN group_set=1 THEN c__1 END) AS c__1, COALESCE(LIST({"month": month__2, "c": c__2} ORDER BY c__2 DESC NULLS LAST) FILTER (WHERE group_set=2),[]) AS by_month__1 FROM __stage0 GROUP BY 1,2) SELECT MAX(CASE WHEN group_set=0 THEN total__0 END) AS total, COALESCE(LIST({"carrier": carrier__1, "c": c__1, "by_month": by_month__1} ORDER BY c__1 DESC NULLS LAST) FILTER (WHERE group_set=1),[]) AS by_carrier FROM __stage1"#
        );
    }

    #[test]
    fn test_record_shape() {
        let root = Segment::new("q")
            .dimension("state", field("state", SemanticType::String))
            .nest(
                Segment::new("totals")
                    .measure("c", count())
                    .with_shape(SegmentShape::Record),
            );
        let sql = compile("duckdb", root).unwrap();
        assert!(sql.contains(
            r#"COALESCE(FIRST({"c": c__1}) FILTER(WHERE group_set=1), {"c": NULL}) AS totals"#
        ));
    }

    #[test]
    fn test_unknown_nested_order_field() {
        let root = Segment::new("q")
            .dimension("state", field("state", SemanticType::String))
            .nest(
                Segment::new("n")
                    .measure("c", count())
                    .order("nope", dialectic_ir::ir::SortDirection::Desc),
            );
        let error = compile("duckdb", root).unwrap_err();
        assert_snapshot!(error.reason, @"ordering field of segment `n` `nope` not found");
    }
}
