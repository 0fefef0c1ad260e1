//! SQL generation.
//!
//! A query is rendered in three parts: the FROM clause with its joins, the
//! row filters, and the select list of the root segment. Without nesting the
//! select list becomes a single `SELECT .. GROUP BY`; with nesting it goes
//! through [group_set].

mod gen_expr;
mod group_set;
mod symmetric;
mod temporal;
mod time;
mod unnest;

use std::collections::HashMap;

use dialectic_ir::ir::{
    Cardinality, Expr, FieldDescriptor, JoinKind, Query, RecordField, RelationKind, Segment,
    SegmentShape, SemanticType, SortDirection, TemporalFilter,
};
use itertools::Itertools;
use serde::Serialize;
use sqlformat::{FormatOptions, QueryParams};

use crate::dialect::DialectHandler;
use crate::functions::Catalog;
use crate::registry::{registry, Entry};
use crate::{compiler_version, utils};
use crate::{Error, ErrorMessage, Options, Reason, Result, WithErrorInfo};

/// SQL of a compiled query, with the shape of its result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    /// Output columns, in order. Nested segments are array (or record)
    /// valued columns, described down to their leaf fields.
    pub fields: Vec<FieldDescriptor>,
    /// Warnings about degraded code paths, and lints.
    pub diagnostics: Vec<ErrorMessage>,
}

/// State of one compilation.
pub(crate) struct Context<'a> {
    pub dialect: &'a dyn DialectHandler,
    pub catalog: &'a Catalog,

    /// Query timezone, when it differs from the backend's native timezone.
    pub timezone: Option<String>,

    /// SQL of the array iterated by each unnest alias.
    pub unnests: HashMap<String, String>,

    /// Relations whose rows repeat the rows of the relations they are joined
    /// to.
    pub repeating: Vec<String>,

    /// Group set that aggregates are currently restricted to.
    pub group_set: Option<usize>,

    pub diagnostics: Vec<Error>,
}

impl<'a> Context<'a> {
    fn new(entry: &'a Entry) -> Self {
        Context {
            dialect: entry.handler.as_ref(),
            catalog: &entry.catalog,
            timezone: None,
            unnests: HashMap::new(),
            repeating: Vec::new(),
            group_set: None,
            diagnostics: Vec::new(),
        }
    }

    fn with_timezone(mut self, timezone: Option<&str>) -> Self {
        let native = self.dialect.native_timezone();
        self.timezone = timezone.filter(|tz| *tz != native).map(str::to_string);
        self
    }

    pub fn ident(&self, name: &str) -> String {
        utils::ident(self.dialect, name)
    }
}

pub(crate) fn compile(query: &Query, options: &Options) -> Result<CompiledQuery> {
    let entry = registry()?.get(&options.dialect)?;
    let timezone = query.timezone.as_deref().or(options.timezone.as_deref());
    let mut ctx = Context::new(entry).with_timezone(timezone);
    log::debug!(
        "compiling query over `{}` for {} (timezone: {:?})",
        query.source.table,
        ctx.dialect.name(),
        ctx.timezone
    );

    let from = gen_from(query, options, &mut ctx)?;
    let filters = gen_filters(&query.filters, &mut ctx)?;

    let sql = if query.root.nested.is_empty() {
        gen_flat(&query.root, &from, filters.as_deref(), &mut ctx)?
    } else {
        if !ctx.dialect.supports_nesting() {
            return Err(Error::unsupported(ctx.dialect.name(), "nested segments"));
        }
        group_set::gen_nested(&query.root, &from, filters.as_deref(), &mut ctx)?
    };
    log::trace!("generated SQL: {sql}");

    let sql = finish(sql, options, ctx.dialect);
    let diagnostics = ctx.diagnostics.into_iter().map(ErrorMessage::from).collect();

    Ok(CompiledQuery {
        sql,
        fields: output_fields(&query.root),
        diagnostics,
    })
}

pub(crate) fn compile_expr(expr: &Expr, options: &Options) -> Result<String> {
    let entry = registry()?.get(&options.dialect)?;
    let mut ctx = Context::new(entry).with_timezone(options.timezone.as_deref());
    gen_expr::render(expr, &mut ctx)
}

pub(crate) fn compile_temporal_filter(
    sql: &str,
    ty: &SemanticType,
    filter: &TemporalFilter,
    options: &Options,
) -> Result<String> {
    let entry = registry()?.get(&options.dialect)?;
    let ctx = Context::new(entry).with_timezone(options.timezone.as_deref());
    temporal::compile(&ctx, sql, ty, filter)
}

/// The FROM clause: the (sampled) source table and its joins.
fn gen_from(query: &Query, options: &Options, ctx: &mut Context) -> Result<String> {
    let source = &query.source;
    let table = match source.sample {
        Some(sampling) => ctx.dialect.sample_table(&source.table, sampling)?,
        None => source.table.clone(),
    };
    let mut from = format!("FROM {table} AS {}", ctx.ident(&source.alias));

    for join in &query.joins {
        let clause = match &join.kind {
            JoinKind::Table {
                table,
                on,
                cardinality,
            } => {
                log::debug!("joining `{table}` as `{}` ({cardinality:?})", join.alias);
                if *cardinality == Cardinality::Many {
                    ctx.repeating.push(join.alias.clone());
                }
                let on = gen_expr::render(on, ctx)?;
                format!("LEFT JOIN {table} AS {} ON {on}", ctx.ident(&join.alias))
            }
            JoinKind::Unnest(unnest) => {
                ctx.repeating.push(join.alias.clone());
                unnest::gen_unnest(&join.alias, unnest, options.unnest_bound, ctx)?
            }
        };
        from += " ";
        from += &clause;
    }
    Ok(from)
}

fn gen_filters(filters: &[Expr], ctx: &mut Context) -> Result<Option<String>> {
    if let Some(aggregate) = filters.iter().find(|f| f.is_aggregate()) {
        return Err(Error::new(Reason::Unexpected {
            found: format!("aggregate in a row filter ({})", aggregate.kind.as_ref()),
        })
        .push_hint("filter on aggregates with a measure of a nested segment instead"));
    }

    let rendered: Vec<String> = filters
        .iter()
        .map(|f| gen_expr::render(f, ctx))
        .try_collect()?;
    Ok(match rendered.len() {
        0 => None,
        1 => rendered.into_iter().next(),
        _ => Some(rendered.iter().map(|f| format!("({f})")).join(" AND ")),
    })
}

/// A segment without nesting: one `SELECT .. GROUP BY`.
fn gen_flat(
    segment: &Segment,
    from: &str,
    filters: Option<&str>,
    ctx: &mut Context,
) -> Result<String> {
    let mut items = Vec::new();
    for field in segment.dimensions.iter().chain(&segment.measures) {
        let sql = gen_expr::render(&field.expr, ctx)?;
        items.push(format!("{sql} AS {}", ctx.ident(&field.name)));
    }
    if items.is_empty() {
        return Err(Error::new_simple(format!(
            "segment `{}` has no fields",
            segment.name
        )));
    }

    let mut sql = format!("SELECT {} {from}", items.join(", "));
    if let Some(filters) = filters {
        sql += &format!(" WHERE {filters}");
    }
    sql += &group_by(1, segment.dimensions.len());
    sql += &order_and_limit(segment, ctx)?;
    Ok(sql)
}

/// `GROUP BY` the select list positions `first..first + count`.
pub(super) fn group_by(first: usize, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let positions = (first..first + count).join(",");
    format!(" GROUP BY {positions}")
}

/// Ordering of a segment's rows, by the names of its output fields.
///
/// Without an explicit ordering, rows are ordered by the first measure
/// descending or, without measures, by the first dimension.
pub(super) fn ordering(segment: &Segment) -> Result<Vec<(&str, SortDirection)>> {
    if segment.order_by.is_empty() {
        if segment.dimensions.is_empty() {
            return Ok(Vec::new());
        }
        let default = match segment.measures.first() {
            Some(measure) => (measure.name.as_str(), SortDirection::Desc),
            None => (segment.dimensions[0].name.as_str(), SortDirection::Asc),
        };
        return Ok(vec![default]);
    }

    segment
        .order_by
        .iter()
        .map(|order| {
            let known = segment
                .dimensions
                .iter()
                .chain(&segment.measures)
                .any(|f| f.name == order.field);
            if known {
                Ok((order.field.as_str(), order.direction))
            } else {
                Err(Error::new(Reason::NotFound {
                    name: order.field.clone(),
                    namespace: format!("ordering field of segment `{}`", segment.name),
                }))
            }
        })
        .collect()
}

fn order_and_limit(segment: &Segment, ctx: &Context) -> Result<String> {
    let mut sql = String::new();
    let terms = ordering(segment)?
        .into_iter()
        .map(|(name, direction)| ctx.dialect.order_term(&ctx.ident(name), direction))
        .collect_vec();
    if !terms.is_empty() {
        sql += &format!(" ORDER BY {}", terms.join(", "));
    }
    if let Some(limit) = segment.limit {
        sql += &format!(" LIMIT {limit}");
    }
    Ok(sql)
}

/// Applies formatting and the signature comment.
fn finish(sql: String, options: &Options, dialect: &dyn DialectHandler) -> String {
    let mut sql = if options.format {
        sqlformat::format(&sql, &QueryParams::None, &FormatOptions::default())
    } else {
        sql
    };

    if options.signature_comment {
        let signature = format!(
            "-- Generated by dialectic version:{} target:{}\n",
            compiler_version(),
            dialect.name()
        );
        sql.insert_str(0, &signature);
    }
    sql
}

/// Descriptors of the output columns of a segment.
pub(super) fn output_fields(segment: &Segment) -> Vec<FieldDescriptor> {
    let scalars = segment
        .dimensions
        .iter()
        .chain(&segment.measures)
        .map(|f| FieldDescriptor::new(&f.name, f.expr.ty.clone(), RelationKind::Table));
    let nested = segment
        .nested
        .iter()
        .map(|n| FieldDescriptor::new(&n.name, segment_type(n), RelationKind::Table));
    scalars.chain(nested).collect()
}

/// Type of the column a nested segment becomes in its parent.
pub(super) fn segment_type(segment: &Segment) -> SemanticType {
    let record = SemanticType::Record(
        output_fields(segment)
            .into_iter()
            .map(|f| RecordField {
                name: f.name,
                ty: f.ty,
            })
            .collect(),
    );
    match segment.shape {
        SegmentShape::Array => SemanticType::Array(Box::new(record)),
        SegmentShape::Record => record,
    }
}

#[cfg(test)]
mod test {
    use dialectic_ir::ir::{AggregateFunc, FieldRef, FieldShape, RelationKind};
    use insta::assert_snapshot;

    use super::*;

    fn field(name: &str, ty: SemanticType) -> Expr {
        Expr::field(FieldRef::new("base", RelationKind::Table, name), ty)
    }

    fn options(dialect: &str) -> Options {
        Options::default()
            .with_dialect(dialect)
            .no_format()
            .no_signature()
    }

    #[test]
    fn test_flat_query() {
        let count = Expr::aggregate(AggregateFunc::Count, None, SemanticType::integer());
        let root = Segment::new("by_state")
            .dimension("state", field("state", SemanticType::String))
            .measure("flight_count", count)
            .limit(10);
        let query = Query::new("flights", "base", root);

        let compiled = compile(&query, &options("postgres")).unwrap();
        assert_snapshot!(compiled.sql, @"SELECT base.state AS state, COUNT(1) AS flight_count FROM flights AS base GROUP BY 1 ORDER BY flight_count DESC NULLS LAST LIMIT 10");
        assert!(compiled.diagnostics.is_empty());
        assert_eq!(compiled.fields.len(), 2);
    }

    #[test]
    fn test_signature_and_format() {
        let root = Segment::new("q").dimension("state", field("state", SemanticType::String));
        let query = Query::new("flights", "base", root);
        let compiled = compile(&query, &Options::default().with_dialect("bigquery")).unwrap();
        assert!(compiled
            .sql
            .starts_with("-- Generated by dialectic version:"));
        assert!(compiled.sql.contains("target:bigquery\n"));
        assert!(compiled.sql.contains("GROUP BY"));
    }

    #[test]
    fn test_unknown_order_field() {
        let root = Segment::new("q")
            .dimension("state", field("state", SemanticType::String))
            .order("nope", SortDirection::Asc);
        let query = Query::new("flights", "base", root);
        let error = compile(&query, &options("duckdb")).unwrap_err();
        assert_snapshot!(error.reason, @"ordering field of segment `q` `nope` not found");
    }

    #[test]
    fn test_filters() {
        let root = Segment::new("q").dimension("state", field("state", SemanticType::String));
        let mut query = Query::new("flights", "base", root);
        query.filters = vec![
            Expr::binary(
                field("distance", SemanticType::integer()),
                dialectic_ir::ir::BinOp::Gt,
                Expr::number(100),
                SemanticType::Boolean,
            ),
            Expr::new(
                dialectic_ir::ir::UnaryExpr {
                    op: dialectic_ir::ir::UnOp::IsNotNull,
                    expr: Box::new(field("state", SemanticType::String)),
                },
                SemanticType::Boolean,
            ),
        ];
        let compiled = compile(&query, &options("mysql")).unwrap();
        assert_snapshot!(compiled.sql, @"SELECT base.state AS state FROM flights AS base WHERE (base.distance > 100) AND (base.state IS NOT NULL) GROUP BY 1 ORDER BY state ASC");
    }

    #[test]
    fn test_nested_output_fields() {
        let count = Expr::aggregate(AggregateFunc::Count, None, SemanticType::integer());
        let root = Segment::new("q")
            .dimension("state", field("state", SemanticType::String))
            .nest(
                Segment::new("by_carrier")
                    .dimension("carrier", field("carrier", SemanticType::String))
                    .measure("c", count.clone()),
            )
            .nest(
                Segment::new("totals")
                    .measure("c", count)
                    .with_shape(SegmentShape::Record),
            );
        let fields = output_fields(&root);
        assert_eq!(fields[1].shape, FieldShape::Nested);
        assert_eq!(fields[2].shape, FieldShape::Record);
        assert_eq!(
            fields[2].ty,
            SemanticType::Record(vec![RecordField {
                name: "c".to_string(),
                ty: SemanticType::integer()
            }])
        );
    }

    #[test]
    fn test_timezone_matching_native_is_ignored() {
        let entry = registry().unwrap().get("postgres").unwrap();
        assert_eq!(Context::new(entry).with_timezone(Some("UTC")).timezone, None);
        assert_eq!(
            Context::new(entry)
                .with_timezone(Some("America/New_York"))
                .timezone
                .as_deref(),
            Some("America/New_York")
        );
    }
}
