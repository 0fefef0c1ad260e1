//! Rendering of expression nodes.

use dialectic_ir::ir::{
    BinOp, BinaryExpr, CaseExpr, Expr, ExprKind, FieldRef, FunctionCall, Literal, RelationKind,
    SemanticType, UnOp, UnaryExpr,
};
use itertools::Itertools;

use super::{symmetric, temporal, time, Context};
use crate::{Error, Reason, Result};

pub(super) fn render(expr: &Expr, ctx: &mut Context) -> Result<String> {
    let sql = match &expr.kind {
        ExprKind::Literal(literal) => render_literal(literal, ctx),
        ExprKind::Field(field) => render_field(field, &expr.ty, ctx)?,

        ExprKind::Cast { expr: inner, safe } => {
            let sql = render(inner, ctx)?;
            if inner.ty == expr.ty {
                sql
            } else if inner.ty.is_temporal() && expr.ty.is_temporal() && !safe {
                time::cast(ctx, &sql, &inner.ty, &expr.ty)?
            } else {
                ctx.dialect.cast(&sql, &inner.ty, &expr.ty, *safe)?
            }
        }
        ExprKind::Truncate { expr: inner, unit } => {
            let kind = time::kind_of(&inner.ty, "truncation")?;
            let sql = render(inner, ctx)?;
            time::truncate(ctx, &sql, kind, *unit)
        }
        ExprKind::Extract { expr: inner, unit } => {
            let kind = time::kind_of(&inner.ty, "extraction")?;
            let sql = render(inner, ctx)?;
            time::extract(ctx, &sql, kind, *unit)
        }
        ExprKind::Delta {
            base,
            op,
            amount,
            unit,
        } => {
            let kind = time::kind_of(&base.ty, "time arithmetic")?;
            let base = render(base, ctx)?;
            let amount = render(amount, ctx)?;
            time::delta(ctx, &base, kind, *op, &amount, *unit)
        }
        ExprKind::Measure { from, to, unit } => {
            let from_kind = time::kind_of(&from.ty, "time measurement")?;
            let to_kind = time::kind_of(&to.ty, "time measurement")?;
            let from = render(from, ctx)?;
            let to = render(to, ctx)?;
            time::measure(ctx, (&from, from_kind), (&to, to_kind), *unit)?
        }

        ExprKind::RegexMatch { expr, regex } => {
            let expr = render(expr, ctx)?;
            let regex = render(regex, ctx)?;
            ctx.dialect.regex_match(&expr, &regex)
        }
        ExprKind::FunctionCall(call) => render_call(call, ctx)?,
        ExprKind::Now => ctx.dialect.now(),

        ExprKind::Binary(binary) => render_binary(binary, ctx)?,
        ExprKind::Unary(unary) => render_unary(unary, ctx)?,
        ExprKind::Case(case) => render_case(case, ctx)?,
        ExprKind::Aggregate(aggregate) => symmetric::render_aggregate(aggregate, ctx)?,

        ExprKind::TemporalFilter { expr, filter } => {
            let sql = render(expr, ctx)?;
            temporal::compile(ctx, &sql, &expr.ty, filter)?
        }
    };
    log::trace!("{} -> {sql}", expr.kind.as_ref());
    Ok(sql)
}

fn render_literal(literal: &Literal, ctx: &Context) -> String {
    let dialect = ctx.dialect;
    match literal {
        Literal::Null => "NULL".to_string(),
        Literal::Number(text) => text.clone(),
        Literal::String(text) => dialect.string_literal(text),
        Literal::Boolean(value) => value.to_string(),
        Literal::Date(value) => dialect.date_literal(value),
        Literal::Timestamp { value, timezone } => {
            let timezone = timezone.as_deref().or(ctx.timezone.as_deref());
            dialect.timestamp_literal(value, timezone)
        }
        Literal::Regex(pattern) => dialect.regex_literal(pattern),
    }
}

fn render_field(field: &FieldRef, ty: &SemanticType, ctx: &Context) -> Result<String> {
    match field.relation_kind {
        RelationKind::Table | RelationKind::Join => Ok(format!(
            "{}.{}",
            ctx.ident(&field.relation),
            ctx.ident(&field.name)
        )),
        RelationKind::Struct { array_of_scalars } => {
            let source = ctx.unnests.get(&field.relation).ok_or_else(|| {
                Error::new(Reason::NotFound {
                    name: field.relation.clone(),
                    namespace: "unnested relation".to_string(),
                })
            })?;
            ctx.dialect
                .unnested_field(&field.relation, source, &field.name, ty, array_of_scalars)
        }
    }
}

fn render_call(call: &FunctionCall, ctx: &mut Context) -> Result<String> {
    let catalog = ctx.catalog;
    let types = call.args.iter().map(|a| a.ty.clone()).collect_vec();
    let overload = catalog.resolve(&call.name, &types)?;

    let mut args: Vec<String> = call.args.iter().map(|a| render(a, ctx)).try_collect()?;
    if overload.def.aggregate {
        // Aggregates skip nulls, so restricting the aggregated value is
        // enough to restrict the whole call to one group set.
        if let Some(first) = args.first_mut() {
            *first = symmetric::restrict(ctx.group_set, first);
        }
    }

    let mut order_by = Vec::with_capacity(call.order_by.len());
    for order in &call.order_by {
        let term = render(&order.expr, ctx)?;
        order_by.push(ctx.dialect.order_term(&term, order.direction));
    }

    overload.render(&ctx.dialect.name(), &args, &order_by, call.limit)
}

fn render_binary(binary: &BinaryExpr, ctx: &mut Context) -> Result<String> {
    let left = render_operand(&binary.left, ctx)?;
    let right = render_operand(&binary.right, ctx)?;
    Ok(match binary.op {
        BinOp::Div => ctx.dialect.divide(&left, &right),
        BinOp::Mod => ctx.dialect.modulo(&left, &right),
        op => format!("{left} {op} {right}"),
    })
}

fn render_unary(unary: &UnaryExpr, ctx: &mut Context) -> Result<String> {
    let operand = render_operand(&unary.expr, ctx)?;
    Ok(match unary.op {
        UnOp::Neg => format!("-{operand}"),
        UnOp::Not => format!("NOT {operand}"),
        UnOp::IsNull => format!("{operand} IS NULL"),
        UnOp::IsNotNull => format!("{operand} IS NOT NULL"),
    })
}

/// Operators are wrapped in parentheses when nested in another operator.
fn render_operand(expr: &Expr, ctx: &mut Context) -> Result<String> {
    let sql = render(expr, ctx)?;
    Ok(match &expr.kind {
        ExprKind::Binary(_) | ExprKind::Unary(_) | ExprKind::TemporalFilter { .. } => {
            format!("({sql})")
        }
        _ => sql,
    })
}

fn render_case(case: &CaseExpr, ctx: &mut Context) -> Result<String> {
    let mut sql = "CASE".to_string();
    for switch in &case.cases {
        let condition = render(&switch.condition, ctx)?;
        let value = render(&switch.value, ctx)?;
        sql += &format!(" WHEN {condition} THEN {value}");
    }
    if let Some(default) = &case.default {
        sql += &format!(" ELSE {}", render(default, ctx)?);
    }
    sql += " END";
    Ok(sql)
}

/// Aliases of the relations an expression reads from.
pub(super) fn relations(expr: &Expr) -> Vec<&str> {
    fn collect<'e>(expr: &'e Expr, out: &mut Vec<&'e str>) {
        match &expr.kind {
            ExprKind::Field(field) => out.push(&field.relation),
            ExprKind::Literal(_) | ExprKind::Now => {}
            ExprKind::Cast { expr, .. }
            | ExprKind::Truncate { expr, .. }
            | ExprKind::Extract { expr, .. }
            | ExprKind::TemporalFilter { expr, .. } => collect(expr, out),
            ExprKind::Delta { base, amount, .. } => {
                collect(base, out);
                collect(amount, out);
            }
            ExprKind::Measure { from, to, .. } => {
                collect(from, out);
                collect(to, out);
            }
            ExprKind::RegexMatch { expr, regex } => {
                collect(expr, out);
                collect(regex, out);
            }
            ExprKind::FunctionCall(call) => call.args.iter().for_each(|a| collect(a, out)),
            ExprKind::Binary(binary) => {
                collect(&binary.left, out);
                collect(&binary.right, out);
            }
            ExprKind::Unary(unary) => collect(&unary.expr, out),
            ExprKind::Case(case) => {
                for switch in &case.cases {
                    collect(&switch.condition, out);
                    collect(&switch.value, out);
                }
                if let Some(default) = &case.default {
                    collect(default, out);
                }
            }
            ExprKind::Aggregate(aggregate) => {
                if let Some(expr) = &aggregate.expr {
                    collect(expr, out);
                }
            }
        }
    }

    let mut out = Vec::new();
    collect(expr, &mut out);
    out.sort_unstable();
    out.dedup();
    out
}
