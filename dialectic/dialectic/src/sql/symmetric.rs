//! Aggregates over rows repeated by one-to-many joins.
//!
//! After a join fans out, a row of the source appears once per matching row
//! of the joined relation. Aggregates with a distinct key count each original
//! row once, no matter how often it was repeated.

use dialectic_ir::ir::{Aggregate, AggregateFunc};

use super::gen_expr::{relations, render};
use super::Context;
use crate::{Error, Reason, Result, WithErrorInfo};

/// Restricts a value to the rows of one group set. Outside of nesting the
/// value is returned as is.
pub(super) fn restrict(group_set: Option<usize>, sql: &str) -> String {
    match group_set {
        Some(group_set) => format!("CASE WHEN group_set={group_set} THEN {sql} END"),
        None => sql.to_string(),
    }
}

pub(super) fn render_aggregate(aggregate: &Aggregate, ctx: &mut Context) -> Result<String> {
    let func = aggregate.func;
    let group_set = ctx.group_set;

    let value = match &aggregate.expr {
        Some(expr) => {
            if matches!(func, AggregateFunc::Sum | AggregateFunc::Avg)
                && aggregate.distinct_key.is_none()
            {
                lint_fan_out(func, &relations(expr), ctx);
            }
            Some(restrict(group_set, &render(expr, ctx)?))
        }
        None => None,
    };
    let key = match &aggregate.distinct_key {
        Some(key) => Some(restrict(group_set, &render(key, ctx)?)),
        None => None,
    };

    let dialect = ctx.dialect;
    match (func, value, key) {
        (AggregateFunc::Count, None, None) => Ok(format!("COUNT({})", restrict(group_set, "1"))),
        (AggregateFunc::Count, None, Some(key)) => Ok(format!("COUNT(DISTINCT {key})")),
        (AggregateFunc::Count, Some(value), None) => Ok(format!("COUNT({value})")),
        (AggregateFunc::Count, Some(value), Some(key)) => Ok(format!(
            "COUNT(DISTINCT CASE WHEN {value} IS NOT NULL THEN {key} END)"
        )),

        (_, None, _) => Err(Error::new(Reason::Expected {
            who: Some(format!("aggregate {func}")),
            expected: "an expression to aggregate".to_string(),
            found: "nothing".to_string(),
        })),

        (AggregateFunc::CountDistinct, Some(value), _) => Ok(format!("COUNT(DISTINCT {value})")),
        // repeating a row never changes an extreme
        (AggregateFunc::Min | AggregateFunc::Max, Some(value), _) => Ok(format!("{func}({value})")),

        (AggregateFunc::Sum, Some(value), Some(key)) => dialect.symmetric_sum(&key, &value),
        (AggregateFunc::Avg, Some(value), Some(key)) => dialect.symmetric_avg(&key, &value),
        (AggregateFunc::Sum | AggregateFunc::Avg, Some(value), None) => {
            Ok(format!("{func}({value})"))
        }
    }
}

/// Warns about sums and averages which read only from relations that fan
/// out, while rows are being repeated by a join.
fn lint_fan_out(func: AggregateFunc, relations: &[&str], ctx: &mut Context) {
    if ctx.repeating.is_empty() || relations.is_empty() {
        return;
    }
    if relations.iter().any(|r| ctx.repeating.iter().any(|x| x == r)) {
        return;
    }

    let joins = ctx.repeating.iter().map(|r| format!("`{r}`")).collect::<Vec<_>>();
    log::debug!("{func} over {relations:?} is repeated by {joins:?}");
    ctx.diagnostics.push(
        Error::new_lint(format!(
            "{func} over `{}` counts rows repeated by joining {}",
            relations.join("`, `"),
            joins.join(", ")
        ))
        .push_hint("aggregate with a distinct key of the source rows"),
    );
}
