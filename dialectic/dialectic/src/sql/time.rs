//! Time arithmetic in the query timezone.
//!
//! Backends store instants in their native timezone. When a query has a
//! timezone of its own, calendar operations on instants are computed on
//! wall-clock (civil) time in that timezone and converted back.

use dialectic_ir::ir::{DeltaOp, ExtractUnit, SemanticType, TimestampUnit};

use super::Context;
use crate::dialect::{TimeKind, WeekStart};
use crate::{Error, Reason, Result};

pub(super) fn kind_of(ty: &SemanticType, who: &str) -> Result<TimeKind> {
    match ty {
        SemanticType::Date => Ok(TimeKind::Date),
        SemanticType::Timestamp => Ok(TimeKind::Timestamp),
        _ => Err(Error::new(Reason::Expected {
            who: Some(who.to_string()),
            expected: "a date or timestamp".to_string(),
            found: ty.kind().to_string(),
        })),
    }
}

/// Timezone to do calendar arithmetic on instants in, if any.
fn civil_timezone<'c>(ctx: &'c Context, kind: TimeKind) -> Option<&'c str> {
    match kind {
        TimeKind::Timestamp => ctx.timezone.as_deref(),
        TimeKind::Date | TimeKind::Civil => None,
    }
}

pub(super) fn truncate(ctx: &Context, sql: &str, kind: TimeKind, unit: TimestampUnit) -> String {
    let dialect = ctx.dialect;
    match civil_timezone(ctx, kind) {
        Some(tz) => {
            let civil = dialect.to_civil(sql, tz);
            let truncated = trunc_monday(ctx, &civil, TimeKind::Civil, unit);
            dialect.from_civil(&truncated, tz)
        }
        None => trunc_monday(ctx, sql, kind, unit),
    }
}

/// Truncation where weeks always start on Monday.
fn trunc_monday(ctx: &Context, sql: &str, kind: TimeKind, unit: TimestampUnit) -> String {
    let dialect = ctx.dialect;
    if unit != TimestampUnit::Week || dialect.native_week_start() == WeekStart::Monday {
        return dialect.trunc_native(sql, kind, unit);
    }

    // Sunday belongs to the week before, so step back a day, truncate to
    // the native Sunday and step forward again.
    let day = TimestampUnit::Day;
    let shifted = dialect.delta_native(sql, kind, DeltaOp::Sub, "1", day);
    let truncated = dialect.trunc_native(&shifted, kind, unit);
    dialect.delta_native(&truncated, kind, DeltaOp::Add, "1", day)
}

pub(super) fn extract(ctx: &Context, sql: &str, kind: TimeKind, unit: ExtractUnit) -> String {
    let dialect = ctx.dialect;
    match civil_timezone(ctx, kind) {
        Some(tz) => dialect.extract_native(&dialect.to_civil(sql, tz), TimeKind::Civil, unit),
        None => dialect.extract_native(sql, kind, unit),
    }
}

pub(super) fn delta(
    ctx: &Context,
    base: &str,
    kind: TimeKind,
    op: DeltaOp,
    amount: &str,
    unit: TimestampUnit,
) -> String {
    let dialect = ctx.dialect;
    let (amount, unit) = match unit {
        TimestampUnit::Quarter if !dialect.supports_quarter_interval() => {
            (format!("(({amount})*3)"), TimestampUnit::Month)
        }
        TimestampUnit::Week if !dialect.supports_week_interval() => {
            (format!("(({amount})*7)"), TimestampUnit::Day)
        }
        _ => (amount.to_string(), unit),
    };

    if kind == TimeKind::Timestamp && unit.is_calendar() {
        let timezone = ctx.timezone.as_deref().or_else(|| {
            dialect
                .calendar_delta_in_civil_time()
                .then(|| dialect.native_timezone())
        });
        if let Some(tz) = timezone {
            let civil = dialect.to_civil(base, tz);
            let shifted = dialect.delta_native(&civil, TimeKind::Civil, op, &amount, unit);
            return dialect.from_civil(&shifted, tz);
        }
    }
    dialect.delta_native(base, kind, op, &amount, unit)
}

pub(super) fn measure(
    ctx: &Context,
    from: (&str, TimeKind),
    to: (&str, TimeKind),
    unit: TimestampUnit,
) -> Result<String> {
    let dialect = ctx.dialect;
    let to_civil = |(sql, kind): (&str, TimeKind)| match civil_timezone(ctx, kind) {
        Some(tz) if unit.is_calendar() => (dialect.to_civil(sql, tz), TimeKind::Civil),
        _ => (sql.to_string(), kind),
    };
    let (from, from_kind) = to_civil(from);
    let (to, to_kind) = to_civil(to);
    dialect.measure((&from, from_kind), (&to, to_kind), unit)
}

/// Casts between dates and timestamps. The date of an instant is its date
/// in the query timezone.
pub(super) fn cast(
    ctx: &Context,
    sql: &str,
    from: &SemanticType,
    to: &SemanticType,
) -> Result<String> {
    let dialect = ctx.dialect;
    match (from, to, ctx.timezone.as_deref()) {
        (SemanticType::Timestamp, SemanticType::Date, Some(tz)) => {
            dialect.cast(&dialect.to_civil(sql, tz), from, to, false)
        }
        (SemanticType::Date, SemanticType::Timestamp, Some(tz)) => {
            Ok(dialect.from_civil(&dialect.civil_from_date(sql, tz), tz))
        }
        _ => dialect.cast(sql, from, to, false),
    }
}
