//! Lowering of relative-time filter clauses to boolean SQL.
//!
//! Every moment resolves to a half-open span `[begin, end)` of timestamps,
//! built from the current time with the same truncation and delta rendering
//! as expressions. Clauses then compare the filtered value against a span.

use std::sync::OnceLock;

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime, TimeDelta};
use dialectic_ir::ir::{
    DeltaOp, Moment, SemanticType, TemporalFilter, TemporalLiteral, TimestampUnit,
};
use itertools::Itertools;
use regex::Regex;

use super::{time, Context};
use crate::dialect::TimeKind;
use crate::{Error, Reason, Result};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compiles `filter` applied to the SQL expression `sql` of type `ty`.
pub(super) fn compile(
    ctx: &Context,
    sql: &str,
    ty: &SemanticType,
    filter: &TemporalFilter,
) -> Result<String> {
    let expr = match ty {
        SemanticType::Timestamp => sql.to_string(),
        SemanticType::Date => time::cast(ctx, sql, ty, &SemanticType::Timestamp)?,
        _ => {
            return Err(Error::new(Reason::Expected {
                who: Some("temporal filter".to_string()),
                expected: "a date or timestamp".to_string(),
                found: ty.kind().to_string(),
            }))
        }
    };
    Lowering { ctx, expr }.clause(filter)
}

struct Span {
    begin: String,
    end: String,
}

struct Lowering<'c, 'a> {
    ctx: &'c Context<'a>,
    /// The filtered value, as a timestamp.
    expr: String,
}

impl Lowering<'_, '_> {
    fn clause(&self, filter: &TemporalFilter) -> Result<String> {
        let x = &self.expr;
        Ok(match filter {
            TemporalFilter::After { moment, not } => {
                let op = if *not { "<" } else { ">=" };
                format!("{x} {op} {}", self.moment(moment)?.end)
            }
            TemporalFilter::Before { moment, not } => {
                let op = if *not { ">=" } else { "<" };
                format!("{x} {op} {}", self.moment(moment)?.begin)
            }
            TemporalFilter::In { moment, not } => self.is_in(*not, &self.moment(moment)?),

            TemporalFilter::For {
                begin,
                n,
                unit,
                not,
            } => {
                let begin = self.moment(begin)?.begin;
                let end = self.shift(&begin, DeltaOp::Add, *n, *unit);
                self.is_in(*not, &Span { begin, end })
            }
            TemporalFilter::InLast { n, unit, not } => {
                let current = self.now_trunc(*unit);
                let span = Span {
                    begin: self.shift(&current, DeltaOp::Sub, n.saturating_sub(1), *unit),
                    end: self.shift(&current, DeltaOp::Add, 1, *unit),
                };
                self.is_in(*not, &span)
            }
            TemporalFilter::To { from, to, not } => {
                let span = Span {
                    begin: self.moment(from)?.begin,
                    end: self.moment(to)?.end,
                };
                self.is_in(*not, &span)
            }
            TemporalFilter::Last { n, unit, not } => {
                let current = self.now_trunc(*unit);
                let span = Span {
                    begin: self.shift(&current, DeltaOp::Sub, *n, *unit),
                    end: current,
                };
                self.is_in(*not, &span)
            }
            TemporalFilter::Next { n, unit, not } => {
                let current = self.now_trunc(*unit);
                let span = Span {
                    begin: self.shift(&current, DeltaOp::Add, 1, *unit),
                    end: self.shift(&current, DeltaOp::Add, n + 1, *unit),
                };
                self.is_in(*not, &span)
            }

            TemporalFilter::Null { not: false } => format!("{x} IS NULL"),
            TemporalFilter::Null { not: true } => format!("{x} IS NOT NULL"),
            TemporalFilter::Group { filter, not } => {
                let inner = self.clause(filter)?;
                if *not {
                    format!("NOT ({inner})")
                } else {
                    format!("({inner})")
                }
            }
            TemporalFilter::And(members) => self.join(members, "AND")?,
            TemporalFilter::Or(members) => self.join(members, "OR")?,
        })
    }

    fn join(&self, members: &[TemporalFilter], op: &str) -> Result<String> {
        let members: Vec<String> = members.iter().map(|m| self.clause(m)).try_collect()?;
        Ok(members.iter().map(|m| format!("({m})")).join(&format!(" {op} ")))
    }

    /// Membership in a span. Negation flips the comparisons instead of
    /// wrapping them in `NOT`.
    fn is_in(&self, not: bool, span: &Span) -> String {
        let x = &self.expr;
        let Span { begin, end } = span;
        if not {
            format!("{x} < {begin} OR {x} >= {end}")
        } else {
            format!("{x} >= {begin} AND {x} < {end}")
        }
    }

    fn moment(&self, moment: &Moment) -> Result<Span> {
        Ok(match moment {
            Moment::Now => {
                let now = self.ctx.dialect.now();
                Span {
                    begin: now.clone(),
                    end: now,
                }
            }
            Moment::Literal(literal) => self.literal(literal)?,

            Moment::Ago { n, unit } => {
                let current = self.now_trunc(*unit);
                let end = match *n {
                    0 => self.shift(&current, DeltaOp::Add, 1, *unit),
                    n => self.shift(&current, DeltaOp::Sub, n - 1, *unit),
                };
                Span {
                    begin: self.shift(&current, DeltaOp::Sub, *n, *unit),
                    end,
                }
            }
            Moment::FromNow { n, unit } => {
                let current = self.now_trunc(*unit);
                Span {
                    begin: self.shift(&current, DeltaOp::Add, *n, *unit),
                    end: self.shift(&current, DeltaOp::Add, n + 1, *unit),
                }
            }

            Moment::Today => self.this(TimestampUnit::Day),
            Moment::Yesterday => self.last(TimestampUnit::Day),
            Moment::Tomorrow => self.next(TimestampUnit::Day),
            Moment::This(unit) => self.this(*unit),
            Moment::Last(unit) => self.last(*unit),
            Moment::Next(unit) => self.next(*unit),

            Moment::Weekday { day, which } => {
                return Err(Error::not_implemented(format!(
                    "filtering on `{which} {day}`"
                )));
            }
        })
    }

    fn this(&self, unit: TimestampUnit) -> Span {
        let current = self.now_trunc(unit);
        Span {
            end: self.shift(&current, DeltaOp::Add, 1, unit),
            begin: current,
        }
    }

    fn last(&self, unit: TimestampUnit) -> Span {
        let current = self.now_trunc(unit);
        Span {
            begin: self.shift(&current, DeltaOp::Sub, 1, unit),
            end: current,
        }
    }

    fn next(&self, unit: TimestampUnit) -> Span {
        let current = self.now_trunc(unit);
        Span {
            begin: self.shift(&current, DeltaOp::Add, 1, unit),
            end: self.shift(&current, DeltaOp::Add, 2, unit),
        }
    }

    /// Start of the current unit.
    fn now_trunc(&self, unit: TimestampUnit) -> String {
        let now = self.ctx.dialect.now();
        time::truncate(self.ctx, &now, TimeKind::Timestamp, unit)
    }

    fn shift(&self, base: &str, op: DeltaOp, n: u64, unit: TimestampUnit) -> String {
        if n == 0 {
            return base.to_string();
        }
        time::delta(self.ctx, base, TimeKind::Timestamp, op, &n.to_string(), unit)
    }

    fn literal(&self, literal: &TemporalLiteral) -> Result<Span> {
        let (begin, end) = literal_bounds(literal)?;
        let timezone = self.ctx.timezone.as_deref();
        let render = |t: NaiveDateTime| {
            let value = t.format(TIMESTAMP_FORMAT).to_string();
            self.ctx.dialect.timestamp_literal(&value, timezone)
        };
        Ok(Span {
            begin: render(begin),
            end: render(end),
        })
    }
}

fn quarter_literal() -> Option<&'static Regex> {
    static QUARTER: OnceLock<Option<Regex>> = OnceLock::new();
    QUARTER
        .get_or_init(|| Regex::new(r"^(\d{4})-Q([1-4])$").ok())
        .as_ref()
}

fn week_literal() -> Option<&'static Regex> {
    static WEEK: OnceLock<Option<Regex>> = OnceLock::new();
    WEEK.get_or_init(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})-WK$").ok())
        .as_ref()
}

/// The instants a literal begins and ends at. A literal without a unit is a
/// single instant.
fn literal_bounds(literal: &TemporalLiteral) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let text = literal.literal.trim();
    let invalid = || {
        let expected = match literal.unit {
            Some(unit) => format!("a {unit} literal"),
            None => "a date or timestamp literal".to_string(),
        };
        Error::new(Reason::Expected {
            who: Some("temporal filter".to_string()),
            expected,
            found: format!("`{text}`"),
        })
    };
    let date = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| invalid());
    let datetime =
        |s: &str| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map_err(|_| invalid());
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).ok_or_else(invalid);

    let (begin, end) = match literal.unit {
        Some(TimestampUnit::Year) => {
            let year: i32 = text.parse().map_err(|_| invalid())?;
            let begin = NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(invalid)?;
            let end = begin.checked_add_months(Months::new(12)).ok_or_else(invalid)?;
            (midnight(begin)?, midnight(end)?)
        }
        Some(TimestampUnit::Quarter) => {
            let captures = quarter_literal()
                .and_then(|re| re.captures(text))
                .ok_or_else(invalid)?;
            let year: i32 = captures[1].parse().map_err(|_| invalid())?;
            let quarter: u32 = captures[2].parse().map_err(|_| invalid())?;
            let month = (quarter - 1) * 3 + 1;
            let begin = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
            let end = begin.checked_add_months(Months::new(3)).ok_or_else(invalid)?;
            (midnight(begin)?, midnight(end)?)
        }
        Some(TimestampUnit::Month) => {
            let begin = date(&format!("{text}-01"))?;
            let end = begin.checked_add_months(Months::new(1)).ok_or_else(invalid)?;
            (midnight(begin)?, midnight(end)?)
        }
        Some(TimestampUnit::Week) => {
            let captures = week_literal()
                .and_then(|re| re.captures(text))
                .ok_or_else(invalid)?;
            let day = date(&captures[1])?;
            let since_monday = u64::from(day.weekday().num_days_from_monday());
            let begin = day.checked_sub_days(Days::new(since_monday)).ok_or_else(invalid)?;
            let end = begin.checked_add_days(Days::new(7)).ok_or_else(invalid)?;
            (midnight(begin)?, midnight(end)?)
        }
        Some(TimestampUnit::Day) => {
            let begin = date(text)?;
            let end = begin.checked_add_days(Days::new(1)).ok_or_else(invalid)?;
            (midnight(begin)?, midnight(end)?)
        }
        Some(TimestampUnit::Hour) => {
            let begin = datetime(&format!("{text}:00:00"))?;
            (begin, begin + TimeDelta::hours(1))
        }
        Some(TimestampUnit::Minute) => {
            let begin = datetime(&format!("{text}:00"))?;
            (begin, begin + TimeDelta::minutes(1))
        }
        Some(TimestampUnit::Second) => {
            let begin = datetime(text)?;
            (begin, begin + TimeDelta::seconds(1))
        }
        None => {
            let instant = match datetime(text) {
                Ok(instant) => instant,
                Err(_) => midnight(date(text)?)?,
            };
            (instant, instant)
        }
    };
    Ok((begin, end))
}
