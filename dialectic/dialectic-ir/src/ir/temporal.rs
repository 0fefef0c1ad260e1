//! Relative-time filter clauses, as parsed from filter strings like
//! `last 3 days` or `2024-Q2 to today`.

use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::TimestampUnit;

/// A point (or span) in time that a filter clause compares against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumAsInner, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Moment {
    Now,
    Literal(TemporalLiteral),
    Ago { n: u64, unit: TimestampUnit },
    FromNow { n: u64, unit: TimestampUnit },
    Today,
    Yesterday,
    Tomorrow,
    This(TimestampUnit),
    Last(TimestampUnit),
    Next(TimestampUnit),
    Weekday { day: Weekday, which: WhichDay },
}

/// A literal instant. The unit is the implied duration: `2024-03` is a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TemporalLiteral {
    pub literal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<TimestampUnit>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WhichDay {
    Last,
    Next,
}

/// A filter clause. `not` negates the clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumAsInner, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemporalFilter {
    After {
        moment: Moment,
        #[serde(default)]
        not: bool,
    },
    Before {
        moment: Moment,
        #[serde(default)]
        not: bool,
    },
    In {
        moment: Moment,
        #[serde(default)]
        not: bool,
    },
    /// `n` units starting at `begin`.
    For {
        begin: Moment,
        n: u64,
        unit: TimestampUnit,
        #[serde(default)]
        not: bool,
    },
    /// The current unit and the `n - 1` before it.
    InLast {
        n: u64,
        unit: TimestampUnit,
        #[serde(default)]
        not: bool,
    },
    To {
        from: Moment,
        to: Moment,
        #[serde(default)]
        not: bool,
    },
    /// The `n` complete units before the current one.
    Last {
        n: u64,
        unit: TimestampUnit,
        #[serde(default)]
        not: bool,
    },
    /// The `n` complete units after the current one.
    Next {
        n: u64,
        unit: TimestampUnit,
        #[serde(default)]
        not: bool,
    },
    Null {
        #[serde(default)]
        not: bool,
    },
    /// Parenthesized clause.
    Group {
        filter: Box<TemporalFilter>,
        #[serde(default)]
        not: bool,
    },
    And(Vec<TemporalFilter>),
    Or(Vec<TemporalFilter>),
}

impl TemporalLiteral {
    pub fn new<S: ToString>(literal: S, unit: Option<TimestampUnit>) -> Self {
        TemporalLiteral {
            literal: literal.to_string(),
            unit,
        }
    }
}
