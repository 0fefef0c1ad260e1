//! SQL idioms shared by backends descending from PostgreSQL.
//!
//! These are plain functions, called explicitly by each backend that wants them.

use dialectic_ir::ir::{ExtractUnit, SemanticType, TimestampUnit};

use super::TimeKind;
use crate::{Error, Result};

pub(super) fn timestamp_literal(value: &str, timezone: Option<&str>) -> String {
    match timezone {
        Some(tz) => format!("TIMESTAMPTZ '{value} {tz}'::TIMESTAMP"),
        None => format!("TIMESTAMP '{value}'"),
    }
}

pub(super) fn to_civil(sql: &str, timezone: &str) -> String {
    format!("({sql}::TIMESTAMPTZ AT TIME ZONE '{timezone}')")
}

pub(super) fn from_civil(sql: &str, timezone: &str) -> String {
    format!("(({sql}) AT TIME ZONE '{timezone}')::TIMESTAMP")
}

pub(super) fn trunc(sql: &str, kind: TimeKind, unit: TimestampUnit) -> String {
    let truncated = format!("DATE_TRUNC('{unit}', {sql})");
    match kind {
        TimeKind::Date => format!("{truncated}::DATE"),
        TimeKind::Timestamp | TimeKind::Civil => truncated,
    }
}

pub(super) fn extract(sql: &str, unit: ExtractUnit) -> String {
    let unit = match unit {
        ExtractUnit::DayOfWeek => "isodow".to_string(),
        ExtractUnit::DayOfYear => "doy".to_string(),
        unit => unit.to_string(),
    };
    format!("EXTRACT({unit} FROM {sql})")
}

pub(super) fn seconds_in(unit: TimestampUnit) -> Option<u64> {
    Some(match unit {
        TimestampUnit::Second => 1,
        TimestampUnit::Minute => 60,
        TimestampUnit::Hour => 3600,
        TimestampUnit::Day => 24 * 3600,
        TimestampUnit::Week => 7 * 24 * 3600,
        TimestampUnit::Month | TimestampUnit::Quarter | TimestampUnit::Year => return None,
    })
}

/// Whole units between two values, computed from their epoch seconds.
pub(super) fn measure_by_epoch(
    dialect: &str,
    from: &str,
    to: &str,
    unit: TimestampUnit,
) -> Result<String> {
    let Some(seconds) = seconds_in(unit) else {
        return Err(Error::unsupported(
            dialect,
            format!("measuring time in {unit}s"),
        ));
    };
    let duration = format!("EXTRACT(EPOCH FROM {to})-EXTRACT(EPOCH FROM {from})");
    Ok(if seconds == 1 {
        format!("FLOOR({duration})")
    } else {
        format!("FLOOR(({duration})/{seconds}.0)")
    })
}

/// Scalar type names common to the family.
pub(super) fn native_scalar(name: &str) -> Option<SemanticType> {
    Some(match name {
        "smallint" | "integer" | "bigint" | "int" | "int2" | "int4" | "int8" | "serial"
        | "bigserial" | "smallserial" => SemanticType::integer(),
        "numeric" | "decimal" | "real" | "double precision" | "float" | "float4" | "float8" => {
            SemanticType::float()
        }
        "char" | "character" | "nchar" | "bpchar" | "varchar" | "character varying"
        | "nvarchar" | "text" | "name" | "uuid" => SemanticType::String,
        "bool" | "boolean" => SemanticType::Boolean,
        "date" => SemanticType::Date,
        "timestamp"
        | "timestamptz"
        | "timestamp without time zone"
        | "timestamp with time zone" => SemanticType::Timestamp,
        _ => return None,
    })
}
