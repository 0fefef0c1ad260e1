use dialectic_ir::ir::{DeltaOp, ExtractUnit, NumberKind, Sampling, SemanticType, TimestampUnit};

use super::{pg_family, Dialect, DialectHandler, TimeKind};
use crate::functions::{param, OverloadDef, ReturnType, STRING};
use crate::Result;

/// Redshift. It shares much with Postgres, but can neither nest nor unnest.
#[derive(Debug)]
pub struct RedshiftDialect;

static OVERRIDES: &[OverloadDef] = &[
    OverloadDef::new(
        "starts_with",
        &[param("value", STRING), param("prefix", STRING)],
        ReturnType::Boolean,
        "({value} LIKE {prefix} || '%')",
    ),
    OverloadDef::new(
        "regexp_extract",
        &[param("value", STRING), param("pattern", STRING)],
        ReturnType::String,
        "REGEXP_SUBSTR({value}, {pattern})",
    ),
    OverloadDef::new(
        "string_agg",
        &[param("value", STRING)],
        ReturnType::String,
        "LISTAGG({value}, ',')",
    ),
    OverloadDef::new(
        "string_agg",
        &[param("value", STRING), param("separator", STRING)],
        ReturnType::String,
        "LISTAGG({value}, {separator})",
    ),
];

impl DialectHandler for RedshiftDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Redshift
    }

    fn supports_nesting(&self) -> bool {
        false
    }

    fn supports_unnest(&self) -> bool {
        false
    }

    fn supports_lateral_unnest(&self) -> bool {
        false
    }

    fn default_decimal_type(&self) -> &'static str {
        "DECIMAL(38, 9)"
    }

    fn nulls_last(&self) -> bool {
        true
    }

    fn to_native_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::String => "VARCHAR".to_string(),
            SemanticType::Number(NumberKind::Integer) => "INTEGER".to_string(),
            SemanticType::Number(NumberKind::Float) => "DOUBLE PRECISION".to_string(),
            SemanticType::Boolean => "BOOLEAN".to_string(),
            SemanticType::Date => "DATE".to_string(),
            SemanticType::Timestamp => "TIMESTAMP".to_string(),
            SemanticType::Native(raw) => raw.clone(),
            SemanticType::Json | SemanticType::Array(_) | SemanticType::Record(_) => {
                "SUPER".to_string()
            }
        }
    }

    fn native_scalar(&self, name: &str) -> Option<SemanticType> {
        match name {
            "super" => Some(SemanticType::Json),
            "interval" => Some(SemanticType::String),
            _ => pg_family::native_scalar(name),
        }
    }

    fn timestamp_literal(&self, value: &str, timezone: Option<&str>) -> String {
        pg_family::timestamp_literal(value, timezone)
    }

    fn to_civil(&self, sql: &str, timezone: &str) -> String {
        pg_family::to_civil(sql, timezone)
    }

    fn from_civil(&self, sql: &str, timezone: &str) -> String {
        pg_family::from_civil(sql, timezone)
    }

    fn trunc_native(&self, sql: &str, kind: TimeKind, unit: TimestampUnit) -> String {
        pg_family::trunc(sql, kind, unit)
    }

    fn extract_native(&self, sql: &str, _kind: TimeKind, unit: ExtractUnit) -> String {
        match unit {
            // `dow` counts from Sunday as 0
            ExtractUnit::DayOfWeek => format!("(MOD(EXTRACT(dow FROM {sql})+6,7)+1)"),
            unit => pg_family::extract(sql, unit),
        }
    }

    fn delta_native(
        &self,
        sql: &str,
        kind: TimeKind,
        op: DeltaOp,
        amount: &str,
        unit: TimestampUnit,
    ) -> String {
        let amount = match op {
            DeltaOp::Add => amount.to_string(),
            DeltaOp::Sub => format!("-({amount})"),
        };
        let shifted = format!("DATEADD({unit}, {amount}, {sql})");
        match kind {
            TimeKind::Date => format!("{shifted}::DATE"),
            TimeKind::Timestamp | TimeKind::Civil => shifted,
        }
    }

    fn measure(
        &self,
        from: (&str, TimeKind),
        to: (&str, TimeKind),
        unit: TimestampUnit,
    ) -> Result<String> {
        pg_family::measure_by_epoch(&self.name(), from.0, to.0, unit)
    }

    fn regex_match(&self, expr: &str, regex: &str) -> String {
        format!("({expr} ~ {regex})")
    }

    fn sum_distinct_hashed_key(&self, key: &str) -> Result<String> {
        let key = format!("{key}::VARCHAR");
        let upper = format!("strtol(substring(md5({key}), 1, 15), 16)::DECIMAL(38, 0) * 4294967296");
        let lower = format!("strtol(substring(md5({key}), 16, 8), 16)::DECIMAL(38, 0)");
        Ok(format!("({upper} + {lower})::DECIMAL(38, 9) * 0.000000001"))
    }

    fn sample_table(&self, table: &str, sampling: Sampling) -> Result<String> {
        Ok(match sampling {
            Sampling::Rows(rows) => format!("(SELECT * FROM {table} ORDER BY RANDOM() LIMIT {rows})"),
            Sampling::Percent(percent) => format!(
                "(SELECT * FROM {table} tbl QUALIFY percent_rank() OVER(ORDER BY RANDOM()) <= {percent}/100.0)"
            ),
        })
    }

    fn function_overrides(&self) -> &'static [OverloadDef] {
        OVERRIDES
    }
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn test_no_nesting() {
        assert_snapshot!(
            RedshiftDialect.group_set_table(2).unwrap_err().reason,
            @"nested segments is not supported by dialect `redshift`"
        );
    }

    #[test]
    fn test_symmetric_sum() {
        assert_snapshot!(
            RedshiftDialect.symmetric_sum("u.id", "u.score").unwrap(),
            @"CAST((SUM(DISTINCT ROUND(CAST(COALESCE(u.score, 0) AS DECIMAL(38, 9)), 9) + (strtol(substring(md5(u.id::VARCHAR), 1, 15), 16)::DECIMAL(38, 0) * 4294967296 + strtol(substring(md5(u.id::VARCHAR), 16, 8), 16)::DECIMAL(38, 0))::DECIMAL(38, 9) * 0.000000001) - SUM(DISTINCT (strtol(substring(md5(u.id::VARCHAR), 1, 15), 16)::DECIMAL(38, 0) * 4294967296 + strtol(substring(md5(u.id::VARCHAR), 16, 8), 16)::DECIMAL(38, 0))::DECIMAL(38, 9) * 0.000000001)) AS DOUBLE PRECISION)"
        );
    }

    #[test]
    fn test_delta() {
        assert_snapshot!(
            RedshiftDialect.delta_native("t", TimeKind::Timestamp, DeltaOp::Sub, "2", TimestampUnit::Quarter),
            @"DATEADD(quarter, -(2), t)"
        );
    }
}
