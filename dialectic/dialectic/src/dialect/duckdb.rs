use dialectic_ir::ir::{DeltaOp, ExtractUnit, NumberKind, Sampling, SemanticType, TimestampUnit};

use super::{
    field_pairs, pg_family, types, Dialect, DialectHandler, TimeKind, TurtleField, UnnestJoin,
    UnnestSpec,
};
use crate::functions::{param, OverloadDef, ReturnType, NUMBER, STRING};
use crate::Result;

#[derive(Debug)]
pub struct DuckDbDialect {
    /// `LEFT JOIN LATERAL UNNEST` is available. Builds without it unnest by
    /// joining a bounded number series.
    pub lateral_unnest: bool,
}

static OVERRIDES: &[OverloadDef] = &[
    OverloadDef::new(
        "is_inf",
        &[param("value", NUMBER)],
        ReturnType::Boolean,
        "COALESCE(ISINF({value}), false)",
    ),
    OverloadDef::new(
        "div",
        &[param("dividend", NUMBER), param("divisor", NUMBER)],
        ReturnType::Integer,
        "({dividend} // {divisor})",
    ),
    OverloadDef::new(
        "log",
        &[param("base", NUMBER), param("value", NUMBER)],
        ReturnType::Float,
        "(LN({value}) / LN({base}))",
    ),
    OverloadDef::new(
        "ends_with",
        &[param("value", STRING), param("suffix", STRING)],
        ReturnType::Boolean,
        "ENDS_WITH({value}, {suffix})",
    ),
    OverloadDef::new(
        "byte_length",
        &[param("value", STRING)],
        ReturnType::Integer,
        "STRLEN({value})",
    ),
];

static FUNCTIONS: &[OverloadDef] = &[
    OverloadDef::new("median", &[param("value", NUMBER)], ReturnType::Float, "MEDIAN({value})").aggregate(),
    OverloadDef::new(
        "quantile_cont",
        &[param("value", NUMBER), param("fraction", NUMBER)],
        ReturnType::Float,
        "QUANTILE_CONT({value}, {fraction})",
    )
    .aggregate(),
];

impl DialectHandler for DuckDbDialect {
    fn dialect(&self) -> Dialect {
        if self.lateral_unnest {
            Dialect::DuckDb
        } else {
            Dialect::DuckDbWasm
        }
    }

    fn supports_sum_distinct_function(&self) -> bool {
        true
    }

    fn supports_safe_cast(&self) -> bool {
        true
    }

    fn supports_week_interval(&self) -> bool {
        false
    }

    fn supports_lateral_unnest(&self) -> bool {
        self.lateral_unnest
    }

    fn default_number_type(&self) -> &'static str {
        "DOUBLE"
    }

    fn nulls_last(&self) -> bool {
        true
    }

    fn to_native_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::String => "VARCHAR".to_string(),
            SemanticType::Number(NumberKind::Integer) => "BIGINT".to_string(),
            SemanticType::Number(_) => "DOUBLE".to_string(),
            SemanticType::Boolean => "BOOLEAN".to_string(),
            SemanticType::Date => "DATE".to_string(),
            SemanticType::Timestamp => "TIMESTAMP".to_string(),
            SemanticType::Json => "JSON".to_string(),
            SemanticType::Native(raw) => raw.clone(),
            SemanticType::Array(inner) => format!("{}[]", self.to_native_type(inner)),
            SemanticType::Record(fields) => types::struct_type(self, "STRUCT", fields),
        }
    }

    fn native_scalar(&self, name: &str) -> Option<SemanticType> {
        Some(match name {
            "tinyint" | "smallint" | "integer" | "int" | "bigint" | "hugeint" | "uhugeint"
            | "utinyint" | "usmallint" | "uinteger" | "ubigint" | "int1" | "int2" | "int4"
            | "int8" | "long" | "short" | "signed" => SemanticType::integer(),
            "double" | "float" | "real" | "float4" | "float8" | "decimal" | "numeric" => {
                SemanticType::float()
            }
            "varchar" | "text" | "string" | "char" | "bpchar" | "uuid" | "time" => {
                SemanticType::String
            }
            "boolean" | "bool" | "logical" => SemanticType::Boolean,
            "date" => SemanticType::Date,
            "timestamp" | "datetime" | "timestamptz" | "timestamp with time zone"
            | "timestamp_s" | "timestamp_ms" | "timestamp_ns" => SemanticType::Timestamp,
            "json" => SemanticType::Json,
            _ => return None,
        })
    }

    fn now(&self) -> String {
        "CURRENT_TIMESTAMP::TIMESTAMP".to_string()
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
        pg_family::extract(sql, unit)
    }

    fn delta_native(
        &self,
        sql: &str,
        kind: TimeKind,
        op: DeltaOp,
        amount: &str,
        unit: TimestampUnit,
    ) -> String {
        let shifted = format!("({sql} {op} INTERVAL ({amount}) {unit})");
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
        let operand = |(sql, kind): (&str, TimeKind)| {
            if kind == TimeKind::Date && !unit.is_calendar() {
                format!("{sql}::TIMESTAMP")
            } else {
                sql.to_string()
            }
        };
        Ok(format!("DATE_SUB('{unit}', {}, {})", operand(from), operand(to)))
    }

    fn regex_match(&self, expr: &str, regex: &str) -> String {
        format!("REGEXP_MATCHES({expr},{regex})")
    }

    fn symmetric_sum(&self, key: &str, value: &str) -> Result<String> {
        Ok(distinct_by_key("SUM", key, value))
    }

    fn symmetric_avg(&self, key: &str, value: &str) -> Result<String> {
        Ok(distinct_by_key("AVG", key, value))
    }

    fn group_set_table(&self, max: usize) -> Result<String> {
        Ok(format!(
            "CROSS JOIN (SELECT UNNEST(GENERATE_SERIES(0,{max},1)) as group_set  ) as group_set"
        ))
    }

    fn aggregate_turtle(
        &self,
        group_set: usize,
        fields: &[TurtleField],
        order_by: Option<&str>,
        limit: Option<u64>,
    ) -> Result<String> {
        let fields = field_pairs(fields, |f| format!("{}: {}", self.quote_ident(f.name), f.sql));
        let order_by = order_by.map(|o| format!(" ORDER BY {o}")).unwrap_or_default();
        let list = format!(
            "COALESCE(LIST({{{fields}}}{order_by}) FILTER (WHERE group_set={group_set}),[])"
        );
        Ok(match limit {
            Some(limit) => format!("{list}[1:{limit}]"),
            None => list,
        })
    }

    fn any_value_turtle(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let fields = field_pairs(fields, |f| format!("{} := {}", self.quote_ident(f.name), f.sql));
        Ok(format!(
            "ANY_VALUE(CASE WHEN group_set={group_set} THEN STRUCT_PACK({fields}) END)"
        ))
    }

    fn any_value_last(&self, group_set: usize, sql: &str) -> Result<String> {
        Ok(format!("MAX(CASE WHEN group_set={group_set} THEN {sql} END)"))
    }

    fn coalesce_measures_inline(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let values = field_pairs(fields, |f| format!("{}: {}", self.quote_ident(f.name), f.sql));
        let nulls = field_pairs(fields, |f| format!("{}: NULL", self.quote_ident(f.name)));
        Ok(format!(
            "COALESCE(FIRST({{{values}}}) FILTER(WHERE group_set={group_set}), {{{nulls}}})"
        ))
    }

    fn unnest(&self, spec: &UnnestSpec) -> Result<UnnestJoin> {
        let UnnestSpec { source, alias, .. } = *spec;
        if self.lateral_unnest {
            return Ok(UnnestJoin::native(format!(
                "LEFT JOIN LATERAL UNNEST({source}) WITH ORDINALITY as {alias}_outer({alias}, __row_id) ON true"
            )));
        }

        let bound = if spec.in_nested_pipeline {
            spec.bound.to_string()
        } else {
            format!("array_length({source})")
        };
        let sql = format!(
            "LEFT JOIN (select UNNEST(generate_series(1, {bound}, 1)) as __row_id) as {alias} ON {alias}.__row_id <= array_length({source})"
        );
        let degraded = if spec.in_nested_pipeline {
            format!(
                "unnesting `{alias}` through a number series; arrays longer than {} elements are truncated",
                spec.bound
            )
        } else {
            format!("unnesting `{alias}` through a number series joined on the array length")
        };
        Ok(UnnestJoin {
            sql,
            degraded: Some(degraded),
        })
    }

    fn unnested_field(
        &self,
        alias: &str,
        source: &str,
        name: &str,
        _ty: &SemanticType,
        array_of_scalars: bool,
    ) -> Result<String> {
        if self.lateral_unnest {
            return Ok(if name == "__row_id" {
                format!("{alias}_outer.__row_id")
            } else if array_of_scalars {
                alias.to_string()
            } else {
                format!("{alias}.{}", self.quote_ident(name))
            });
        }

        let element = format!("{source}[{alias}.__row_id]");
        Ok(if name == "__row_id" {
            format!("{alias}.__row_id")
        } else if array_of_scalars {
            element
        } else {
            format!("{element}.{}", self.quote_ident(name))
        })
    }

    fn sample_table(&self, table: &str, sampling: Sampling) -> Result<String> {
        Ok(match sampling {
            Sampling::Rows(rows) => format!("(SELECT * FROM {table} USING SAMPLE {rows})"),
            Sampling::Percent(percent) => {
                format!("(SELECT * FROM {table} USING SAMPLE {percent} PERCENT (bernoulli))")
            }
        })
    }

    fn function_overrides(&self) -> &'static [OverloadDef] {
        OVERRIDES
    }

    fn dialect_functions(&self) -> &'static [OverloadDef] {
        FUNCTIONS
    }
}

/// Applies `func` to `value` once per distinct `key`, by collecting the
/// distinct pairs into a list.
fn distinct_by_key(func: &str, key: &str, value: &str) -> String {
    format!(
        "(SELECT {func}(a.val) as value FROM (SELECT UNNEST(list(distinct {{key:{key}, val: {value}}})) a))"
    )
}
