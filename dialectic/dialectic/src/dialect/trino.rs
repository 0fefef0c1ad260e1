use dialectic_ir::ir::{
    DeltaOp, ExtractUnit, NumberKind, Sampling, SemanticType, TimestampUnit, TypeKind,
};

use super::{field_pairs, types, Dialect, DialectHandler, TimeKind, TurtleField, UnnestJoin, UnnestSpec};
use crate::functions::{param, OverloadDef, ReturnType, ANY, BOOLEAN, NUMBER, STRING};
use crate::{Error, Result, WithErrorInfo};

/// Trino, and its predecessor Presto.
#[derive(Debug)]
pub struct TrinoDialect {
    /// `LEFT JOIN UNNEST` is available. Without it, a left join is emulated
    /// by cross joining the array with a null element appended for empty ones.
    pub left_join_unnest: bool,
}

const GENERIC: &[TypeKind] = &[
    TypeKind::String,
    TypeKind::Number,
    TypeKind::Date,
    TypeKind::Timestamp,
    TypeKind::Boolean,
    TypeKind::Json,
];

static OVERRIDES: &[OverloadDef] = &[
    OverloadDef::new(
        "is_inf",
        &[param("value", NUMBER)],
        ReturnType::Boolean,
        "COALESCE(IS_INFINITE({value}), false)",
    ),
    OverloadDef::new(
        "div",
        &[param("dividend", NUMBER), param("divisor", NUMBER)],
        ReturnType::Integer,
        "CAST(TRUNCATE(CAST({dividend} AS DOUBLE) / {divisor}) AS BIGINT)",
    ),
    OverloadDef::new(
        "byte_length",
        &[param("value", STRING)],
        ReturnType::Integer,
        "LENGTH(TO_UTF8({value}))",
    ),
    OverloadDef::new(
        "ascii",
        &[param("value", STRING)],
        ReturnType::Integer,
        "CODEPOINT(SUBSTR({value}, 1, 1))",
    ),
    OverloadDef::new(
        "string_agg",
        &[param("value", STRING)],
        ReturnType::String,
        "ARRAY_JOIN(ARRAY_AGG({value}{order_by}), ',')",
    )
    .with_order_by(),
    OverloadDef::new(
        "string_agg",
        &[param("value", STRING), param("separator", STRING)],
        ReturnType::String,
        "ARRAY_JOIN(ARRAY_AGG({value}{order_by}), {separator})",
    )
    .with_order_by(),
];

static FUNCTIONS: &[OverloadDef] = &[
    OverloadDef::new(
        "approx_percentile",
        &[param("value", NUMBER), param("percentage", NUMBER)],
        ReturnType::Float,
        "APPROX_PERCENTILE({value}, {percentage})",
    )
    .aggregate(),
    OverloadDef::new(
        "arbitrary",
        &[param("value", GENERIC)],
        ReturnType::SameAs("value"),
        "ARBITRARY({value})",
    )
    .aggregate(),
    OverloadDef::new("bool_and", &[param("value", BOOLEAN)], ReturnType::Boolean, "BOOL_AND({value})")
        .aggregate(),
    OverloadDef::new("bool_or", &[param("value", BOOLEAN)], ReturnType::Boolean, "BOOL_OR({value})")
        .aggregate(),
    OverloadDef::new(
        "corr",
        &[param("y", NUMBER), param("x", NUMBER)],
        ReturnType::Float,
        "CORR({y}, {x})",
    )
    .aggregate(),
    OverloadDef::new(
        "max_by",
        &[param("value", GENERIC), param("order_by_val", ANY)],
        ReturnType::SameAs("value"),
        "MAX_BY({value}, {order_by_val})",
    )
    .aggregate(),
    OverloadDef::new(
        "min_by",
        &[param("value", GENERIC), param("order_by_val", ANY)],
        ReturnType::SameAs("value"),
        "MIN_BY({value}, {order_by_val})",
    )
    .aggregate(),
    OverloadDef::new("variance", &[param("value", NUMBER)], ReturnType::Float, "VARIANCE({value})")
        .aggregate(),
];

const HASH_TYPE: &str = "DECIMAL(38,0)";
const SUM_SCALE: &str = "100000000";

impl DialectHandler for TrinoDialect {
    fn dialect(&self) -> Dialect {
        if self.left_join_unnest {
            Dialect::Trino
        } else {
            Dialect::Presto
        }
    }

    fn supports_safe_cast(&self) -> bool {
        true
    }

    fn default_number_type(&self) -> &'static str {
        "DOUBLE"
    }

    fn default_decimal_type(&self) -> &'static str {
        "DECIMAL"
    }

    fn nulls_last(&self) -> bool {
        true
    }

    fn to_native_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::String => "VARCHAR".to_string(),
            SemanticType::Number(NumberKind::Integer) => "BIGINT".to_string(),
            SemanticType::Number(NumberKind::Float) => "DOUBLE".to_string(),
            SemanticType::Boolean => "BOOLEAN".to_string(),
            SemanticType::Date => "DATE".to_string(),
            SemanticType::Timestamp => "TIMESTAMP".to_string(),
            SemanticType::Json => "JSON".to_string(),
            SemanticType::Native(raw) => raw.clone(),
            SemanticType::Array(inner) => format!("ARRAY({})", self.to_native_type(inner)),
            SemanticType::Record(fields) => types::struct_type(self, "ROW", fields),
        }
    }

    fn native_scalar(&self, name: &str) -> Option<SemanticType> {
        Some(match name {
            "tinyint" | "smallint" | "integer" | "int" | "bigint" => SemanticType::integer(),
            "double" | "real" | "decimal" => SemanticType::float(),
            "varchar" | "char" | "string" | "uuid" => SemanticType::String,
            "boolean" => SemanticType::Boolean,
            "date" => SemanticType::Date,
            "timestamp" | "timestamp with time zone" => SemanticType::Timestamp,
            "json" => SemanticType::Json,
            _ => return None,
        })
    }

    fn now(&self) -> String {
        self.from_civil("CURRENT_TIMESTAMP", "UTC")
    }

    fn timestamp_literal(&self, value: &str, timezone: Option<&str>) -> String {
        match timezone {
            Some(tz) => self.from_civil(&format!("TIMESTAMP '{value} {tz}'"), tz),
            None => format!("TIMESTAMP '{value}'"),
        }
    }

    fn to_civil(&self, sql: &str, timezone: &str) -> String {
        if self.left_join_unnest {
            format!("at_timezone(with_timezone({sql}, 'UTC'), '{timezone}')")
        } else {
            format!("(({sql}) AT TIME ZONE 'UTC') AT TIME ZONE '{timezone}'")
        }
    }

    fn from_civil(&self, sql: &str, _timezone: &str) -> String {
        if self.left_join_unnest {
            format!("CAST(at_timezone({sql}, 'UTC') AS TIMESTAMP)")
        } else {
            format!("CAST(({sql}) AT TIME ZONE 'UTC' AS TIMESTAMP)")
        }
    }

    fn civil_from_date(&self, sql: &str, timezone: &str) -> String {
        if self.left_join_unnest {
            format!("with_timezone(CAST({sql} AS TIMESTAMP), '{timezone}')")
        } else {
            format!("CAST(CAST({sql} AS VARCHAR) || ' 00:00:00 {timezone}' AS TIMESTAMP WITH TIME ZONE)")
        }
    }

    fn trunc_native(&self, sql: &str, _kind: TimeKind, unit: TimestampUnit) -> String {
        format!("DATE_TRUNC('{unit}', {sql})")
    }

    fn extract_native(&self, sql: &str, _kind: TimeKind, unit: ExtractUnit) -> String {
        let unit = unit.to_string().to_uppercase();
        format!("EXTRACT({unit} FROM {sql})")
    }

    fn delta_native(
        &self,
        sql: &str,
        _kind: TimeKind,
        op: DeltaOp,
        amount: &str,
        unit: TimestampUnit,
    ) -> String {
        let amount = match op {
            DeltaOp::Add => amount.to_string(),
            DeltaOp::Sub => format!("({amount})*-1"),
        };
        format!("DATE_ADD('{unit}', {amount}, {sql})")
    }

    fn measure(
        &self,
        from: (&str, TimeKind),
        to: (&str, TimeKind),
        unit: TimestampUnit,
    ) -> Result<String> {
        // counting in a finer unit, so that partial units floor instead of truncating
        let finer = match unit {
            TimestampUnit::Second => Some(("millisecond", 1000)),
            TimestampUnit::Minute => Some(("second", 60)),
            TimestampUnit::Hour => Some(("minute", 60)),
            TimestampUnit::Day => Some(("hour", 24)),
            TimestampUnit::Week => Some(("day", 7)),
            TimestampUnit::Month | TimestampUnit::Quarter | TimestampUnit::Year => None,
        };
        let operand = |(sql, kind): (&str, TimeKind)| match kind {
            TimeKind::Date if finer.is_some() => format!("CAST({sql} AS TIMESTAMP)"),
            _ => sql.to_string(),
        };
        let (from, to) = (operand(from), operand(to));
        Ok(match finer {
            Some((finer, ratio)) => format!(
                "FLOOR(CAST(DATE_DIFF('{finer}',{from},{to}) AS DOUBLE)/{ratio}.0)"
            ),
            None => format!("DATE_DIFF('{unit}',{from},{to})"),
        })
    }

    fn regex_match(&self, expr: &str, regex: &str) -> String {
        format!("REGEXP_LIKE({expr}, {regex})")
    }

    fn divide(&self, left: &str, right: &str) -> String {
        format!("CAST({left} AS DOUBLE)/{right}")
    }

    fn singleton_array(&self, sql: &str) -> String {
        format!("ARRAY[{sql}]")
    }

    fn sum_distinct_hashed_key(&self, key: &str) -> Result<String> {
        let digest = format!("to_hex(md5(to_utf8(CAST({key} AS VARCHAR))))");
        let upper = format!(
            "cast(from_base(substr({digest}, 1, 15),16) as {HASH_TYPE}) * CAST('4294967296' AS {HASH_TYPE})"
        );
        let lower = format!("cast(from_base(substr({digest}, 16, 8),16) as {HASH_TYPE})");
        Ok(format!("({upper} + {lower})"))
    }

    fn symmetric_sum(&self, key: &str, value: &str) -> Result<String> {
        let hash = self.sum_distinct_hashed_key(key)?;
        let scaled = format!("CAST(COALESCE({value},0)*{SUM_SCALE} as {HASH_TYPE})");
        Ok(format!(
            "CAST(SUM(DISTINCT {hash} + {scaled}) - SUM(DISTINCT {hash}) AS DOUBLE)/{SUM_SCALE}"
        ))
    }

    fn group_set_table(&self, max: usize) -> Result<String> {
        Ok(format!(
            "CROSS JOIN (SELECT row_number() OVER() -1  group_set FROM UNNEST(SEQUENCE(0,{max})))"
        ))
    }

    fn aggregate_turtle(
        &self,
        group_set: usize,
        fields: &[TurtleField],
        order_by: Option<&str>,
        limit: Option<u64>,
    ) -> Result<String> {
        let order_by = order_by.map(|o| format!(" ORDER BY {o}")).unwrap_or_default();
        let rows = format!(
            "ARRAY_AGG({}{order_by}) FILTER (WHERE group_set={group_set})",
            self.row(fields)
        );
        Ok(match limit {
            Some(limit) => format!("SLICE({rows}, 1, {limit})"),
            None => rows,
        })
    }

    fn any_value_turtle(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        Ok(format!(
            "{}(CASE WHEN group_set={group_set} THEN {} END)",
            self.any_value(),
            self.row(fields)
        ))
    }

    fn any_value_last(&self, group_set: usize, sql: &str) -> Result<String> {
        Ok(format!(
            "{}(CASE WHEN group_set={group_set} THEN {sql} END)",
            self.any_value()
        ))
    }

    fn coalesce_measures_inline(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let nulls = field_pairs(fields, |_| "NULL".to_string());
        Ok(format!(
            "COALESCE({}(CASE WHEN group_set={group_set} THEN {} END), CAST(ROW({nulls}) AS ROW({})))",
            self.any_value(),
            self.row(fields),
            self.row_type(fields)
        ))
    }

    fn unnest(&self, spec: &UnnestSpec) -> Result<UnnestJoin> {
        let UnnestSpec { source, alias, .. } = *spec;
        // arrays of scalars name the element `value`, records name it after the alias
        let (relation, element) = if spec.array_of_scalars {
            (alias.to_string(), "value".to_string())
        } else {
            (format!("{alias}_outer"), alias.to_string())
        };

        if self.left_join_unnest {
            let zipped = format!("UNNEST(zip_with({source},array[],(r,ignore) -> (r, ignore)))");
            return Ok(UnnestJoin::native(if spec.needs_distinct_key {
                format!(
                    "LEFT JOIN {zipped} WITH ORDINALITY as {relation}({element}, ignore,__row_id_from_{alias}) ON TRUE"
                )
            } else {
                format!("LEFT JOIN {zipped} as {relation}({element}, ignore) ON TRUE")
            }));
        }

        let padded = format!("UNNEST(COALESCE({source}, ARRAY[NULL]))");
        let sql = if spec.needs_distinct_key {
            format!(
                "CROSS JOIN {padded} WITH ORDINALITY as {relation}({element}, __row_id_almost_{alias})\n\
                 CROSS JOIN UNNEST(ARRAY[CASE WHEN {source} IS NOT NULL THEN __row_id_almost_{alias} END]) as {alias}_ignore(__row_id_from_{alias})"
            )
        } else {
            format!("CROSS JOIN {padded} as {relation}({element})")
        };
        Ok(UnnestJoin {
            sql,
            degraded: Some(format!(
                "left join of `{alias}` emulated with CROSS JOIN UNNEST over a null padded array"
            )),
        })
    }

    fn unnested_field(
        &self,
        alias: &str,
        _source: &str,
        name: &str,
        _ty: &SemanticType,
        array_of_scalars: bool,
    ) -> Result<String> {
        Ok(if name == "__row_id" {
            format!("__row_id_from_{alias}")
        } else if array_of_scalars {
            format!("{alias}.value")
        } else {
            format!("{alias}.{}", self.quote_ident(name))
        })
    }

    fn sample_table(&self, table: &str, sampling: Sampling) -> Result<String> {
        match sampling {
            Sampling::Rows(_) => Err(Error::unsupported(self.name(), "sampling by row count")
                .push_hint("sample by percent instead")),
            Sampling::Percent(percent) => {
                Ok(format!("(SELECT * FROM {table}  TABLESAMPLE SYSTEM ({percent}))"))
            }
        }
    }

    fn function_overrides(&self) -> &'static [OverloadDef] {
        OVERRIDES
    }

    fn dialect_functions(&self) -> &'static [OverloadDef] {
        FUNCTIONS
    }
}

impl TrinoDialect {
    fn any_value(&self) -> &'static str {
        if self.left_join_unnest {
            "ANY_VALUE"
        } else {
            "ARBITRARY"
        }
    }

    fn row_type(&self, fields: &[TurtleField]) -> String {
        field_pairs(fields, |f| {
            format!("{} {}", self.quote_ident(f.name), self.to_native_type(f.ty))
        })
    }

    fn row(&self, fields: &[TurtleField]) -> String {
        let values = field_pairs(fields, |f| f.sql.to_string());
        format!("CAST(ROW({values}) AS ROW({}))", self.row_type(fields))
    }
}
