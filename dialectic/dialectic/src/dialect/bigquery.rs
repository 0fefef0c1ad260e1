use dialectic_ir::ir::{DeltaOp, ExtractUnit, NumberKind, Sampling, SemanticType, TimestampUnit};

use super::{
    field_pairs, Dialect, DialectHandler, TimeKind, TurtleField, UnnestJoin, UnnestSpec, WeekStart,
};
use crate::functions::{param, OverloadDef, ReturnType, NUMBER, STRING};
use crate::{Error, Result, WithErrorInfo};

#[derive(Debug)]
pub struct BigQueryDialect;

static OVERRIDES: &[OverloadDef] = &[
    OverloadDef::new("rand", &[], ReturnType::Float, "RAND()"),
    OverloadDef::new("pi", &[], ReturnType::Float, "ACOS(-1)"),
    OverloadDef::new(
        "is_inf",
        &[param("value", NUMBER)],
        ReturnType::Boolean,
        "COALESCE(IS_INF({value}), false)",
    ),
    OverloadDef::new(
        "log",
        &[param("base", NUMBER), param("value", NUMBER)],
        ReturnType::Float,
        "LOG({value}, {base})",
    ),
    OverloadDef::new(
        "byte_length",
        &[param("value", STRING)],
        ReturnType::Integer,
        "BYTE_LENGTH({value})",
    ),
    OverloadDef::new(
        "chr",
        &[param("value", NUMBER)],
        ReturnType::String,
        "CODE_POINTS_TO_STRING([CAST({value} AS INT64)])",
    ),
    OverloadDef::new(
        "ends_with",
        &[param("value", STRING), param("suffix", STRING)],
        ReturnType::Boolean,
        "ENDS_WITH({value}, {suffix})",
    ),
];

impl DialectHandler for BigQueryDialect {
    fn dialect(&self) -> Dialect {
        Dialect::BigQuery
    }

    fn supports_safe_cast(&self) -> bool {
        true
    }

    fn division_is_integer(&self) -> bool {
        false
    }

    fn native_week_start(&self) -> WeekStart {
        WeekStart::Sunday
    }

    fn calendar_delta_in_civil_time(&self) -> bool {
        true
    }

    fn default_number_type(&self) -> &'static str {
        "FLOAT64"
    }

    fn has_mod_operator(&self) -> bool {
        false
    }

    fn ident_quote(&self) -> char {
        '`'
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", escape_backslashed(value))
    }

    fn regex_literal(&self, value: &str) -> String {
        format!("'{}'", escape_backslashed(value))
    }

    fn to_native_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::String => "STRING".to_string(),
            SemanticType::Number(NumberKind::Integer) => "INT64".to_string(),
            SemanticType::Number(NumberKind::Float) => "FLOAT64".to_string(),
            SemanticType::Boolean => "BOOL".to_string(),
            SemanticType::Date => "DATE".to_string(),
            SemanticType::Timestamp => "TIMESTAMP".to_string(),
            SemanticType::Json => "JSON".to_string(),
            SemanticType::Native(raw) => raw.clone(),
            SemanticType::Array(inner) => format!("ARRAY<{}>", self.to_native_type(inner)),
            SemanticType::Record(fields) => {
                let fields = fields
                    .iter()
                    .map(|f| format!("{} {}", self.quote_ident(&f.name), self.to_native_type(&f.ty)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("STRUCT<{fields}>")
            }
        }
    }

    fn native_scalar(&self, name: &str) -> Option<SemanticType> {
        Some(match name {
            "int64" | "integer" | "int" | "smallint" | "bigint" | "tinyint" | "byteint" => {
                SemanticType::integer()
            }
            "float64" | "float" | "numeric" | "bignumeric" | "decimal" | "bigdecimal" => {
                SemanticType::float()
            }
            "string" => SemanticType::String,
            "bool" | "boolean" => SemanticType::Boolean,
            "date" => SemanticType::Date,
            "timestamp" => SemanticType::Timestamp,
            "json" => SemanticType::Json,
            _ => return None,
        })
    }

    fn now(&self) -> String {
        "CURRENT_TIMESTAMP()".to_string()
    }

    fn date_literal(&self, value: &str) -> String {
        format!("DATE('{value}')")
    }

    fn timestamp_literal(&self, value: &str, timezone: Option<&str>) -> String {
        match timezone {
            Some(tz) => format!("TIMESTAMP('{value}', '{tz}')"),
            None => format!("TIMESTAMP('{value}')"),
        }
    }

    fn to_civil(&self, sql: &str, timezone: &str) -> String {
        format!("DATETIME({sql}, '{timezone}')")
    }

    fn from_civil(&self, sql: &str, timezone: &str) -> String {
        format!("TIMESTAMP({sql}, '{timezone}')")
    }

    fn civil_from_date(&self, sql: &str, _timezone: &str) -> String {
        format!("DATETIME({sql})")
    }

    fn trunc_native(&self, sql: &str, kind: TimeKind, unit: TimestampUnit) -> String {
        let unit = unit.to_string().to_uppercase();
        match kind {
            TimeKind::Civil => format!("DATETIME_TRUNC({sql}, {unit})"),
            TimeKind::Date => format!("DATE_TRUNC({sql}, {unit})"),
            TimeKind::Timestamp => format!("TIMESTAMP_TRUNC({sql}, {unit})"),
        }
    }

    fn extract_native(&self, sql: &str, _kind: TimeKind, unit: ExtractUnit) -> String {
        match unit {
            // DAYOFWEEK counts from Sunday as 1
            ExtractUnit::DayOfWeek => format!("(MOD(EXTRACT(DAYOFWEEK FROM {sql})+5,7)+1)"),
            ExtractUnit::DayOfYear => format!("EXTRACT(DAYOFYEAR FROM {sql})"),
            ExtractUnit::Week => format!("EXTRACT(ISOWEEK FROM {sql})"),
            unit => format!("EXTRACT({} FROM {sql})", unit.to_string().to_uppercase()),
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
        let prefix = match kind {
            TimeKind::Civil => "DATETIME",
            TimeKind::Date => "DATE",
            TimeKind::Timestamp => "TIMESTAMP",
        };
        let func = match op {
            DeltaOp::Add => "ADD",
            DeltaOp::Sub => "SUB",
        };
        let unit = unit.to_string().to_uppercase();
        format!("{prefix}_{func}({sql}, INTERVAL {amount} {unit})")
    }

    fn measure(
        &self,
        from: (&str, TimeKind),
        to: (&str, TimeKind),
        unit: TimestampUnit,
    ) -> Result<String> {
        let (measure_in, ratio) = match unit {
            TimestampUnit::Second => ("MILLISECOND", 1000),
            TimestampUnit::Minute => ("SECOND", 60),
            TimestampUnit::Hour => ("MINUTE", 60),
            TimestampUnit::Day => ("HOUR", 24),
            TimestampUnit::Week => ("DAY", 7),
            TimestampUnit::Month | TimestampUnit::Quarter | TimestampUnit::Year => {
                return Err(Error::unsupported(self.name(), format!("measuring time in {unit}s")))
            }
        };
        let operand = |(sql, kind): (&str, TimeKind)| match kind {
            TimeKind::Date => format!("TIMESTAMP({sql})"),
            TimeKind::Timestamp | TimeKind::Civil => sql.to_string(),
        };
        let measured = format!("TIMESTAMP_DIFF({},{},{measure_in})", operand(to), operand(from));
        Ok(format!("FLOOR({measured}/{ratio}.0)"))
    }

    fn cast(&self, sql: &str, _from: &SemanticType, to: &SemanticType, safe: bool) -> Result<String> {
        let func = if safe { "SAFE_CAST" } else { "CAST" };
        Ok(format!("{func}({sql} AS {})", self.cast_type(to)))
    }

    fn regex_match(&self, expr: &str, regex: &str) -> String {
        format!("REGEXP_CONTAINS({expr},{regex})")
    }

    fn sum_distinct_hashed_key(&self, key: &str) -> Result<String> {
        let key = format!("CAST({key} AS STRING)");
        let upper = format!(
            "cast(cast(concat('0x', substr(to_hex(md5({key})), 1, 15)) as int64) as numeric) * 4294967296"
        );
        let lower = format!(
            "cast(cast(concat('0x', substr(to_hex(md5({key})), 16, 8)) as int64) as numeric)"
        );
        Ok(format!("({upper} + {lower}) * 0.000000001"))
    }

    fn group_set_table(&self, max: usize) -> Result<String> {
        Ok(format!(
            "CROSS JOIN (SELECT row_number() OVER() -1  group_set FROM UNNEST(GENERATE_ARRAY(0,{max},1)))"
        ))
    }

    fn aggregate_turtle(
        &self,
        group_set: usize,
        fields: &[TurtleField],
        order_by: Option<&str>,
        limit: Option<u64>,
    ) -> Result<String> {
        let fields = self.struct_fields(fields);
        let order_by = order_by.map(|o| format!(" ORDER BY {o}")).unwrap_or_default();
        let limit = limit.map(|l| format!(" LIMIT {l}")).unwrap_or_default();
        Ok(format!(
            "ARRAY_AGG(CASE WHEN group_set={group_set} THEN STRUCT({fields}) END IGNORE NULLS{order_by}{limit})"
        ))
    }

    fn any_value_turtle(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let fields = self.struct_fields(fields);
        Ok(format!(
            "ANY_VALUE(CASE WHEN group_set={group_set} THEN STRUCT({fields}) END)"
        ))
    }

    fn any_value_last(&self, group_set: usize, sql: &str) -> Result<String> {
        Ok(format!("ANY_VALUE(CASE WHEN group_set={group_set} THEN {sql} END)"))
    }

    fn coalesce_measures_inline(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let values = self.struct_fields(fields);
        let nulls = field_pairs(fields, |f| format!("NULL as {}", self.quote_ident(f.name)));
        Ok(format!(
            "COALESCE(ANY_VALUE(CASE WHEN group_set={group_set} THEN STRUCT({values}) END), STRUCT({nulls}))"
        ))
    }

    fn unnest(&self, spec: &UnnestSpec) -> Result<UnnestJoin> {
        let UnnestSpec { source, alias, .. } = *spec;
        let sql = match (spec.array_of_scalars, spec.needs_distinct_key) {
            (true, true) => format!(
                "LEFT JOIN UNNEST(ARRAY(( SELECT AS STRUCT row_number() over() as __row_id, value FROM UNNEST({source}) value))) as {alias}"
            ),
            (true, false) => format!(
                "LEFT JOIN UNNEST(ARRAY((SELECT AS STRUCT value FROM unnest({source}) value))) as {alias}"
            ),
            (false, true) => format!(
                "LEFT JOIN UNNEST(ARRAY(( SELECT AS STRUCT row_number() over() as __row_id, * FROM UNNEST({source})))) as {alias}"
            ),
            (false, false) => format!("LEFT JOIN UNNEST({source}) as {alias}"),
        };
        Ok(UnnestJoin::native(sql))
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
            format!("{alias}.__row_id")
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
            Sampling::Percent(percent) => Ok(format!(
                "(SELECT * FROM {table}  TABLESAMPLE SYSTEM ({percent} PERCENT))"
            )),
        }
    }

    fn function_overrides(&self) -> &'static [OverloadDef] {
        OVERRIDES
    }
}

impl BigQueryDialect {
    fn struct_fields(&self, fields: &[TurtleField]) -> String {
        field_pairs(fields, |f| format!("{} as {}", f.sql, self.quote_ident(f.name)))
    }
}

fn escape_backslashed(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
