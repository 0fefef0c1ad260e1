use dialectic_ir::ir::{DeltaOp, ExtractUnit, NumberKind, Sampling, SemanticType, TimestampUnit};

use super::{field_pairs, pg_family, Dialect, DialectHandler, TimeKind, TurtleField, UnnestJoin, UnnestSpec};
use crate::functions::{param, OverloadDef, ReturnType, NUMBER, STRING};
use crate::{Error, Result, WithErrorInfo};

#[derive(Debug)]
pub struct SnowflakeDialect;

static OVERRIDES: &[OverloadDef] = &[
    OverloadDef::new("rand", &[], ReturnType::Float, "UNIFORM(0::float, 1::float, RANDOM())"),
    OverloadDef::new(
        "div",
        &[param("dividend", NUMBER), param("divisor", NUMBER)],
        ReturnType::Integer,
        "TRUNC({dividend} / {divisor})",
    ),
    OverloadDef::new(
        "is_inf",
        &[param("value", NUMBER)],
        ReturnType::Boolean,
        "COALESCE({value} IN ('inf'::FLOAT, '-inf'::FLOAT), false)",
    ),
    OverloadDef::new(
        "strpos",
        &[param("value", STRING), param("search", STRING)],
        ReturnType::Integer,
        "POSITION({search}, {value})",
    ),
    OverloadDef::new(
        "starts_with",
        &[param("value", STRING), param("prefix", STRING)],
        ReturnType::Boolean,
        "STARTSWITH({value}, {prefix})",
    ),
    OverloadDef::new(
        "ends_with",
        &[param("value", STRING), param("suffix", STRING)],
        ReturnType::Boolean,
        "ENDSWITH({value}, {suffix})",
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

static FUNCTIONS: &[OverloadDef] = &[
    OverloadDef::new("median", &[param("value", NUMBER)], ReturnType::Float, "MEDIAN({value})")
        .aggregate(),
];

/// Scale of the fixed-point values summed by symmetric aggregates.
const SUM_SCALE: &str = "100000000.0";

impl DialectHandler for SnowflakeDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Snowflake
    }

    fn supports_safe_cast(&self) -> bool {
        true
    }

    fn division_is_integer(&self) -> bool {
        false
    }

    fn default_number_type(&self) -> &'static str {
        "NUMBER"
    }

    fn default_decimal_type(&self) -> &'static str {
        "NUMBER"
    }

    fn nulls_last(&self) -> bool {
        true
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }

    fn regex_literal(&self, value: &str) -> String {
        self.string_literal(value)
    }

    fn to_native_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::String => "VARCHAR",
            SemanticType::Number(NumberKind::Integer) => "NUMBER",
            SemanticType::Number(NumberKind::Float) => "DOUBLE",
            SemanticType::Boolean => "BOOLEAN",
            SemanticType::Date => "DATE",
            SemanticType::Timestamp => "TIMESTAMP_NTZ",
            SemanticType::Json => "VARIANT",
            SemanticType::Native(raw) => return raw.clone(),
            SemanticType::Array(_) => "ARRAY",
            SemanticType::Record(_) => "OBJECT",
        }
        .to_string()
    }

    fn native_scalar(&self, name: &str) -> Option<SemanticType> {
        Some(match name {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "byteint" => {
                SemanticType::integer()
            }
            "number" | "decimal" | "numeric" | "float" | "float4" | "float8" | "double"
            | "double precision" | "real" => SemanticType::float(),
            "varchar" | "char" | "character" | "string" | "text" => SemanticType::String,
            "boolean" => SemanticType::Boolean,
            "date" => SemanticType::Date,
            "timestamp" | "timestamp_ntz" | "timestampntz" | "timestamp without time zone"
            | "datetime" | "timestamp_tz" | "timestamptz" | "timestamp with time zone"
            | "timestamp_ltz" => SemanticType::Timestamp,
            "variant" | "object" | "array" => SemanticType::Json,
            _ => return None,
        })
    }

    fn now(&self) -> String {
        "CURRENT_TIMESTAMP()".to_string()
    }

    fn date_literal(&self, value: &str) -> String {
        format!("TO_DATE('{value}')")
    }

    fn timestamp_literal(&self, value: &str, timezone: Option<&str>) -> String {
        let literal = format!("'{value}'::TIMESTAMP_NTZ");
        match timezone {
            Some(tz) => format!("CONVERT_TIMEZONE('{tz}', 'UTC', {literal})"),
            None => literal,
        }
    }

    fn to_civil(&self, sql: &str, timezone: &str) -> String {
        format!("CONVERT_TIMEZONE('UTC', '{timezone}', ({sql})::TIMESTAMP_NTZ)")
    }

    fn from_civil(&self, sql: &str, timezone: &str) -> String {
        format!("CONVERT_TIMEZONE('{timezone}', 'UTC', ({sql})::TIMESTAMP_NTZ)")
    }

    fn civil_from_date(&self, sql: &str, _timezone: &str) -> String {
        format!("({sql})::TIMESTAMP_NTZ")
    }

    fn trunc_native(&self, sql: &str, _kind: TimeKind, unit: TimestampUnit) -> String {
        format!("DATE_TRUNC('{unit}', {sql})")
    }

    fn extract_native(&self, sql: &str, _kind: TimeKind, unit: ExtractUnit) -> String {
        let unit = match unit {
            ExtractUnit::DayOfWeek => "DAYOFWEEKISO".to_string(),
            ExtractUnit::DayOfYear => "DAYOFYEAR".to_string(),
            ExtractUnit::Week => "WEEKISO".to_string(),
            unit => unit.to_string(),
        };
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
            DeltaOp::Sub => format!("-({amount})"),
        };
        format!("DATEADD({unit}, {amount}, {sql})")
    }

    fn measure(
        &self,
        from: (&str, TimeKind),
        to: (&str, TimeKind),
        unit: TimestampUnit,
    ) -> Result<String> {
        let Some(seconds) = pg_family::seconds_in(unit) else {
            return Err(Error::unsupported(self.name(), format!("measuring time in {unit}s")));
        };
        let epoch = |sql: &str| format!("DATE_PART(epoch_second, ({sql})::TIMESTAMP_NTZ)");
        Ok(format!(
            "FLOOR(({}-{})/{seconds}.0)",
            epoch(to.0),
            epoch(from.0)
        ))
    }

    fn cast(&self, sql: &str, from: &SemanticType, to: &SemanticType, safe: bool) -> Result<String> {
        let target = self.cast_type(to);
        if !safe {
            return Ok(format!("CAST({sql} AS {target})"));
        }
        if from != &SemanticType::String {
            return Err(Error::unsupported(self.name(), "safe cast from a non-string value")
                .push_hint("TRY_CAST only accepts strings"));
        }
        Ok(format!("TRY_CAST({sql} AS {target})"))
    }

    fn regex_match(&self, expr: &str, regex: &str) -> String {
        format!("REGEXP_INSTR({expr}, {regex}) != 0")
    }

    fn singleton_array(&self, sql: &str) -> String {
        format!("ARRAY_CONSTRUCT({sql})")
    }

    fn sum_distinct_hashed_key(&self, key: &str) -> Result<String> {
        let key = format!("{key}::STRING");
        let upper = format!("to_number(substr(md5_hex({key}), 1, 15), repeat('X', 15)) * 4294967296");
        let lower = format!("to_number(substr(md5_hex({key}), 16, 8), repeat('X', 8))");
        Ok(format!("({upper} + {lower})"))
    }

    fn symmetric_sum(&self, key: &str, value: &str) -> Result<String> {
        let hash = self.sum_distinct_hashed_key(key)?;
        let scaled = format!("(CAST (COALESCE({value},0)*{SUM_SCALE} as INT))");
        Ok(format!(
            "(SUM(DISTINCT {hash} + {scaled}) - SUM(DISTINCT {hash}))/{SUM_SCALE}"
        ))
    }

    fn group_set_table(&self, max: usize) -> Result<String> {
        Ok(format!(
            "CROSS JOIN (SELECT index as group_set FROM TABLE(FLATTEN(ARRAY_GENERATE_RANGE(0, {}))))",
            max + 1
        ))
    }

    fn aggregate_turtle(
        &self,
        group_set: usize,
        fields: &[TurtleField],
        order_by: Option<&str>,
        limit: Option<u64>,
    ) -> Result<String> {
        let object = self.object(fields);
        let within = order_by
            .map(|o| format!(" WITHIN GROUP (ORDER BY {o})"))
            .unwrap_or_default();
        let rows = format!(
            "COALESCE(ARRAY_AGG(CASE WHEN group_set={group_set} THEN {object} END){within}, [])"
        );
        Ok(match limit {
            Some(limit) => format!("ARRAY_SLICE({rows}, 0, {limit})"),
            None => rows,
        })
    }

    fn any_value_turtle(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let object = self.object(fields);
        Ok(format!(
            "(ARRAY_AGG(CASE WHEN group_set={group_set} THEN {object} END) WITHIN GROUP (ORDER BY 1 ASC NULLS LAST))[0]"
        ))
    }

    fn any_value_last(&self, group_set: usize, sql: &str) -> Result<String> {
        Ok(format!(
            "(ARRAY_AGG(CASE WHEN group_set={group_set} THEN {sql} END) WITHIN GROUP (ORDER BY {sql} ASC NULLS LAST))[0]"
        ))
    }

    fn coalesce_measures_inline(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let object = self.object(fields);
        let nulls = field_pairs(fields, |f| format!("{}, NULL", self.string_literal(f.name)));
        Ok(format!(
            "COALESCE(ARRAY_AGG(CASE WHEN group_set={group_set} THEN {object} END)[0], OBJECT_CONSTRUCT_KEEP_NULL({nulls}))"
        ))
    }

    fn unnest(&self, spec: &UnnestSpec) -> Result<UnnestJoin> {
        let alias = self.quote_ident(spec.alias);
        Ok(UnnestJoin::native(format!(
            "LEFT JOIN LATERAL FLATTEN(INPUT => {}) AS {alias}",
            spec.source
        )))
    }

    fn unnested_field(
        &self,
        alias: &str,
        _source: &str,
        name: &str,
        ty: &SemanticType,
        array_of_scalars: bool,
    ) -> Result<String> {
        let alias = self.quote_ident(alias);
        if name == "__row_id" {
            return Ok(format!("{alias}.INDEX::varchar"));
        }
        let value = if array_of_scalars {
            format!("{alias}.value")
        } else {
            format!("{alias}.value:{}", self.quote_ident(name))
        };
        let ty = match ty {
            SemanticType::String => "VARCHAR",
            SemanticType::Number(_) => "DOUBLE",
            SemanticType::Boolean => "BOOLEAN",
            SemanticType::Date => "DATE",
            SemanticType::Timestamp => "TIMESTAMP_NTZ",
            SemanticType::Json
            | SemanticType::Native(_)
            | SemanticType::Array(_)
            | SemanticType::Record(_) => "VARIANT",
        };
        Ok(format!("{value}::{ty}"))
    }

    fn sample_table(&self, table: &str, sampling: Sampling) -> Result<String> {
        Ok(match sampling {
            Sampling::Rows(rows) => format!("(SELECT * FROM {table} TABLESAMPLE ({rows} ROWS))"),
            Sampling::Percent(percent) => format!("(SELECT * FROM {table} TABLESAMPLE ({percent}))"),
        })
    }

    fn function_overrides(&self) -> &'static [OverloadDef] {
        OVERRIDES
    }

    fn dialect_functions(&self) -> &'static [OverloadDef] {
        FUNCTIONS
    }
}

impl SnowflakeDialect {
    fn object(&self, fields: &[TurtleField]) -> String {
        let pairs = field_pairs(fields, |f| format!("{}, ({})", self.string_literal(f.name), f.sql));
        format!("OBJECT_CONSTRUCT_KEEP_NULL({pairs})")
    }
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn test_safe_cast() {
        assert_snapshot!(
            SnowflakeDialect.cast("s", &SemanticType::String, &SemanticType::integer(), true).unwrap(),
            @"TRY_CAST(s AS NUMBER)"
        );
        let err = SnowflakeDialect
            .cast("n", &SemanticType::float(), &SemanticType::String, true)
            .unwrap_err();
        assert_snapshot!(err.reason, @"safe cast from a non-string value is not supported by dialect `snowflake`");
    }

    #[test]
    fn test_symmetric_sum() {
        assert_snapshot!(
            SnowflakeDialect.symmetric_sum("k", "v").unwrap(),
            @"(SUM(DISTINCT (to_number(substr(md5_hex(k::STRING), 1, 15), repeat('X', 15)) * 4294967296 + to_number(substr(md5_hex(k::STRING), 16, 8), repeat('X', 8))) + (CAST (COALESCE(v,0)*100000000.0 as INT))) - SUM(DISTINCT (to_number(substr(md5_hex(k::STRING), 1, 15), repeat('X', 15)) * 4294967296 + to_number(substr(md5_hex(k::STRING), 16, 8), repeat('X', 8)))))/100000000.0"
        );
    }

    #[test]
    fn test_unnested_field() {
        assert_snapshot!(
            SnowflakeDialect.unnested_field("items_0", "base.items", "price", &SemanticType::float(), false).unwrap(),
            @r#""items_0".value:"price"::DOUBLE"#
        );
        assert_snapshot!(
            SnowflakeDialect.unnested_field("items_0", "base.items", "__row_id", &SemanticType::integer(), false).unwrap(),
            @r#""items_0".INDEX::varchar"#
        );
    }

    #[test]
    fn test_group_set_table() {
        assert_snapshot!(
            SnowflakeDialect.group_set_table(2).unwrap(),
            @"CROSS JOIN (SELECT index as group_set FROM TABLE(FLATTEN(ARRAY_GENERATE_RANGE(0, 3))))"
        );
    }
}
