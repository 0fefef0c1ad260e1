use dialectic_ir::ir::{DeltaOp, ExtractUnit, NumberKind, Sampling, SemanticType, TimestampUnit};

use super::{field_pairs, pg_family, Dialect, DialectHandler, TimeKind, TurtleField, UnnestJoin, UnnestSpec, WeekStart};
use crate::functions::{param, OverloadDef, ReturnType, NUMBER, STRING};
use crate::{Error, Result};

/// MySQL 8. Records and arrays are JSON values; they are built with
/// `JSON_OBJECT` and unnested with `JSON_TABLE`.
#[derive(Debug)]
pub struct MySqlDialect;

static OVERRIDES: &[OverloadDef] = &[
    OverloadDef::new(
        "trunc",
        &[param("value", NUMBER)],
        ReturnType::SameAs("value"),
        "TRUNCATE({value}, 0)",
    ),
    OverloadDef::new(
        "trunc",
        &[param("value", NUMBER), param("precision", NUMBER)],
        ReturnType::SameAs("value"),
        "TRUNCATE({value}, {precision})",
    ),
    OverloadDef::new(
        "div",
        &[param("dividend", NUMBER), param("divisor", NUMBER)],
        ReturnType::Integer,
        "({dividend} DIV {divisor})",
    ),
    OverloadDef::new("rand", &[], ReturnType::Float, "RAND()"),
    // there is no infinity in MySQL
    OverloadDef::new("is_inf", &[param("value", NUMBER)], ReturnType::Boolean, "false"),
    OverloadDef::new(
        "length",
        &[param("value", STRING)],
        ReturnType::Integer,
        "CHAR_LENGTH({value})",
    ),
    OverloadDef::new(
        "byte_length",
        &[param("value", STRING)],
        ReturnType::Integer,
        "LENGTH({value})",
    ),
    OverloadDef::new(
        "strpos",
        &[param("value", STRING), param("search", STRING)],
        ReturnType::Integer,
        "LOCATE({search}, {value})",
    ),
    OverloadDef::new(
        "starts_with",
        &[param("value", STRING), param("prefix", STRING)],
        ReturnType::Boolean,
        "({value} LIKE CONCAT({prefix}, '%'))",
    ),
    OverloadDef::new(
        "chr",
        &[param("value", NUMBER)],
        ReturnType::String,
        "CHAR({value} USING utf8mb4)",
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
        "GROUP_CONCAT({value}{order_by} SEPARATOR ',')",
    )
    .with_order_by(),
    OverloadDef::new(
        "string_agg",
        &[param("value", STRING), param("separator", STRING)],
        ReturnType::String,
        "GROUP_CONCAT({value}{order_by} SEPARATOR {separator})",
    )
    .with_order_by(),
];

const HASH_TYPE: &str = "DECIMAL(55, 10)";

impl DialectHandler for MySqlDialect {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn native_week_start(&self) -> WeekStart {
        WeekStart::Sunday
    }

    fn default_number_type(&self) -> &'static str {
        "DOUBLE"
    }

    fn default_decimal_type(&self) -> &'static str {
        "DECIMAL"
    }

    fn ident_quote(&self) -> char {
        '`'
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
    }

    fn to_native_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::String => "VARCHAR(255)".to_string(),
            SemanticType::Number(NumberKind::Integer) => "BIGINT".to_string(),
            SemanticType::Number(NumberKind::Float) => "DOUBLE".to_string(),
            SemanticType::Boolean => "TINYINT(1)".to_string(),
            SemanticType::Date => "DATE".to_string(),
            SemanticType::Timestamp => "DATETIME".to_string(),
            SemanticType::Native(raw) => raw.clone(),
            SemanticType::Json | SemanticType::Array(_) | SemanticType::Record(_) => {
                "JSON".to_string()
            }
        }
    }

    fn native_scalar(&self, name: &str) -> Option<SemanticType> {
        Some(match name {
            "smallint" | "mediumint" | "int" | "integer" | "bigint" => SemanticType::integer(),
            "double" | "float" | "real" | "decimal" | "numeric" => SemanticType::float(),
            "varchar" | "varbinary" | "char" | "text" | "tinytext" | "mediumtext"
            | "longtext" | "time" => SemanticType::String,
            "tinyint" | "bool" | "boolean" => SemanticType::Boolean,
            "date" => SemanticType::Date,
            "datetime" | "timestamp" => SemanticType::Timestamp,
            "json" => SemanticType::Json,
            _ => return None,
        })
    }

    /// Casts target the restricted set of types `CAST` accepts.
    fn cast_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::Number(NumberKind::Integer) | SemanticType::Boolean => {
                "SIGNED".to_string()
            }
            SemanticType::String => "CHAR".to_string(),
            ty => self.to_native_type(ty),
        }
    }

    fn cast(&self, sql: &str, _from: &SemanticType, to: &SemanticType, safe: bool) -> Result<String> {
        if safe {
            return Err(Error::unsupported(self.name(), "safe cast"));
        }
        Ok(match to {
            SemanticType::String => format!("CONCAT({sql}, '')"),
            to => format!("CAST({sql} AS {})", self.cast_type(to)),
        })
    }

    fn now(&self) -> String {
        "UTC_TIMESTAMP()".to_string()
    }

    fn timestamp_literal(&self, value: &str, timezone: Option<&str>) -> String {
        match timezone {
            Some(tz) => format!("CONVERT_TZ('{value}', '{tz}', 'UTC')"),
            None => format!("TIMESTAMP '{value}'"),
        }
    }

    fn to_civil(&self, sql: &str, timezone: &str) -> String {
        format!("CONVERT_TZ({sql}, 'UTC', '{timezone}')")
    }

    fn from_civil(&self, sql: &str, timezone: &str) -> String {
        format!("CONVERT_TZ({sql}, '{timezone}', 'UTC')")
    }

    fn civil_from_date(&self, sql: &str, _timezone: &str) -> String {
        format!("TIMESTAMP({sql})")
    }

    fn trunc_native(&self, sql: &str, kind: TimeKind, unit: TimestampUnit) -> String {
        let sql = match unit {
            TimestampUnit::Week => format!("DATE_SUB({sql}, INTERVAL DAYOFWEEK({sql}) - 1 DAY)"),
            _ => sql.to_string(),
        };
        let format = match unit {
            TimestampUnit::Second => "'%Y-%m-%d %H:%i:%s'".to_string(),
            TimestampUnit::Minute => "'%Y-%m-%d %H:%i:00'".to_string(),
            TimestampUnit::Hour => "'%Y-%m-%d %H:00:00'".to_string(),
            TimestampUnit::Day | TimestampUnit::Week => "'%Y-%m-%d 00:00:00'".to_string(),
            TimestampUnit::Month => "'%Y-%m-01 00:00:00'".to_string(),
            TimestampUnit::Quarter => format!(
                "CASE WHEN MONTH({sql}) > 9 THEN '%Y-10-01 00:00:00' WHEN MONTH({sql}) > 6 THEN '%Y-07-01 00:00:00' WHEN MONTH({sql}) > 3 THEN '%Y-04-01 00:00:00' ELSE '%Y-01-01 00:00:00' END"
            ),
            TimestampUnit::Year => "'%Y-01-01 00:00:00'".to_string(),
        };
        let truncated = format!("TIMESTAMP(DATE_FORMAT({sql}, {format}))");
        match kind {
            TimeKind::Date => format!("DATE({truncated})"),
            TimeKind::Timestamp | TimeKind::Civil => truncated,
        }
    }

    fn extract_native(&self, sql: &str, _kind: TimeKind, unit: ExtractUnit) -> String {
        match unit {
            // WEEKDAY counts from Monday as 0
            ExtractUnit::DayOfWeek => format!("(WEEKDAY({sql})+1)"),
            ExtractUnit::DayOfYear => format!("DAYOFYEAR({sql})"),
            ExtractUnit::Week => format!("WEEK({sql}, 3)"),
            unit => format!("{}({sql})", unit.to_string().to_uppercase()),
        }
    }

    fn delta_native(
        &self,
        sql: &str,
        _kind: TimeKind,
        op: DeltaOp,
        amount: &str,
        unit: TimestampUnit,
    ) -> String {
        let unit = unit.to_string().to_uppercase();
        format!("({sql} {op} INTERVAL {amount} {unit})")
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
        let duration = format!("UNIX_TIMESTAMP({})-UNIX_TIMESTAMP({})", to.0, from.0);
        Ok(if seconds == 1 {
            format!("FLOOR({duration})")
        } else {
            format!("FLOOR(({duration})/{seconds}.0)")
        })
    }

    fn regex_match(&self, expr: &str, regex: &str) -> String {
        format!("REGEXP_LIKE({expr}, {regex})")
    }

    fn singleton_array(&self, sql: &str) -> String {
        format!("JSON_ARRAY({sql})")
    }

    fn sum_distinct_hashed_key(&self, key: &str) -> Result<String> {
        let key = format!("CONCAT({key}, '')");
        let upper =
            format!("CAST(CONV(SUBSTRING(MD5({key}), 1, 16), 16, 10) AS {HASH_TYPE}) * 4294967296");
        let lower = format!("CAST(CONV(SUBSTRING(MD5({key}), 16, 8), 16, 10) AS {HASH_TYPE})");
        Ok(format!("({upper} + {lower})"))
    }

    fn symmetric_sum(&self, key: &str, value: &str) -> Result<String> {
        let hash = self.sum_distinct_hashed_key(key)?;
        let value = format!("CAST(COALESCE({value},0) as {HASH_TYPE})");
        Ok(format!(
            "(SUM(DISTINCT {hash} + {value}) - SUM(DISTINCT {hash}))"
        ))
    }

    fn group_set_table(&self, max: usize) -> Result<String> {
        Ok(format!(
            r#"CROSS JOIN (select number - 1 as group_set from JSON_TABLE(cast(concat("[1", repeat(",1", {max}), "]") as JSON),"$[*]" COLUMNS(number FOR ORDINALITY)) group_set) as group_set"#
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
            "GROUP_CONCAT(IF(group_set={group_set}, {}, null){order_by} SEPARATOR ',')",
            self.object(fields)
        );
        let path = match limit {
            Some(0) => return Ok("JSON_ARRAY()".to_string()),
            Some(limit) => format!("$[0 to {}]", limit - 1),
            None => "$".to_string(),
        };
        Ok(format!(
            "COALESCE(JSON_EXTRACT(CONCAT('[',{rows},']'),'{path}'),JSON_ARRAY())"
        ))
    }

    fn any_value_turtle(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        Ok(format!(
            "MAX(CASE WHEN group_set={group_set} THEN {} END)",
            self.object(fields)
        ))
    }

    fn any_value_last(&self, group_set: usize, sql: &str) -> Result<String> {
        Ok(format!(
            "MAX(CASE WHEN group_set={group_set} AND {sql} IS NOT NULL THEN {sql} END)"
        ))
    }

    fn coalesce_measures_inline(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let nulls = field_pairs(fields, |f| format!("{}, NULL", self.string_literal(f.name)));
        Ok(format!(
            "COALESCE(MAX(CASE WHEN group_set={group_set} THEN {} END),JSON_OBJECT({nulls}))",
            self.object(fields)
        ))
    }

    fn unnest(&self, spec: &UnnestSpec) -> Result<UnnestJoin> {
        let columns = if spec.array_of_scalars {
            "`value` JSON PATH '$'".to_string()
        } else {
            spec.fields
                .iter()
                .map(|f| {
                    format!(
                        "{} {} PATH '$.{}'",
                        self.quote_ident(f.output_name()),
                        self.json_table_type(&f.ty),
                        f.name
                    )
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        Ok(UnnestJoin::native(format!(
            "LEFT JOIN JSON_TABLE(CAST({} AS JSON), '$[*]' COLUMNS (__row_id FOR ORDINALITY, {columns})) as {} ON 1=1",
            spec.source, spec.alias
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
        if name == "__row_id" || !array_of_scalars {
            return Ok(format!("{alias}.{}", self.quote_ident(name)));
        }
        let value = format!("JSON_UNQUOTE({alias}.`value`)");
        Ok(match ty {
            SemanticType::String => format!("CONCAT({value}, '')"),
            SemanticType::Number(_) => format!("CAST({value} as double)"),
            SemanticType::Array(_) | SemanticType::Record(_) => format!("CAST({value} as JSON)"),
            _ => value,
        })
    }

    fn sample_table(&self, table: &str, sampling: Sampling) -> Result<String> {
        Ok(match sampling {
            Sampling::Rows(rows) => format!("(SELECT * FROM {table} ORDER BY rand() LIMIT {rows} )"),
            Sampling::Percent(percent) => format!(
                "(SELECT * FROM (SELECT ROW_NUMBER() OVER (ORDER BY rand()) as __row_number, __source_tbl.* from {table} as __source_tbl) as __rand_tbl where __row_number % FLOOR(100.0 / {percent}) = 1)"
            ),
        })
    }

    fn function_overrides(&self) -> &'static [OverloadDef] {
        OVERRIDES
    }
}

impl MySqlDialect {
    fn object(&self, fields: &[TurtleField]) -> String {
        let pairs = field_pairs(fields, |f| format!("{}, {}", self.string_literal(f.name), f.sql));
        format!("JSON_OBJECT({pairs})")
    }

    /// Column types of `JSON_TABLE`, which needs a length for strings.
    fn json_table_type(&self, ty: &SemanticType) -> String {
        match ty {
            SemanticType::String => "CHAR(255)".to_string(),
            SemanticType::Boolean => "INT".to_string(),
            ty => self.to_native_type(ty),
        }
    }
}

#[cfg(test)]
mod test {
    use dialectic_ir::ir::{FieldDescriptor, RelationKind};
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn test_cast() {
        assert_snapshot!(
            MySqlDialect.cast("x", &SemanticType::integer(), &SemanticType::String, false).unwrap(),
            @"CONCAT(x, '')"
        );
        assert_snapshot!(
            MySqlDialect.cast("x", &SemanticType::String, &SemanticType::integer(), false).unwrap(),
            @"CAST(x AS SIGNED)"
        );
        assert_snapshot!(
            MySqlDialect.cast("x", &SemanticType::String, &SemanticType::integer(), true).unwrap_err().reason,
            @"safe cast is not supported by dialect `mysql`"
        );
    }

    #[test]
    fn test_trunc() {
        assert_snapshot!(
            MySqlDialect.trunc_native("t", TimeKind::Timestamp, TimestampUnit::Week),
            @"TIMESTAMP(DATE_FORMAT(DATE_SUB(t, INTERVAL DAYOFWEEK(t) - 1 DAY), '%Y-%m-%d 00:00:00'))"
        );
        assert_snapshot!(
            MySqlDialect.trunc_native("d", TimeKind::Date, TimestampUnit::Month),
            @"DATE(TIMESTAMP(DATE_FORMAT(d, '%Y-%m-01 00:00:00')))"
        );
    }

    #[test]
    fn test_unnest() {
        let fields = [
            FieldDescriptor::new("sku", SemanticType::String, RelationKind::Struct { array_of_scalars: false }),
            FieldDescriptor::new("qty", SemanticType::integer(), RelationKind::Struct { array_of_scalars: false }),
        ];
        let join = MySqlDialect
            .unnest(&UnnestSpec {
                source: "base.items",
                alias: "items_0",
                fields: &fields,
                needs_distinct_key: true,
                array_of_scalars: false,
                in_nested_pipeline: false,
                bound: 100000,
            })
            .unwrap();
        assert_snapshot!(join.sql, @"LEFT JOIN JSON_TABLE(CAST(base.items AS JSON), '$[*]' COLUMNS (__row_id FOR ORDINALITY, `sku` CHAR(255) PATH '$.sku', `qty` BIGINT PATH '$.qty')) as items_0 ON 1=1");
        assert_snapshot!(
            MySqlDialect.unnested_field("tags_0", "base.tags", "tags", &SemanticType::float(), true).unwrap(),
            @"CAST(JSON_UNQUOTE(tags_0.`value`) as double)"
        );
    }

    #[test]
    fn test_turtle() {
        let ty = SemanticType::integer();
        let fields = [TurtleField {
            name: "n",
            sql: "COUNT(1)",
            ty: &ty,
        }];
        assert_snapshot!(
            MySqlDialect.aggregate_turtle(1, &fields, None, Some(3)).unwrap(),
            @"COALESCE(JSON_EXTRACT(CONCAT('[',GROUP_CONCAT(IF(group_set=1, JSON_OBJECT('n', COUNT(1)), null) SEPARATOR ','),']'),'$[0 to 2]'),JSON_ARRAY())"
        );
    }
}
