use dialectic_ir::ir::{DeltaOp, ExtractUnit, NumberKind, Sampling, SemanticType, TimestampUnit};

use super::{
    field_pairs, pg_family, Dialect, DialectHandler, TimeKind, TurtleField, UnnestJoin, UnnestSpec,
};
use crate::functions::{param, OverloadDef, ReturnType, NUMBER, STRING};
use crate::Result;

#[derive(Debug)]
pub struct PostgresDialect;

static OVERRIDES: &[OverloadDef] = &[
    // ROUND and TRUNC with a precision are only defined on NUMERIC
    OverloadDef::new(
        "round",
        &[param("value", NUMBER), param("precision", NUMBER)],
        ReturnType::SameAs("value"),
        "ROUND(CAST({value} AS NUMERIC), {precision})",
    ),
    OverloadDef::new(
        "trunc",
        &[param("value", NUMBER), param("precision", NUMBER)],
        ReturnType::SameAs("value"),
        "TRUNC(CAST({value} AS NUMERIC), {precision})",
    ),
    OverloadDef::new(
        "regexp_extract",
        &[param("value", STRING), param("pattern", STRING)],
        ReturnType::String,
        "SUBSTRING({value} FROM {pattern})",
    ),
];

impl DialectHandler for PostgresDialect {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn supports_quarter_interval(&self) -> bool {
        false
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
            SemanticType::Array(inner) if !inner.is_record() => {
                format!("{}[]", self.to_native_type(inner))
            }
            // records travel as JSON
            SemanticType::Json | SemanticType::Array(_) | SemanticType::Record(_) => {
                "JSONB".to_string()
            }
        }
    }

    fn native_scalar(&self, name: &str) -> Option<SemanticType> {
        match name {
            "json" | "jsonb" => Some(SemanticType::Json),
            "oid" | "xid" | "inet" | "regtype" | "bytea" | "interval" => Some(SemanticType::String),
            _ => pg_family::native_scalar(name),
        }
    }

    fn now(&self) -> String {
        "LOCALTIMESTAMP".to_string()
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
        // EXTRACT returns a double before version 14
        format!("({}::integer)", pg_family::extract(sql, unit))
    }

    fn delta_native(
        &self,
        sql: &str,
        kind: TimeKind,
        op: DeltaOp,
        amount: &str,
        unit: TimestampUnit,
    ) -> String {
        let param = match unit {
            TimestampUnit::Second => "secs",
            TimestampUnit::Minute => "mins",
            TimestampUnit::Hour => "hours",
            TimestampUnit::Day => "days",
            TimestampUnit::Week => "weeks",
            TimestampUnit::Month | TimestampUnit::Quarter => "months",
            TimestampUnit::Year => "years",
        };
        let shifted = format!("({sql} {op} make_interval({param}=>({amount})::integer))");
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
        format!("{expr} ~ {regex}")
    }

    fn singleton_array(&self, sql: &str) -> String {
        format!("JSONB_BUILD_ARRAY({sql})")
    }

    fn sum_distinct_hashed_key(&self, key: &str) -> Result<String> {
        Ok(format!(
            "('x' || MD5({key}::varchar))::bit(64)::bigint::DECIMAL(65,0)  *18446744073709551616 + ('x' || SUBSTR(MD5({key}::varchar),17))::bit(64)::bigint::DECIMAL(65,0)"
        ))
    }

    fn symmetric_sum(&self, key: &str, value: &str) -> Result<String> {
        let hash = self.sum_distinct_hashed_key(key)?;
        let rounded = format!("ROUND(CAST(COALESCE({value}, 0) AS NUMERIC), 9)");
        Ok(format!(
            "CAST(SUM(DISTINCT {rounded} + {hash}) - SUM(DISTINCT {hash}) AS DOUBLE PRECISION)"
        ))
    }

    fn symmetric_avg(&self, key: &str, value: &str) -> Result<String> {
        let sum = self.symmetric_sum(key, value)?;
        Ok(format!(
            "({sum})/NULLIF(COUNT(DISTINCT CASE WHEN {value} IS NOT NULL THEN {key} END), 0)"
        ))
    }

    fn group_set_table(&self, max: usize) -> Result<String> {
        Ok(format!("CROSS JOIN GENERATE_SERIES(0,{max},1) as group_set"))
    }

    fn aggregate_turtle(
        &self,
        group_set: usize,
        fields: &[TurtleField],
        order_by: Option<&str>,
        limit: Option<u64>,
    ) -> Result<String> {
        let fields = self.select_fields(fields);
        let order_by = order_by.map(|o| format!(" ORDER BY {o}")).unwrap_or_default();
        let rows = format!(
            "ARRAY_AGG((SELECT TO_JSONB(__x) FROM (SELECT {fields}) as __x){order_by}) FILTER (WHERE group_set={group_set})"
        );
        let rows = match limit {
            Some(limit) => format!("({rows})[1:{limit}]"),
            None => rows,
        };
        Ok(format!("COALESCE(TO_JSONB(({rows})),'[]'::JSONB)"))
    }

    fn any_value_turtle(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let fields = self.select_fields(fields);
        Ok(format!(
            "(ARRAY_AGG((SELECT TO_JSONB(__x) FROM (SELECT {fields}) as __x)) FILTER (WHERE group_set={group_set}))[1]"
        ))
    }

    fn any_value_last(&self, group_set: usize, sql: &str) -> Result<String> {
        Ok(format!(
            "(ARRAY_AGG({sql}) FILTER (WHERE group_set={group_set} AND {sql} IS NOT NULL))[1]"
        ))
    }

    fn coalesce_measures_inline(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let fields = self.select_fields(fields);
        Ok(format!(
            "TO_JSONB((ARRAY_AGG((SELECT __x FROM (SELECT {fields}) as __x)) FILTER (WHERE group_set={group_set}))[1])"
        ))
    }

    fn unnest(&self, spec: &UnnestSpec) -> Result<UnnestJoin> {
        let UnnestSpec { source, alias, .. } = *spec;
        let sql = match (spec.array_of_scalars, spec.needs_distinct_key) {
            (true, true) => format!(
                "LEFT JOIN UNNEST(ARRAY((SELECT jsonb_build_object('__row_id', row_number() over (), 'value', v) FROM JSONB_ARRAY_ELEMENTS(TO_JSONB({source})) as v))) as {alias} ON true"
            ),
            (true, false) => format!(
                "LEFT JOIN UNNEST(ARRAY((SELECT jsonb_build_object('value', v) FROM JSONB_ARRAY_ELEMENTS(TO_JSONB({source})) as v))) as {alias} ON true"
            ),
            (false, true) => format!(
                "LEFT JOIN UNNEST(ARRAY((SELECT jsonb_build_object('__row_id', row_number() over())|| __xx::jsonb as b FROM  JSONB_ARRAY_ELEMENTS({source}) __xx ))) as {alias} ON true"
            ),
            (false, false) => {
                format!("LEFT JOIN JSONB_ARRAY_ELEMENTS({source}) as {alias} ON true")
            }
        };
        Ok(UnnestJoin::native(sql))
    }

    fn unnested_field(
        &self,
        alias: &str,
        _source: &str,
        name: &str,
        ty: &SemanticType,
        array_of_scalars: bool,
    ) -> Result<String> {
        if name == "__row_id" {
            return Ok(format!("({alias}->>'__row_id')"));
        }
        let key = if array_of_scalars { "value" } else { name };
        let text = format!("JSONB_EXTRACT_PATH_TEXT({alias},'{key}')");
        Ok(match ty {
            SemanticType::String => text,
            SemanticType::Number(_) => format!("{text}::double precision"),
            SemanticType::Boolean => format!("{text}::boolean"),
            SemanticType::Date => format!("{text}::date"),
            SemanticType::Timestamp => format!("{text}::timestamp"),
            SemanticType::Json
            | SemanticType::Native(_)
            | SemanticType::Array(_)
            | SemanticType::Record(_) => format!("JSONB_EXTRACT_PATH({alias},'{key}')"),
        })
    }

    fn sample_table(&self, table: &str, sampling: Sampling) -> Result<String> {
        Ok(match sampling {
            Sampling::Rows(rows) => format!("(SELECT * FROM {table} TABLESAMPLE SYSTEM_ROWS({rows}))"),
            Sampling::Percent(percent) => {
                format!("(SELECT * FROM {table} TABLESAMPLE SYSTEM ({percent}))")
            }
        })
    }

    fn function_overrides(&self) -> &'static [OverloadDef] {
        OVERRIDES
    }
}

impl PostgresDialect {
    /// Fields as a select list, numbers cast so that JSON conversion doesn't
    /// depend on the numeric type of each expression.
    fn select_fields(&self, fields: &[TurtleField]) -> String {
        field_pairs(fields, |f| {
            let name = self.quote_ident(f.name);
            if f.ty.is_number() {
                format!("{}::DOUBLE PRECISION as {name}", f.sql)
            } else {
                format!("{} as {name}", f.sql)
            }
        })
    }
}
