//! Backend dialects.
//!
//! Every backend implements [DialectHandler]. A handler is a stateless strategy
//! object: capability flags tell the shared algorithms which branch to take, and
//! the rendering methods produce the SQL fragments the shared algorithms are
//! assembled from. Per-query state never lives on a handler, so one handler is
//! shared by all compilations in a process.
//!
//! Backends from the same family share idioms through plain helper functions
//! (see `pg_family`), not through a common base implementation.

use core::fmt::Debug;
use std::any::{Any, TypeId};

use dialectic_ir::ir::{
    DeltaOp, ExtractUnit, FieldDescriptor, Sampling, SemanticType, SortDirection, TimestampUnit,
};
use serde::{Deserialize, Serialize};

use crate::functions::OverloadDef;
use crate::{Error, Result};

mod bigquery;
mod duckdb;
mod mysql;
mod pg_family;
mod postgres;
mod redshift;
mod snowflake;
mod trino;
pub(crate) mod types;

pub use bigquery::BigQueryDialect;
pub use duckdb::DuckDbDialect;
pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use redshift::RedshiftDialect;
pub use snowflake::SnowflakeDialect;
pub use trino::TrinoDialect;

/// SQL dialect.
///
/// The string form of a variant is the name a backend is registered under.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
    strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    BigQuery,
    #[default]
    DuckDb,
    /// DuckDB built without correlated `LATERAL` unnesting.
    #[strum(serialize = "duckdb_wasm")]
    #[serde(rename = "duckdb_wasm")]
    DuckDbWasm,
    MySql,
    Postgres,
    /// Trino's predecessor, which can't `LEFT JOIN` an `UNNEST`.
    Presto,
    Redshift,
    Snowflake,
    Trino,
}

impl Dialect {
    pub(crate) fn handler(&self) -> Box<dyn DialectHandler> {
        match self {
            Dialect::BigQuery => Box::new(BigQueryDialect),
            Dialect::DuckDb => Box::new(DuckDbDialect {
                lateral_unnest: true,
            }),
            Dialect::DuckDbWasm => Box::new(DuckDbDialect {
                lateral_unnest: false,
            }),
            Dialect::MySql => Box::new(MySqlDialect),
            Dialect::Postgres => Box::new(PostgresDialect),
            Dialect::Presto => Box::new(TrinoDialect {
                left_join_unnest: false,
            }),
            Dialect::Redshift => Box::new(RedshiftDialect),
            Dialect::Snowflake => Box::new(SnowflakeDialect),
            Dialect::Trino => Box::new(TrinoDialect {
                left_join_unnest: true,
            }),
        }
    }
}

/// The first day of a week as the backend's own truncation sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekStart {
    Monday,
    Sunday,
}

/// How a temporal value is represented at the point it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeKind {
    Date,
    /// An instant, in the backend's native timezone.
    Timestamp,
    /// Wall-clock time in the query's timezone, after conversion from an instant.
    Civil,
}

/// One field of a record constructed by a nested segment.
#[derive(Debug, Clone, Copy)]
pub struct TurtleField<'a> {
    pub name: &'a str,
    pub sql: &'a str,
    pub ty: &'a SemanticType,
}

/// Arguments of an unnest join.
#[derive(Debug, Clone, Copy)]
pub struct UnnestSpec<'a> {
    /// SQL of the array valued expression.
    pub source: &'a str,
    pub alias: &'a str,
    pub fields: &'a [FieldDescriptor],
    pub needs_distinct_key: bool,
    pub array_of_scalars: bool,
    pub in_nested_pipeline: bool,
    /// Upper bound on the array length, for backends that unnest through a
    /// joined number series.
    pub bound: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnnestJoin {
    pub sql: String,
    /// Set when the join emulates unnesting, describing the caveat.
    pub degraded: Option<String>,
}

impl UnnestJoin {
    pub fn native(sql: String) -> Self {
        UnnestJoin { sql, degraded: None }
    }
}

pub trait DialectHandler: Any + Debug + Send + Sync {
    fn dialect(&self) -> Dialect;

    fn name(&self) -> String {
        self.dialect().to_string()
    }

    /// Nested segments can be compiled.
    fn supports_nesting(&self) -> bool {
        true
    }

    /// Distinct sums are computed natively, without hashing the distinct key.
    fn supports_sum_distinct_function(&self) -> bool {
        false
    }

    /// A cast can produce null on failure instead of raising.
    fn supports_safe_cast(&self) -> bool {
        false
    }

    /// `/` between two integers truncates.
    fn division_is_integer(&self) -> bool {
        true
    }

    /// Intervals can be expressed in quarters. When not supported, quarters
    /// are rewritten as three months.
    fn supports_quarter_interval(&self) -> bool {
        true
    }

    /// Intervals can be expressed in weeks. When not supported, weeks are
    /// rewritten as seven days.
    fn supports_week_interval(&self) -> bool {
        true
    }

    /// Array columns can be unnested into joined rows.
    fn supports_unnest(&self) -> bool {
        true
    }

    /// Unnesting can be correlated with the row being unnested. When not
    /// supported, unnesting joins a bounded number series instead.
    fn supports_lateral_unnest(&self) -> bool {
        true
    }

    fn native_week_start(&self) -> WeekStart {
        WeekStart::Monday
    }

    fn native_timezone(&self) -> &'static str {
        "UTC"
    }

    /// Adding calendar units to an instant only works after conversion to
    /// civil time.
    fn calendar_delta_in_civil_time(&self) -> bool {
        false
    }

    fn default_number_type(&self) -> &'static str {
        "DOUBLE PRECISION"
    }

    fn default_decimal_type(&self) -> &'static str {
        "NUMERIC"
    }

    fn ident_quote(&self) -> char {
        '"'
    }

    fn quote_ident(&self, ident: &str) -> String {
        let quote = self.ident_quote();
        let escaped = ident.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    fn string_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn regex_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Nulls sort last regardless of direction, to agree across backends.
    fn nulls_last(&self) -> bool {
        false
    }

    fn order_term(&self, term: &str, direction: SortDirection) -> String {
        if self.nulls_last() {
            format!("{term} {direction} NULLS LAST")
        } else {
            format!("{term} {direction}")
        }
    }

    // Type bridge

    /// Native name of a semantic type. Total over all semantic types.
    fn to_native_type(&self, ty: &SemanticType) -> String;

    /// Semantic type of a scalar native type, named in lowercase without
    /// parameters. `None` for names with no semantic counterpart.
    fn native_scalar(&self, name: &str) -> Option<SemanticType>;

    /// Semantic type of raw native type syntax. Types which can't be mapped
    /// are passed through as [SemanticType::Native].
    fn from_native_type(&self, raw: &str) -> SemanticType {
        types::from_native(self, raw)
    }

    // Expressions

    fn now(&self) -> String {
        "CURRENT_TIMESTAMP".to_string()
    }

    fn date_literal(&self, value: &str) -> String {
        format!("DATE '{value}'")
    }

    /// A timestamp literal. The value is wall-clock time in `timezone` when
    /// given, and in the native timezone otherwise.
    fn timestamp_literal(&self, value: &str, timezone: Option<&str>) -> String;

    /// Converts an instant to wall-clock time in `timezone`.
    fn to_civil(&self, sql: &str, timezone: &str) -> String;

    /// Converts wall-clock time in `timezone` back to an instant.
    fn from_civil(&self, sql: &str, timezone: &str) -> String;

    /// Truncation with the backend's own week convention.
    fn trunc_native(&self, sql: &str, kind: TimeKind, unit: TimestampUnit) -> String;

    /// Extraction. `day_of_week` must number Monday as 1 and Sunday as 7
    /// regardless of the backend's own numbering or week start, so backends
    /// counting from Sunday or from 0 shift the native value.
    fn extract_native(&self, sql: &str, kind: TimeKind, unit: ExtractUnit) -> String;

    /// Adds or subtracts `amount` units. Quarters and weeks only reach this
    /// when the matching interval flag is set.
    fn delta_native(
        &self,
        sql: &str,
        kind: TimeKind,
        op: DeltaOp,
        amount: &str,
        unit: TimestampUnit,
    ) -> String;

    /// Number of whole units between two temporal values.
    fn measure(
        &self,
        from: (&str, TimeKind),
        to: (&str, TimeKind),
        unit: TimestampUnit,
    ) -> Result<String>;

    /// Converts a date to civil time in `timezone` at its midnight.
    fn civil_from_date(&self, sql: &str, _timezone: &str) -> String {
        format!("CAST({sql} AS TIMESTAMP)")
    }

    /// Type name used as the target of a cast.
    fn cast_type(&self, ty: &SemanticType) -> String {
        self.to_native_type(ty)
    }

    /// Casts between two distinct types.
    fn cast(&self, sql: &str, from: &SemanticType, to: &SemanticType, safe: bool) -> Result<String> {
        let _ = from;
        let target = self.cast_type(to);
        if !safe {
            return Ok(format!("CAST({sql} AS {target})"));
        }
        if !self.supports_safe_cast() {
            return Err(Error::unsupported(self.name(), "safe cast"));
        }
        Ok(format!("TRY_CAST({sql} AS {target})"))
    }

    fn regex_match(&self, expr: &str, regex: &str) -> String;

    /// Division that never truncates.
    fn divide(&self, left: &str, right: &str) -> String {
        if self.division_is_integer() {
            format!("{left}*1.0/{right}")
        } else {
            format!("{left}/{right}")
        }
    }

    /// `%` computes the remainder of a division.
    fn has_mod_operator(&self) -> bool {
        true
    }

    fn modulo(&self, left: &str, right: &str) -> String {
        if self.has_mod_operator() {
            format!("{left} % {right}")
        } else {
            format!("MOD({left},{right})")
        }
    }

    /// Wraps a single value into a one-element array.
    fn singleton_array(&self, sql: &str) -> String {
        format!("[{sql}]")
    }

    // Symmetric aggregates

    /// Large numeric hash of a distinct key.
    fn sum_distinct_hashed_key(&self, key: &str) -> Result<String> {
        let _ = key;
        Err(Error::unsupported(self.name(), "symmetric aggregates"))
    }

    /// Sum of `value` counting each distinct `key` once.
    fn symmetric_sum(&self, key: &str, value: &str) -> Result<String> {
        let hash = self.sum_distinct_hashed_key(key)?;
        let decimal = self.default_decimal_type();
        let number = self.default_number_type();
        let scaled = format!("ROUND(CAST(COALESCE({value}, 0) AS {decimal}), 9)");
        Ok(format!(
            "CAST((SUM(DISTINCT {scaled} + {hash}) - SUM(DISTINCT {hash})) AS {number})"
        ))
    }

    /// Average of `value` counting each distinct `key` once.
    fn symmetric_avg(&self, key: &str, value: &str) -> Result<String> {
        let sum = self.symmetric_sum(key, value)?;
        Ok(format!(
            "({sum})/NULLIF(COUNT(DISTINCT CASE WHEN {value} IS NOT NULL THEN {key} END),0)"
        ))
    }

    // Group sets

    /// A join producing one row per group set `0..=max`, in a column `group_set`.
    fn group_set_table(&self, max: usize) -> Result<String> {
        let _ = max;
        Err(Error::unsupported(self.name(), "nested segments"))
    }

    /// Array of records built from the rows of one group set.
    fn aggregate_turtle(
        &self,
        group_set: usize,
        fields: &[TurtleField],
        order_by: Option<&str>,
        limit: Option<u64>,
    ) -> Result<String> {
        let _ = (group_set, fields, order_by, limit);
        Err(Error::unsupported(self.name(), "nested segments"))
    }

    /// A single record built from the rows of one group set.
    fn any_value_turtle(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let _ = (group_set, fields);
        Err(Error::unsupported(self.name(), "nested segments"))
    }

    /// The non-null value of `sql` among the rows of one group set.
    fn any_value_last(&self, group_set: usize, sql: &str) -> Result<String> {
        let _ = (group_set, sql);
        Err(Error::unsupported(self.name(), "nested segments"))
    }

    /// A record of measures of one group set, which is a record of nulls when
    /// the group set has no rows.
    fn coalesce_measures_inline(&self, group_set: usize, fields: &[TurtleField]) -> Result<String> {
        let _ = (group_set, fields);
        Err(Error::unsupported(self.name(), "nested segments"))
    }

    // Unnesting

    fn unnest(&self, spec: &UnnestSpec) -> Result<UnnestJoin> {
        let _ = spec;
        Err(Error::unsupported(self.name(), "unnesting arrays"))
    }

    /// Reference to a field of an unnested element. `source` is the SQL of the
    /// unnested array.
    fn unnested_field(
        &self,
        alias: &str,
        source: &str,
        name: &str,
        ty: &SemanticType,
        array_of_scalars: bool,
    ) -> Result<String> {
        let _ = (alias, source, name, ty, array_of_scalars);
        Err(Error::unsupported(self.name(), "unnesting arrays"))
    }

    // Sampling

    /// A table expression reading a sample of `table`.
    fn sample_table(&self, table: &str, sampling: Sampling) -> Result<String>;

    // Functions

    /// Replacements for base functions, with identical signatures.
    fn function_overrides(&self) -> &'static [OverloadDef] {
        &[]
    }

    /// Functions only this backend has.
    fn dialect_functions(&self) -> &'static [OverloadDef] {
        &[]
    }
}

impl dyn DialectHandler {
    #[inline]
    pub fn is<T: DialectHandler + 'static>(&self) -> bool {
        TypeId::of::<T>() == self.type_id()
    }
}

/// Renders a list of record fields, for backends building records from
/// `name: value` pairs.
pub(crate) fn field_pairs<F>(fields: &[TurtleField], pair: F) -> String
where
    F: Fn(&TurtleField) -> String,
{
    fields.iter().map(pair).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use insta::assert_snapshot;
    use strum::{IntoEnumIterator, VariantNames};

    use super::*;

    #[test]
    fn test_dialect_names() {
        assert_eq!(Dialect::DuckDbWasm.to_string(), "duckdb_wasm");
        assert_eq!(Dialect::from_str("bigquery"), Ok(Dialect::BigQuery));
        assert!(Dialect::from_str("BigQuery").is_err());
        assert_snapshot!(Dialect::VARIANTS.join(", "), @"bigquery, duckdb, duckdb_wasm, mysql, postgres, presto, redshift, snowflake, trino");
    }

    #[test]
    fn test_handler_identity() {
        for dialect in Dialect::iter() {
            assert_eq!(dialect.handler().dialect(), dialect);
        }
        assert!(Dialect::Presto.handler().is::<TrinoDialect>());
        assert!(!Dialect::Presto.handler().is::<DuckDbDialect>());
    }

    #[test]
    fn test_quote_ident() {
        assert_snapshot!(Dialect::Postgres.handler().quote_ident(r#"a"b"#), @r#""a""b""#);
        assert_snapshot!(Dialect::MySql.handler().quote_ident("order"), @"`order`");
    }
}
