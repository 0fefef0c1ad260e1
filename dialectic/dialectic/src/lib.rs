//! # dialectic
//!
//! Generates SQL for many database engines from one dialect-agnostic query
//! representation.
//!
//! You probably want to start with the [compile] function.
//!
//! ```ascii
//!          Query IR  ◄──── json::to_query ────  IR JSON
//!             │
//!   (compile) │  registry: dialect handler + function catalog
//!             ▼
//!      CompiledQuery  ──── json::to_compiled ──►  JSON
//!     (SQL, output fields, diagnostics)
//! ```
//!
//! A query with nested segments is compiled through group-set multiplexing:
//! the source is scanned once, cross joined with a small table of grouping
//! levels, and each level is collapsed into array valued columns of its
//! parent in a `WITH` stage of its own.
//!
//! ## Common use-cases
//!
//! - Compile a query for a backend:
//!
//!   ```
//!   # fn main() -> Result<(), dialectic::ErrorMessages> {
//!   use dialectic::ir::*;
//!
//!   let amount = Expr::field(
//!       FieldRef::new("orders", RelationKind::Table, "amount"),
//!       SemanticType::float(),
//!   );
//!   let root = Segment::new("totals").measure(
//!       "total",
//!       Expr::aggregate(AggregateFunc::Sum, Some(amount), SemanticType::float()),
//!   );
//!   let query = Query::new("orders", "orders", root);
//!
//!   let options = dialectic::Options::default()
//!       .with_dialect("postgres")
//!       .no_format()
//!       .no_signature();
//!   let compiled = dialectic::compile(&query, &options)?;
//!   assert_eq!(compiled.sql, "SELECT SUM(orders.amount) AS total FROM orders AS orders");
//!   # Ok(())
//!   # }
//!   ```
//!
//! - Compile from the command line:
//!
//!   ```sh
//!   $ dialectic compile query.json --dialect snowflake
//!   ```
//!
//! ## Feature flags
//!
//! * `cli`: enables the `dialectic` CLI binary. This is enabled by default.
//! * `test-dbs`: runs generated SQL against an in-process DuckDB as part of the
//!   crate's tests. This significantly increases compile times so is not
//!   enabled by default.

#![forbid(unsafe_code)]
// Our error type contains several strings and an enum; we're not performance
// sensitive enough for the size to matter.
#![allow(clippy::result_large_err)]

use std::sync::OnceLock;

use semver::Version;
use serde::{Deserialize, Serialize};

pub use dialect::Dialect;
pub use dialectic_ir::ir;
pub use dialectic_ir::{Error, Errors, MessageKind, Reason, WithErrorInfo};
pub use error_message::{ErrorMessage, ErrorMessages};
pub use registry::{build_registry, registry, Registry};
pub use sql::CompiledQuery;

pub mod dialect;
mod error_message;
pub mod functions;
pub mod registry;
mod sql;
mod utils;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Get the version of the compiler.
pub fn compiler_version() -> &'static Version {
    static COMPILER_VERSION: OnceLock<Version> = OnceLock::new();
    COMPILER_VERSION.get_or_init(|| {
        Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
    })
}

/// Compile a query to SQL of the dialect selected in `options`.
///
/// Non-fatal diagnostics, such as warnings about emulated unnesting, are
/// returned in [CompiledQuery::diagnostics].
pub fn compile(query: &ir::Query, options: &Options) -> Result<CompiledQuery, ErrorMessages> {
    sql::compile(query, options).map_err(ErrorMessages::from)
}

/// Render a single expression, outside of any query.
///
/// Field references are rendered as `relation.field`; unnested fields can't
/// be rendered without the unnest join which provides them.
pub fn compile_expr(expr: &ir::Expr, options: &Options) -> Result<String, ErrorMessages> {
    sql::compile_expr(expr, options).map_err(ErrorMessages::from)
}

/// Lower a temporal filter clause to a boolean SQL expression over `sql`,
/// which has type `ty`.
pub fn compile_temporal_filter(
    sql: &str,
    ty: &ir::SemanticType,
    filter: &ir::TemporalFilter,
    options: &Options,
) -> Result<String, ErrorMessages> {
    sql::compile_temporal_filter(sql, ty, filter, options).map_err(ErrorMessages::from)
}

/// Compilation options for SQL backend of the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    /// Pass generated SQL string trough a formatter that splits it
    /// into multiple lines and prettifies indentation and spacing.
    ///
    /// Defaults to true.
    pub format: bool,

    /// Name of the dialect to compile to, as registered.
    ///
    /// Defaults to `duckdb`.
    pub dialect: String,

    /// Emits the compiler signature as a comment before generated SQL
    ///
    /// Defaults to true.
    pub signature_comment: bool,

    /// Upper bound on array lengths for backends which unnest by joining a
    /// number series.
    ///
    /// Defaults to 100000.
    pub unnest_bound: u64,

    /// Timezone in which calendar units are computed, for standalone
    /// expressions and filters. A query's own timezone takes precedence.
    ///
    /// Defaults to the dialect's native timezone.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            format: true,
            dialect: Dialect::default().to_string(),
            signature_comment: true,
            unnest_bound: 100_000,
            timezone: None,
        }
    }
}

impl Options {
    pub fn with_format(mut self, format: bool) -> Self {
        self.format = format;
        self
    }

    pub fn no_format(self) -> Self {
        self.with_format(false)
    }

    pub fn with_dialect<S: ToString>(mut self, dialect: S) -> Self {
        self.dialect = dialect.to_string();
        self
    }

    pub fn with_signature_comment(mut self, signature_comment: bool) -> Self {
        self.signature_comment = signature_comment;
        self
    }

    pub fn no_signature(self) -> Self {
        self.with_signature_comment(false)
    }

    pub fn with_unnest_bound(mut self, unnest_bound: u64) -> Self {
        self.unnest_bound = unnest_bound;
        self
    }

    pub fn with_timezone<S: ToString>(mut self, timezone: S) -> Self {
        self.timezone = Some(timezone.to_string());
        self
    }
}

pub mod json {
    use super::*;

    /// JSON serialization
    pub fn from_query(query: &ir::Query) -> Result<String, ErrorMessages> {
        serde_json::to_string(query).map_err(convert_json_err)
    }

    /// JSON deserialization
    pub fn to_query(json: &str) -> Result<ir::Query, ErrorMessages> {
        serde_json::from_str(json).map_err(convert_json_err)
    }

    /// JSON serialization of a compilation result
    pub fn to_compiled(compiled: &CompiledQuery) -> Result<String, ErrorMessages> {
        serde_json::to_string(compiled).map_err(convert_json_err)
    }

    fn convert_json_err(err: serde_json::Error) -> ErrorMessages {
        ErrorMessages::from(Error::new_simple(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;

    #[test]
    fn test_options_builders() {
        let options = Options::default()
            .with_dialect("bigquery")
            .no_format()
            .no_signature()
            .with_unnest_bound(10)
            .with_timezone("Europe/Paris");
        assert_eq!(
            options,
            Options {
                format: false,
                dialect: "bigquery".to_string(),
                signature_comment: false,
                unnest_bound: 10,
                timezone: Some("Europe/Paris".to_string()),
            }
        );
        assert_eq!(Options::default().dialect, "duckdb");
    }

    #[test]
    fn test_unknown_dialect() {
        let query = ir::Query::new("t", "t", ir::Segment::new("q"));
        let error = compile(&query, &Options::default().with_dialect("oracle")).unwrap_err();
        assert_snapshot!(error.to_string(), @r"
        [E0301] Error: unknown dialect `oracle`
        ↳ Hint: available dialects are bigquery, duckdb, duckdb_wasm, mysql, postgres, presto, redshift, snowflake, trino
        ");
    }

    #[test]
    fn test_json_roundtrip() {
        let query = ir::Query::new("orders", "o", ir::Segment::new("q"));
        let json = json::from_query(&query).unwrap();
        assert_eq!(json::to_query(&json).unwrap(), query);

        let error = json::to_query("{").unwrap_err();
        assert_eq!(error.inner.len(), 1);
    }

    #[test]
    fn test_compiler_version() {
        assert_eq!(compiler_version().to_string(), env!("CARGO_PKG_VERSION"));
    }
}
