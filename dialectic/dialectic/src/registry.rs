//! The dialect registry: every backend's handler with its merged function
//! catalog, built once per process.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;

use itertools::Itertools;
use strum::{IntoEnumIterator, VariantNames};

use crate::dialect::{Dialect, DialectHandler};
use crate::functions::{base, check_dialect_functions, Catalog};
use crate::{Error, Result, WithErrorInfo};

/// A registered backend.
#[derive(Debug)]
pub struct Entry {
    pub handler: Box<dyn DialectHandler>,
    pub catalog: Catalog,
}

#[derive(Debug)]
pub struct Registry {
    entries: HashMap<Dialect, Entry>,
}

/// Builds handlers and catalogs of all dialects. Fails on the first catalog
/// which can't be merged, or when two dialects declare the same dialect
/// function with different return types.
pub fn build_registry() -> Result<Registry> {
    let mut entries = HashMap::new();
    for dialect in Dialect::iter() {
        let handler = dialect.handler();
        let catalog = Catalog::build(
            base::FUNCTIONS,
            handler.function_overrides(),
            handler.dialect_functions(),
        )
        .push_hint(format!("while building the catalog of `{dialect}`"))?;
        log::debug!("registered dialect {dialect}");
        entries.insert(dialect, Entry { handler, catalog });
    }
    check_dialect_functions(entries.iter().map(|(dialect, entry)| (*dialect, &entry.catalog)))?;
    Ok(Registry { entries })
}

/// The process-wide registry. Built on first use; a build failure is
/// returned by every call.
pub fn registry() -> Result<&'static Registry> {
    static REGISTRY: OnceLock<Result<Registry>> = OnceLock::new();
    REGISTRY
        .get_or_init(build_registry)
        .as_ref()
        .map_err(Clone::clone)
}

impl Registry {
    /// Looks up a backend by its exact name.
    pub fn get(&self, name: &str) -> Result<&Entry> {
        let dialect = Dialect::from_str(name).map_err(|_| {
            Error::unknown_dialect(name).push_hint(format!(
                "available dialects are {}",
                Dialect::VARIANTS.iter().join(", ")
            ))
        })?;
        self.entry(dialect)
    }

    pub fn entry(&self, dialect: Dialect) -> Result<&Entry> {
        self.entries
            .get(&dialect)
            .ok_or_else(|| Error::new_assert(format!("dialect `{dialect}` isn't registered")))
    }

    /// Names of all registered backends, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().map(|d| d.to_string()).sorted().collect()
    }
}

#[cfg(test)]
mod test {
    use dialectic_ir::ir::{RecordField, SemanticType};
    use insta::assert_snapshot;

    use super::*;

    fn every_type_shape() -> Vec<SemanticType> {
        let scalars = vec![
            SemanticType::String,
            SemanticType::integer(),
            SemanticType::float(),
            SemanticType::Boolean,
            SemanticType::Date,
            SemanticType::Timestamp,
            SemanticType::Json,
            SemanticType::Native("geography".to_string()),
        ];
        let record = SemanticType::Record(
            scalars
                .iter()
                .enumerate()
                .map(|(i, ty)| RecordField {
                    name: format!("f{i}"),
                    ty: ty.clone(),
                })
                .collect(),
        );
        let mut types = scalars.clone();
        types.extend(scalars.into_iter().map(|ty| SemanticType::Array(Box::new(ty))));
        types.push(SemanticType::Array(Box::new(record.clone())));
        types.push(record);
        types
    }

    #[test]
    fn test_all_catalogs_build() {
        let registry = build_registry().unwrap();
        assert_eq!(registry.names().len(), Dialect::VARIANTS.len());
        for name in registry.names() {
            let entry = registry.get(&name).unwrap();
            assert_eq!(entry.handler.name(), name);
            assert!(entry.catalog.contains("concat"));
        }
    }

    #[test]
    fn test_unknown_dialect() {
        let error = registry().unwrap().get("oracle").unwrap_err();
        assert_eq!(error.code, Some("E0301"));
        assert_snapshot!(error.reason, @"unknown dialect `oracle`");
        assert_snapshot!(error.hints[0], @"available dialects are bigquery, duckdb, duckdb_wasm, mysql, postgres, presto, redshift, snowflake, trino");
    }

    #[test]
    fn test_dialect_only_functions() {
        let registry = registry().unwrap();
        assert!(registry.get("duckdb").unwrap().catalog.contains("median"));
        assert!(!registry.get("postgres").unwrap().catalog.contains("median"));
    }

    #[test]
    fn test_native_types_are_total() {
        let registry = registry().unwrap();
        for name in registry.names() {
            let handler = &registry.get(&name).unwrap().handler;
            for ty in every_type_shape() {
                let native = handler.to_native_type(&ty);
                assert!(!native.trim().is_empty(), "{name} has no native type for {ty:?}");
                assert_eq!(handler.to_native_type(&ty), native);
            }
            for raw in ["", "geography", "STRUCT(", "x y z", "ARRAY<>"] {
                assert!(
                    matches!(handler.from_native_type(raw), SemanticType::Native(n) if n == raw),
                    "{name} mapped `{raw}`"
                );
            }
        }
    }
}
