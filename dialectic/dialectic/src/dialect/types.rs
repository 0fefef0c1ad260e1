//! Mapping of native type syntax to semantic types, shared by all dialects.

use dialectic_ir::ir::{RecordField, SemanticType};
use dialectic_ir::native_type::{parse_native_type, NativeType};

use super::DialectHandler;

/// Maps raw native type syntax to a semantic type. Never fails: anything that
/// doesn't parse, or has no mapping, becomes [SemanticType::Native] holding
/// the raw text.
pub(crate) fn from_native<D: DialectHandler + ?Sized>(dialect: &D, raw: &str) -> SemanticType {
    match parse_native_type(raw) {
        Ok(parsed) => {
            map_native(dialect, &parsed).unwrap_or_else(|| SemanticType::Native(raw.to_string()))
        }
        Err(err) => {
            log::trace!("passing through native type `{raw}`: {:?}", err.reason);
            SemanticType::Native(raw.to_string())
        }
    }
}

fn map_native<D: DialectHandler + ?Sized>(dialect: &D, ty: &NativeType) -> Option<SemanticType> {
    Some(match ty {
        NativeType::Named { name, .. } => dialect.native_scalar(name)?,
        NativeType::Array(inner) => {
            let inner = map_native(dialect, inner).unwrap_or_else(|| native(inner));
            SemanticType::Array(Box::new(inner))
        }
        NativeType::Struct(fields) => SemanticType::Record(
            fields
                .iter()
                .map(|(name, ty)| RecordField {
                    name: name.clone(),
                    ty: map_native(dialect, ty).unwrap_or_else(|| native(ty)),
                })
                .collect(),
        ),
    })
}

fn native(ty: &NativeType) -> SemanticType {
    SemanticType::Native(ty.to_string())
}

/// Renders `STRUCT(a INTEGER, b VARCHAR)` style record types.
pub(crate) fn struct_type<D: DialectHandler + ?Sized>(
    dialect: &D,
    keyword: &str,
    fields: &[RecordField],
) -> String {
    let fields = fields
        .iter()
        .map(|f| format!("{} {}", dialect.quote_ident(&f.name), dialect.to_native_type(&f.ty)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{keyword}({fields})")
}

#[cfg(test)]
mod test {
    use insta::assert_debug_snapshot;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn test_from_native_nested() {
        let duckdb = Dialect::DuckDb.handler();
        assert_debug_snapshot!(duckdb.from_native_type("STRUCT(id BIGINT, tags VARCHAR[])[]"), @r#"
        Array(
            Record(
                [
                    RecordField {
                        name: "id",
                        ty: Number(
                            Integer,
                        ),
                    },
                    RecordField {
                        name: "tags",
                        ty: Array(
                            String,
                        ),
                    },
                ],
            ),
        )
        "#);
    }

    #[test]
    fn test_from_native_parameters() {
        let postgres = Dialect::Postgres.handler();
        assert_eq!(postgres.from_native_type("DECIMAL(5,2)"), SemanticType::float());
        assert_eq!(
            postgres.from_native_type("TIMESTAMP WITH TIME ZONE"),
            SemanticType::Timestamp
        );
    }

    #[test]
    fn test_from_native_passthrough() {
        for dialect in Dialect::iter() {
            let handler = dialect.handler();
            for raw in ["GEOGRAPHY", "", "MAP(VARCHAR, INTEGER)", "))", "hyperloglog[]"] {
                let ty = handler.from_native_type(raw);
                assert!(
                    matches!(&ty, SemanticType::Native(_) | SemanticType::Array(_)),
                    "{dialect}: {raw} -> {ty:?}"
                );
            }
        }
    }
}
