//! A small grammar for backend type names, so that nested types like
//! `ARRAY<STRUCT<a INT64>>`, `STRUCT(a INTEGER, b VARCHAR)[]` or
//! `array(row(a integer))` can be mapped structurally.

use chumsky::prelude::*;
use itertools::Itertools;

use crate::error::{Error, Reason};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeType {
    /// A scalar type. The name is lowercased with single spaces, so
    /// `TIMESTAMP  WITH TIME ZONE` becomes `timestamp with time zone`.
    Named { name: String, params: Vec<String> },
    Array(Box<NativeType>),
    Struct(Vec<(String, NativeType)>),
}

pub fn parse_native_type(source: &str) -> Result<NativeType, Error> {
    parser().parse(source).map_err(|errors| {
        let position = errors.first().map(|e| e.span().start).unwrap_or_default();
        Error::new(Reason::Unexpected {
            found: format!("type syntax in `{source}` at position {position}"),
        })
    })
}

impl std::fmt::Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeType::Named { name, params } if params.is_empty() => f.write_str(name),
            NativeType::Named { name, params } => write!(f, "{name}({})", params.join(",")),
            NativeType::Array(inner) => write!(f, "{inner}[]"),
            NativeType::Struct(fields) => write!(
                f,
                "struct({})",
                fields
                    .iter()
                    .map(|(name, ty)| format!("{name} {ty}"))
                    .join(", ")
            ),
        }
    }
}

fn keyword(kw: &'static str) -> impl Parser<char, (), Error = Simple<char>> + Clone {
    text::ident().try_map(move |ident: String, span| {
        if ident.eq_ignore_ascii_case(kw) {
            Ok(())
        } else {
            Err(Simple::custom(span, format!("expected `{kw}`")))
        }
    })
}

fn parser() -> impl Parser<char, NativeType, Error = Simple<char>> {
    let ty = recursive(|ty| {
        let quoted = just('"')
            .ignore_then(none_of("\"").repeated().collect::<String>())
            .then_ignore(just('"'))
            .or(just('`')
                .ignore_then(none_of("`").repeated().collect::<String>())
                .then_ignore(just('`')));
        let field = text::ident()
            .or(quoted)
            .padded()
            .then(ty.clone().padded());
        let fields = field.separated_by(just(',')).allow_trailing();

        let angle_struct = keyword("struct")
            .then_ignore(text::whitespace())
            .ignore_then(fields.clone().delimited_by(just('<'), just('>')))
            .map(NativeType::Struct);
        let paren_struct = keyword("struct")
            .or(keyword("row"))
            .then_ignore(text::whitespace())
            .ignore_then(fields.delimited_by(just('('), just(')')))
            .map(NativeType::Struct);
        let angle_array = keyword("array")
            .then_ignore(text::whitespace())
            .ignore_then(ty.clone().padded().delimited_by(just('<'), just('>')))
            .map(|inner| NativeType::Array(Box::new(inner)));
        let paren_array = keyword("array")
            .then_ignore(text::whitespace())
            .ignore_then(ty.clone().padded().delimited_by(just('('), just(')')))
            .map(|inner| NativeType::Array(Box::new(inner)));

        let params = none_of("()")
            .repeated()
            .collect::<String>()
            .delimited_by(just('('), just(')'))
            .map(|params| {
                params
                    .split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
            });
        let words = text::ident()
            .then(
                text::whitespace()
                    .at_least(1)
                    .ignore_then(text::ident())
                    .repeated(),
            )
            .map(|(first, rest): (String, Vec<String>)| {
                std::iter::once(first)
                    .chain(rest)
                    .map(|w| w.to_lowercase())
                    .join(" ")
            });
        let named = words
            .then(text::whitespace().ignore_then(params).or_not())
            .map(|(name, params)| NativeType::Named {
                name,
                params: params.unwrap_or_default(),
            });

        angle_struct
            .or(paren_struct)
            .or(angle_array)
            .or(paren_array)
            .or(named)
            .then(text::whitespace().ignore_then(just("[]")).repeated())
            .foldl(|inner, _| NativeType::Array(Box::new(inner)))
    });

    ty.padded().then_ignore(end())
}

#[cfg(test)]
mod test {
    use super::*;

    fn named(name: &str, params: &[&str]) -> NativeType {
        NativeType::Named {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn scalars() {
        assert_eq!(parse_native_type("INTEGER").unwrap(), named("integer", &[]));
        assert_eq!(
            parse_native_type("DECIMAL(5,2)").unwrap(),
            named("decimal", &["5", "2"])
        );
        assert_eq!(
            parse_native_type(" TIMESTAMP WITH TIME ZONE ").unwrap(),
            named("timestamp with time zone", &[])
        );
        assert_eq!(
            parse_native_type("character varying(255)").unwrap(),
            named("character varying", &["255"])
        );
    }

    #[test]
    fn nested() {
        assert_eq!(
            parse_native_type("STRUCT(a INTEGER, \"b c\" VARCHAR[])").unwrap(),
            NativeType::Struct(vec![
                ("a".to_string(), named("integer", &[])),
                (
                    "b c".to_string(),
                    NativeType::Array(Box::new(named("varchar", &[])))
                ),
            ])
        );
        assert_eq!(
            parse_native_type("ARRAY<STRUCT<x INT64>>").unwrap(),
            NativeType::Array(Box::new(NativeType::Struct(vec![(
                "x".to_string(),
                named("int64", &[])
            )])))
        );
        assert_eq!(
            parse_native_type("array(row(a integer))").unwrap(),
            NativeType::Array(Box::new(NativeType::Struct(vec![(
                "a".to_string(),
                named("integer", &[])
            )])))
        );
        assert_eq!(
            parse_native_type("INTEGER[][]").unwrap(),
            NativeType::Array(Box::new(NativeType::Array(Box::new(named(
                "integer",
                &[]
            )))))
        );
    }

    #[test]
    fn unparseable() {
        assert!(parse_native_type("MAP(VARCHAR, STRUCT(a INT))").is_err());
        assert!(parse_native_type("").is_err());
    }

    #[test]
    fn display() {
        let ty = parse_native_type("STRUCT(a DECIMAL(5,2))[]").unwrap();
        assert_eq!(ty.to_string(), "struct(a decimal(5,2))[]");
    }
}
