use dialectic::functions::{param, Catalog, Origin, OverloadDef, ReturnType};
use dialectic::ir::{SemanticType, TypeKind};
use dialectic::registry;
use insta::assert_snapshot;
use rstest::rstest;

const NUMBER: &[TypeKind] = &[TypeKind::Number];
const STRING: &[TypeKind] = &[TypeKind::String];

const LCASE: OverloadDef =
    OverloadDef::new("lower", &[param("value", STRING)], ReturnType::String, "LCASE({value})");
const SOUNDEX: OverloadDef = OverloadDef::new(
    "soundex",
    &[param("value", STRING)],
    ReturnType::String,
    "SOUNDEX({value})",
);
const UCASE: OverloadDef =
    OverloadDef::new("upper", &[param("value", STRING)], ReturnType::String, "UCASE({value})");

static BASE: &[OverloadDef] = &[
    OverloadDef::new("abs", &[param("value", NUMBER)], ReturnType::SameAs("value"), "ABS({value})"),
    OverloadDef::new("lower", &[param("value", STRING)], ReturnType::String, "LOWER({value})"),
];

#[rstest]
fn every_dialect_resolves_base_functions(
    #[values(
        "bigquery",
        "duckdb",
        "duckdb_wasm",
        "mysql",
        "postgres",
        "presto",
        "redshift",
        "snowflake",
        "trino"
    )]
    dialect: &str,
) {
    let entry = registry().unwrap().get(dialect).unwrap();
    let overload = entry
        .catalog
        .resolve("concat", &[SemanticType::String, SemanticType::String])
        .unwrap();
    assert_eq!(
        overload.return_type(&[SemanticType::String, SemanticType::String]),
        SemanticType::String
    );
}

#[test]
fn custom_catalog() {
    let catalog = Catalog::build(BASE, &[LCASE], &[SOUNDEX]).unwrap();

    let lower = catalog.resolve("lower", &[SemanticType::String]).unwrap();
    assert_eq!(lower.origin, Origin::Override);
    assert_snapshot!(
        lower.render("mysql", &["name".to_string()], &[], None).unwrap(),
        @"LCASE(name)"
    );

    let abs = catalog.resolve("abs", &[SemanticType::integer()]).unwrap();
    assert_eq!(abs.origin, Origin::Base);
    assert_eq!(abs.return_type(&[SemanticType::integer()]), SemanticType::integer());

    assert!(catalog.contains("soundex"));
    assert_eq!(catalog.iter().count(), 3);
}

#[test]
fn override_without_base() {
    let error = Catalog::build(BASE, &[UCASE], &[]).unwrap_err();
    assert_eq!(error.code, Some("E0201"));
    assert_snapshot!(
        error.reason,
        @"cannot build function catalog: `upper`: overrides a function that doesn't exist"
    );
}

#[test]
fn unknown_function() {
    let entry = registry().unwrap().get("postgres").unwrap();
    let error = entry.catalog.resolve("median", &[SemanticType::float()]).unwrap_err();
    assert_snapshot!(error.reason, @"function `median` not found");
}
