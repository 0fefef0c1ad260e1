//! Portable functions, with SQL that most backends accept as is.

use super::ReturnType::*;
use super::{param, variadic, OverloadDef, ANY, NUMBER, SCALAR, STRING};

const VALUE: &[super::ParamDef] = &[param("value", NUMBER)];
const TEXT: &[super::ParamDef] = &[param("value", STRING)];

pub(crate) static FUNCTIONS: &[OverloadDef] = &[
    // numbers
    OverloadDef::new("abs", VALUE, SameAs("value"), "ABS({value})"),
    OverloadDef::new("ceil", VALUE, SameAs("value"), "CEIL({value})"),
    OverloadDef::new("floor", VALUE, SameAs("value"), "FLOOR({value})"),
    OverloadDef::new("sqrt", VALUE, Float, "SQRT({value})"),
    OverloadDef::new("ln", VALUE, Float, "LN({value})"),
    OverloadDef::new("exp", VALUE, Float, "EXP({value})"),
    OverloadDef::new("sign", VALUE, SameAs("value"), "SIGN({value})"),
    OverloadDef::new("round", VALUE, SameAs("value"), "ROUND({value})"),
    OverloadDef::new(
        "round",
        &[param("value", NUMBER), param("precision", NUMBER)],
        SameAs("value"),
        "ROUND({value}, {precision})",
    ),
    OverloadDef::new("trunc", VALUE, SameAs("value"), "TRUNC({value})"),
    OverloadDef::new(
        "trunc",
        &[param("value", NUMBER), param("precision", NUMBER)],
        SameAs("value"),
        "TRUNC({value}, {precision})",
    ),
    OverloadDef::new(
        "pow",
        &[param("base", NUMBER), param("exponent", NUMBER)],
        Float,
        "POWER({base}, {exponent})",
    ),
    OverloadDef::new(
        "log",
        &[param("base", NUMBER), param("value", NUMBER)],
        Float,
        "LOG({base}, {value})",
    ),
    OverloadDef::new(
        "div",
        &[param("dividend", NUMBER), param("divisor", NUMBER)],
        Integer,
        "DIV({dividend}, {divisor})",
    ),
    OverloadDef::new("pi", &[], Float, "PI()"),
    OverloadDef::new("rand", &[], Float, "RANDOM()"),
    OverloadDef::new(
        "is_inf",
        VALUE,
        Boolean,
        "COALESCE({value} IN (CAST('Infinity' AS DOUBLE PRECISION), CAST('-Infinity' AS DOUBLE PRECISION)), false)",
    ),
    OverloadDef::new("greatest", &[variadic("values", SCALAR)], SameAs("values"), "GREATEST({...values})"),
    OverloadDef::new("least", &[variadic("values", SCALAR)], SameAs("values"), "LEAST({...values})"),
    // strings
    OverloadDef::new("lower", TEXT, String, "LOWER({value})"),
    OverloadDef::new("upper", TEXT, String, "UPPER({value})"),
    OverloadDef::new("length", TEXT, Integer, "LENGTH({value})"),
    OverloadDef::new("byte_length", TEXT, Integer, "OCTET_LENGTH({value})"),
    OverloadDef::new("concat", &[variadic("values", ANY)], String, "CONCAT({...values})"),
    OverloadDef::new(
        "substr",
        &[param("value", STRING), param("position", NUMBER)],
        String,
        "SUBSTR({value}, {position})",
    ),
    OverloadDef::new(
        "substr",
        &[param("value", STRING), param("position", NUMBER), param("length", NUMBER)],
        String,
        "SUBSTR({value}, {position}, {length})",
    ),
    OverloadDef::new(
        "strpos",
        &[param("value", STRING), param("search", STRING)],
        Integer,
        "STRPOS({value}, {search})",
    ),
    OverloadDef::new(
        "starts_with",
        &[param("value", STRING), param("prefix", STRING)],
        Boolean,
        "STARTS_WITH({value}, {prefix})",
    ),
    OverloadDef::new(
        "ends_with",
        &[param("value", STRING), param("suffix", STRING)],
        Boolean,
        "({value} LIKE CONCAT('%', {suffix}))",
    ),
    OverloadDef::new(
        "replace",
        &[param("value", STRING), param("pattern", STRING), param("replacement", STRING)],
        String,
        "REPLACE({value}, {pattern}, {replacement})",
    ),
    OverloadDef::new("trim", TEXT, String, "TRIM({value})"),
    OverloadDef::new(
        "trim",
        &[param("value", STRING), param("characters", STRING)],
        String,
        "TRIM({characters} FROM {value})",
    ),
    OverloadDef::new("ltrim", TEXT, String, "LTRIM({value})"),
    OverloadDef::new("rtrim", TEXT, String, "RTRIM({value})"),
    OverloadDef::new(
        "repeat",
        &[param("value", STRING), param("count", NUMBER)],
        String,
        "REPEAT({value}, {count})",
    ),
    OverloadDef::new("reverse", TEXT, String, "REVERSE({value})"),
    OverloadDef::new("chr", VALUE, String, "CHR({value})"),
    OverloadDef::new("ascii", TEXT, Integer, "ASCII({value})"),
    OverloadDef::new(
        "regexp_extract",
        &[param("value", STRING), param("pattern", STRING)],
        String,
        "REGEXP_EXTRACT({value}, {pattern})",
    ),
    // nulls
    OverloadDef::new(
        "ifnull",
        &[param("value", ANY), param("default", ANY)],
        SameAs("value"),
        "COALESCE({value}, {default})",
    ),
    OverloadDef::new(
        "nullif",
        &[param("value", ANY), param("other", ANY)],
        SameAs("value"),
        "NULLIF({value}, {other})",
    ),
    OverloadDef::new("coalesce", &[variadic("values", ANY)], SameAs("values"), "COALESCE({...values})"),
    // aggregates
    OverloadDef::new("stddev", VALUE, Float, "STDDEV({value})").aggregate(),
    OverloadDef::new("string_agg", TEXT, String, "STRING_AGG({value}, ','{order_by})")
        .aggregate()
        .with_order_by(),
    OverloadDef::new(
        "string_agg",
        &[param("value", STRING), param("separator", STRING)],
        String,
        "STRING_AGG({value}, {separator}{order_by})",
    )
    .aggregate()
    .with_order_by(),
];

#[cfg(test)]
mod test {
    use super::*;
    use crate::functions::Catalog;

    #[test]
    fn test_base_catalog_builds() {
        let catalog = Catalog::build(FUNCTIONS, &[], &[]).unwrap();
        assert!(catalog.contains("string_agg"));
        assert_eq!(catalog.iter().count(), FUNCTIONS.len());
    }
}
