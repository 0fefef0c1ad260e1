mod id_gen;

use std::sync::OnceLock;

pub use id_gen::{IdGenerator, NameGenerator};
use regex::Regex;

use crate::dialect::DialectHandler;

/// Identifiers which may be written without quotes: lowercase ASCII letters,
/// digits and underscores, not starting with a digit.
pub(crate) fn valid_ident() -> Option<&'static Regex> {
    static VALID_IDENT: OnceLock<Option<Regex>> = OnceLock::new();
    VALID_IDENT
        .get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]*$").ok())
        .as_ref()
}

/// Words which are reserved by at least one backend, and so always quoted.
const KEYWORDS: &[&str] = &[
    "all", "and", "any", "array", "as", "asc", "between", "by", "case", "cast", "cross",
    "current_date", "current_timestamp", "date", "default", "desc", "distinct", "else", "end",
    "except", "exists", "extract", "false", "for", "from", "full", "group", "having", "in",
    "inner", "interval", "is", "join", "lateral", "left", "like", "limit", "natural", "not",
    "null", "offset", "on", "or", "order", "outer", "over", "partition", "range", "right",
    "rows", "select", "set", "some", "table", "then", "time", "timestamp", "to", "true",
    "union", "unnest", "user", "using", "value", "values", "when", "where", "window", "with",
];

pub(crate) fn is_keyword(ident: &str) -> bool {
    KEYWORDS.contains(&ident)
}

/// Writes an identifier, quoting it only when it needs quotes.
pub(crate) fn ident(dialect: &dyn DialectHandler, name: &str) -> String {
    let is_bare = valid_ident().is_some_and(|re| re.is_match(name));
    if is_bare && !is_keyword(name) {
        name.to_string()
    } else {
        dialect.quote_ident(name)
    }
}

#[cfg(test)]
mod test {
    use insta::assert_snapshot;

    use super::*;
    use crate::dialect::Dialect;

    #[test]
    fn test_ident() {
        let mysql = Dialect::MySql.handler();
        assert_snapshot!(ident(mysql.as_ref(), "amount"), @"amount");
        assert_snapshot!(ident(mysql.as_ref(), "order"), @"`order`");
        assert_snapshot!(ident(mysql.as_ref(), "Total Sales"), @"`Total Sales`");

        let postgres = Dialect::Postgres.handler();
        assert_snapshot!(ident(postgres.as_ref(), "2nd"), @r#""2nd""#);
    }
}
