//! SQL expansion templates for catalog functions.
//!
//! A template is SQL text with holes: `{name}` is replaced by the rendered argument
//! bound to parameter `name`, and `{...name}` by all arguments of a variadic
//! parameter joined with `, `. Literal braces are written `{{` and `}}`.

use chumsky::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Reason, WithErrorInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Template {
    pub items: Vec<TemplateItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TemplateItem {
    Text(String),
    Param(String),
    Spread(String),
}

impl Template {
    pub fn parse(source: &str) -> Result<Template, Error> {
        parser()
            .parse(source)
            .map(|items| Template { items })
            .map_err(|errors| {
                let position = errors.first().map(|e| e.span().start).unwrap_or_default();
                Error::new(Reason::Expected {
                    who: Some("SQL template".to_string()),
                    expected: "text, `{param}` or `{...param}`".to_string(),
                    found: format!("`{source}` at position {position}"),
                })
                .push_hint("literal braces are written `{{` and `}}`")
            })
    }

    /// Names of the parameters referenced by the template, in order of appearance.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            TemplateItem::Text(_) => None,
            TemplateItem::Param(name) | TemplateItem::Spread(name) => Some(name.as_str()),
        })
    }
}

fn parser() -> impl Parser<char, Vec<TemplateItem>, Error = Simple<char>> {
    let text = (just("{{").to('{'))
        .or(just("}}").to('}'))
        .or(none_of("{}"))
        .repeated()
        .at_least(1)
        .collect::<String>()
        .map(TemplateItem::Text);

    let name = filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
        .repeated()
        .at_least(1)
        .collect::<String>();

    let hole = just("...")
        .ignore_then(name.clone())
        .map(TemplateItem::Spread)
        .or(name.map(TemplateItem::Param))
        .delimited_by(just('{'), just('}'));

    text.or(hole).repeated().then_ignore(end())
}
