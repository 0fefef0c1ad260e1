//! The function catalog.
//!
//! Functions are declared statically as [OverloadDef]s: a portable base set
//! (see [base]) plus, per dialect, overrides of base overloads and functions
//! which exist only on that dialect. [Catalog::build] merges them into one
//! catalog per dialect, and any inconsistency between the declarations is
//! reported as a catalog error at that point, never while compiling a query.

use std::collections::BTreeMap;
use std::fmt::Display;

use dialectic_ir::ir::{SemanticType, TypeKind};
use dialectic_ir::template::{Template, TemplateItem};
use itertools::Itertools;
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::{Error, Reason, Result, WithErrorInfo};

pub(crate) mod base;

pub(crate) const ANY: &[TypeKind] = &[TypeKind::Any];
pub(crate) const NUMBER: &[TypeKind] = &[TypeKind::Number];
pub(crate) const STRING: &[TypeKind] = &[TypeKind::String];
pub(crate) const BOOLEAN: &[TypeKind] = &[TypeKind::Boolean];
pub(crate) const TEMPORAL: &[TypeKind] = &[TypeKind::Date, TypeKind::Timestamp];
pub(crate) const SCALAR: &[TypeKind] = &[
    TypeKind::String,
    TypeKind::Number,
    TypeKind::Boolean,
    TypeKind::Date,
    TypeKind::Timestamp,
];

/// Template markers filled with the call's ordering and limit.
const ORDER_BY: &str = "order_by";
const LIMIT: &str = "limit";

/// Static declaration of one overload of a function.
#[derive(Debug, Clone, Copy)]
pub struct OverloadDef {
    pub name: &'static str,
    pub params: &'static [ParamDef],
    pub returns: ReturnType,
    pub aggregate: bool,
    pub order_by: bool,
    pub limit: bool,
    /// SQL template; see [dialectic_ir::template].
    pub sql: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDef {
    pub name: &'static str,
    /// Accepts one or more arguments. Only valid as the last parameter.
    pub variadic: bool,
    pub allowed: &'static [TypeKind],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
    /// The type of the (first) argument bound to the named parameter.
    SameAs(&'static str),
}

pub const fn param(name: &'static str, allowed: &'static [TypeKind]) -> ParamDef {
    ParamDef {
        name,
        variadic: false,
        allowed,
    }
}

pub const fn variadic(name: &'static str, allowed: &'static [TypeKind]) -> ParamDef {
    ParamDef {
        name,
        variadic: true,
        allowed,
    }
}

impl OverloadDef {
    pub const fn new(
        name: &'static str,
        params: &'static [ParamDef],
        returns: ReturnType,
        sql: &'static str,
    ) -> Self {
        OverloadDef {
            name,
            params,
            returns,
            aggregate: false,
            order_by: false,
            limit: false,
            sql,
        }
    }

    pub const fn aggregate(self) -> Self {
        OverloadDef {
            aggregate: true,
            ..self
        }
    }

    pub const fn with_order_by(self) -> Self {
        OverloadDef {
            order_by: true,
            ..self
        }
    }

    pub const fn with_limit(self) -> Self {
        OverloadDef {
            limit: true,
            ..self
        }
    }

    /// Two overloads have the same signature when their parameters agree in
    /// number, variadic-ness and allowed types, position by position.
    fn same_signature(&self, other: &OverloadDef) -> bool {
        self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params)
                .all(|(a, b)| a.variadic == b.variadic && a.allowed == b.allowed)
    }

    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| {
                let kinds = p.allowed.iter().join("|");
                if p.variadic {
                    format!("...{kinds}")
                } else {
                    kinds
                }
            })
            .join(", ");
        format!("{}({params})", self.name)
    }
}

/// Where an overload of a merged catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Base,
    Override,
    Dialect,
}

/// An overload of a merged catalog, with its template parsed.
#[derive(Debug, Clone)]
pub struct Overload {
    pub def: OverloadDef,
    pub template: Template,
    pub origin: Origin,
    /// Position of the parameter whose type is returned.
    returns_param: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    functions: BTreeMap<&'static str, Vec<Overload>>,
}

impl Catalog {
    /// Merges base overloads with a dialect's overrides and own functions.
    ///
    /// Fails when an override doesn't have the exact signature of a base
    /// overload of the same name, when it changes the return type, when a
    /// dialect function shadows a base function, or when a template is invalid.
    pub fn build(
        base: &[OverloadDef],
        overrides: &[OverloadDef],
        dialect_functions: &[OverloadDef],
    ) -> Result<Catalog> {
        let mut functions: BTreeMap<&'static str, Vec<Overload>> = BTreeMap::new();
        for def in base {
            functions
                .entry(def.name)
                .or_default()
                .push(Overload::new(*def, Origin::Base)?);
        }

        for def in overrides {
            let Some(overloads) = functions.get_mut(def.name) else {
                return Err(Error::catalog(def.name, "overrides a function that doesn't exist"));
            };
            let Some(overload) = overloads.iter_mut().find(|o| o.def.same_signature(def)) else {
                let candidates = overloads.iter().map(|o| o.def.signature()).join(", ");
                return Err(Error::catalog(
                    def.name,
                    format!("override {} matches no base overload", def.signature()),
                )
                .push_hint(format!("base overloads are {candidates}")));
            };
            let replacement = Overload::new(
                OverloadDef {
                    aggregate: overload.def.aggregate,
                    ..*def
                },
                Origin::Override,
            )?;
            if !overload.same_return(&replacement) {
                return Err(Error::catalog(
                    def.name,
                    format!(
                        "override {} returns {:?}, but the base overload returns {:?}",
                        def.signature(),
                        def.returns,
                        overload.def.returns
                    ),
                ));
            }
            *overload = replacement;
        }

        let mut own: BTreeMap<&'static str, Vec<Overload>> = BTreeMap::new();
        for def in dialect_functions {
            if functions.contains_key(def.name) {
                return Err(Error::catalog(
                    def.name,
                    "a dialect function can't share its name with a base function",
                )
                .push_hint("declare it as an override with a base signature instead"));
            }
            own.entry(def.name)
                .or_default()
                .push(Overload::new(*def, Origin::Dialect)?);
        }
        functions.extend(own);

        Ok(Catalog { functions })
    }

    /// Selects the overload of `name` which accepts `args`. When several do,
    /// the one whose parameters accept the fewest kinds wins, and then the one
    /// declared first.
    pub fn resolve(&self, name: &str, args: &[SemanticType]) -> Result<&Overload> {
        let Some(overloads) = self.functions.get(name) else {
            return Err(Error::new(Reason::NotFound {
                name: name.to_string(),
                namespace: "function".to_string(),
            }));
        };

        let kinds = args.iter().map(SemanticType::kind).collect_vec();
        overloads
            .iter()
            .filter(|o| o.accepts(&kinds))
            .min_by_key(|o| o.breadth())
            .ok_or_else(|| {
                let found = kinds.iter().join(", ");
                let expected = overloads.iter().map(|o| o.def.signature()).join(" or ");
                Error::new(Reason::Expected {
                    who: Some(format!("function `{name}`")),
                    expected,
                    found: format!("{name}({found})"),
                })
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overload> {
        self.functions.values().flatten()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

/// Checks dialect functions against each other across catalogs: two dialects
/// declaring a function with the same name and signature must agree on its
/// return type.
pub(crate) fn check_dialect_functions<'a, D, I>(catalogs: I) -> Result<()>
where
    D: Display + Copy,
    I: IntoIterator<Item = (D, &'a Catalog)>,
{
    let mut seen: BTreeMap<&'static str, Vec<(D, &'a Overload)>> = BTreeMap::new();
    for (dialect, catalog) in catalogs {
        for overload in catalog.iter().filter(|o| o.origin == Origin::Dialect) {
            let declared = seen.entry(overload.def.name).or_default();
            let conflict = declared.iter().find(|(_, other)| {
                other.def.same_signature(&overload.def) && !other.same_return(overload)
            });
            if let Some((other_dialect, other)) = conflict {
                return Err(Error::catalog(
                    overload.def.name,
                    format!(
                        "{} returns {:?} on `{dialect}`, but {:?} on `{other_dialect}`",
                        overload.def.signature(),
                        overload.def.returns,
                        other.def.returns
                    ),
                ));
            }
            declared.push((dialect, overload));
        }
    }
    Ok(())
}

impl Overload {
    fn new(def: OverloadDef, origin: Origin) -> Result<Self> {
        let template = Template::parse(def.sql).map_err(|e| {
            Error::catalog(def.name, format!("invalid template: {}", e.reason))
        })?;

        if let Some((i, _)) = def
            .params
            .iter()
            .find_position(|p| p.variadic)
            .filter(|(i, _)| *i + 1 != def.params.len())
        {
            return Err(Error::catalog(
                def.name,
                format!("variadic parameter {i} must be the last"),
            ));
        }

        for item in &template.items {
            let (name, spread) = match item {
                TemplateItem::Text(_) => continue,
                TemplateItem::Param(name) => (name.as_str(), false),
                TemplateItem::Spread(name) => (name.as_str(), true),
            };
            let reserved = (name == ORDER_BY && def.order_by) || (name == LIMIT && def.limit);
            if reserved && !spread {
                continue;
            }
            match def.params.iter().find(|p| p.name == name) {
                Some(p) if p.variadic == spread => {}
                Some(_) if spread => {
                    return Err(Error::catalog(
                        def.name,
                        format!("`{{...{name}}}` spreads a parameter which isn't variadic"),
                    ))
                }
                Some(_) => {
                    return Err(Error::catalog(
                        def.name,
                        format!("variadic parameter `{name}` must be written `{{...{name}}}`"),
                    ))
                }
                None => {
                    return Err(Error::catalog(
                        def.name,
                        format!("template references unknown parameter `{name}`"),
                    ))
                }
            }
        }

        let returns_param = match def.returns {
            ReturnType::SameAs(name) => {
                let position = def.params.iter().position(|p| p.name == name);
                Some(position.ok_or_else(|| {
                    Error::catalog(
                        def.name,
                        format!("return type refers to unknown parameter `{name}`"),
                    )
                })?)
            }
            _ => None,
        };

        Ok(Overload {
            def,
            template,
            origin,
            returns_param,
        })
    }

    fn same_return(&self, other: &Overload) -> bool {
        match (self.returns_param, other.returns_param) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.def.returns == other.def.returns,
            _ => false,
        }
    }

    fn accepts(&self, kinds: &[TypeKind]) -> bool {
        let params = self.def.params;
        match params.last() {
            Some(last) if last.variadic => {
                let fixed = &params[..params.len() - 1];
                kinds.len() > fixed.len()
                    && fixed.iter().zip(kinds).all(|(p, k)| param_accepts(p, *k))
                    && kinds[fixed.len()..].iter().all(|k| param_accepts(last, *k))
            }
            _ => {
                params.len() == kinds.len()
                    && params.iter().zip(kinds).all(|(p, k)| param_accepts(p, *k))
            }
        }
    }

    /// Number of argument kinds accepted, summed over the parameters.
    fn breadth(&self) -> usize {
        self.def.params.iter().map(param_breadth).sum()
    }

    /// Type of the call's result, given the types of its arguments.
    pub fn return_type(&self, args: &[SemanticType]) -> SemanticType {
        match self.def.returns {
            ReturnType::String => SemanticType::String,
            ReturnType::Integer => SemanticType::integer(),
            ReturnType::Float => SemanticType::float(),
            ReturnType::Boolean => SemanticType::Boolean,
            ReturnType::Date => SemanticType::Date,
            ReturnType::Timestamp => SemanticType::Timestamp,
            ReturnType::SameAs(name) => self
                .returns_param
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_else(|| SemanticType::Native(name.to_string())),
        }
    }

    /// Expands the template. `args` are the rendered arguments, `order_by`
    /// the rendered ordering terms.
    pub fn render(
        &self,
        dialect: &str,
        args: &[String],
        order_by: &[String],
        limit: Option<u64>,
    ) -> Result<String> {
        if !order_by.is_empty() && !self.def.order_by {
            return Err(Error::unsupported(
                dialect,
                format!("ordering the arguments of `{}`", self.def.name),
            ));
        }
        if limit.is_some() && !self.def.limit {
            return Err(Error::unsupported(
                dialect,
                format!("limiting the arguments of `{}`", self.def.name),
            ));
        }

        let mut sql = String::new();
        for item in &self.template.items {
            match item {
                TemplateItem::Text(text) => sql += text,
                TemplateItem::Param(name) if name == ORDER_BY && self.def.order_by => {
                    if !order_by.is_empty() {
                        sql += " ORDER BY ";
                        sql += &order_by.join(", ");
                    }
                }
                TemplateItem::Param(name) if name == LIMIT && self.def.limit => {
                    if let Some(limit) = limit {
                        sql += &format!(" LIMIT {limit}");
                    }
                }
                TemplateItem::Param(name) => {
                    let i = self.param_index(name)?;
                    let arg = args.get(i).ok_or_else(|| {
                        Error::new_assert(format!("missing argument `{name}`"))
                    })?;
                    sql += arg;
                }
                TemplateItem::Spread(name) => {
                    let i = self.param_index(name)?;
                    sql += &args.get(i..).unwrap_or_default().join(", ");
                }
            }
        }
        Ok(sql)
    }

    fn param_index(&self, name: &str) -> Result<usize> {
        self.def
            .params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| Error::new_assert(format!("unknown parameter `{name}`")))
    }
}

impl std::fmt::Display for Overload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let params = self
            .def
            .params
            .iter()
            .map(|p| {
                let kinds = p.allowed.iter().join("|");
                let dots = if p.variadic { "..." } else { "" };
                format!("{dots}{}: {kinds}", p.name)
            })
            .join(", ");
        write!(f, "{}({params}) -> {:?}", self.def.name, self.def.returns)?;
        if self.def.aggregate {
            f.write_str(" aggregate")?;
        }
        if self.origin != Origin::Base {
            write!(f, " [{:?}]", self.origin)?;
        }
        Ok(())
    }
}

fn param_accepts(param: &ParamDef, kind: TypeKind) -> bool {
    param.allowed.iter().any(|allowed| allowed.accepts(kind))
}

fn param_breadth(param: &ParamDef) -> usize {
    param
        .allowed
        .iter()
        .map(|kind| match kind {
            TypeKind::Any => TypeKind::iter().filter(|k| *k != TypeKind::Any).count(),
            _ => 1,
        })
        .sum()
}
