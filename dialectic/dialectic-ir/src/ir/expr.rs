use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::field::FieldRef;
use super::temporal::TemporalFilter;
use super::types::{ExtractUnit, SemanticType, TimestampUnit};

/// A typed expression node, as produced by semantic analysis.
///
/// The result type is fixed at construction; SQL generation reads nodes and never
/// rewrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,

    pub ty: SemanticType,
}

#[derive(Debug, EnumAsInner, PartialEq, Clone, Serialize, Deserialize, strum::AsRefStr, JsonSchema)]
pub enum ExprKind {
    Literal(Literal),
    Field(FieldRef),

    /// Cast of the inner expression to this node's type.
    Cast {
        expr: Box<Expr>,
        /// Produce null instead of raising when the value doesn't convert.
        safe: bool,
    },

    Truncate {
        expr: Box<Expr>,
        unit: TimestampUnit,
    },
    Extract {
        expr: Box<Expr>,
        unit: ExtractUnit,
    },
    Delta {
        base: Box<Expr>,
        op: DeltaOp,
        amount: Box<Expr>,
        unit: TimestampUnit,
    },
    /// Number of whole `unit`s from `from` to `to`.
    Measure {
        from: Box<Expr>,
        to: Box<Expr>,
        unit: TimestampUnit,
    },

    RegexMatch {
        expr: Box<Expr>,
        regex: Box<Expr>,
    },
    FunctionCall(FunctionCall),
    Now,

    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Case(CaseExpr),
    Aggregate(Aggregate),

    /// A relative-time filter applied to a temporal expression. Lowers to a boolean.
    TemporalFilter {
        expr: Box<Expr>,
        filter: TemporalFilter,
    },
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, EnumAsInner, JsonSchema)]
pub enum Literal {
    Null,
    /// Kept textual so no precision is lost between analysis and SQL.
    Number(String),
    String(String),
    Boolean(bool),
    /// `YYYY-MM-DD`
    Date(String),
    /// `YYYY-MM-DD HH:MM:SS`, interpreted in `timezone` when present.
    Timestamp {
        value: String,
        timezone: Option<String>,
    },
    Regex(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display)]
pub enum DeltaOp {
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Sub,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub op: BinOp,
    pub right: Box<Expr>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, JsonSchema, strum::Display)]
pub enum BinOp {
    #[strum(to_string = "*")]
    Mul,
    #[strum(to_string = "/")]
    Div,
    #[strum(to_string = "%")]
    Mod,
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Sub,
    #[strum(to_string = "=")]
    Eq,
    #[strum(to_string = "!=")]
    Ne,
    #[strum(to_string = ">")]
    Gt,
    #[strum(to_string = "<")]
    Lt,
    #[strum(to_string = ">=")]
    Gte,
    #[strum(to_string = "<=")]
    Lte,
    #[strum(to_string = "AND")]
    And,
    #[strum(to_string = "OR")]
    Or,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UnaryExpr {
    pub op: UnOp,
    pub expr: Box<Expr>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize, JsonSchema)]
pub enum UnOp {
    Neg,
    Not,
    IsNull,
    IsNotNull,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CaseExpr {
    pub cases: Vec<SwitchCase>,
    pub default: Option<Box<Expr>>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwitchCase {
    pub condition: Expr,
    pub value: Expr,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<ExprOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExprOrder {
    pub expr: Expr,
    pub direction: SortDirection,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display,
)]
pub enum SortDirection {
    #[default]
    #[strum(to_string = "ASC")]
    Asc,
    #[strum(to_string = "DESC")]
    Desc,
}

/// An aggregate. When `distinct_key` is set, the aggregated rows may have been
/// repeated by a one-to-many join, and the key identifies the original row.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Aggregate {
    pub func: AggregateFunc,
    /// `None` only for `count`, which then counts rows.
    pub expr: Option<Box<Expr>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct_key: Option<Box<Expr>>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, strum::Display,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum AggregateFunc {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    #[strum(to_string = "COUNT DISTINCT")]
    CountDistinct,
}

impl Expr {
    pub fn new<K: Into<ExprKind>>(kind: K, ty: SemanticType) -> Self {
        Expr {
            kind: kind.into(),
            ty,
        }
    }

    pub fn number<S: ToString>(value: S) -> Self {
        let text = value.to_string();
        let ty = if text.contains(['.', 'e', 'E']) {
            SemanticType::float()
        } else {
            SemanticType::integer()
        };
        Expr::new(Literal::Number(text), ty)
    }

    pub fn string<S: ToString>(value: S) -> Self {
        Expr::new(Literal::String(value.to_string()), SemanticType::String)
    }

    pub fn boolean(value: bool) -> Self {
        Expr::new(Literal::Boolean(value), SemanticType::Boolean)
    }

    pub fn null(ty: SemanticType) -> Self {
        Expr::new(Literal::Null, ty)
    }

    pub fn now() -> Self {
        Expr::new(ExprKind::Now, SemanticType::Timestamp)
    }

    pub fn timestamp<S: ToString>(value: S) -> Self {
        Expr::new(
            Literal::Timestamp {
                value: value.to_string(),
                timezone: None,
            },
            SemanticType::Timestamp,
        )
    }

    pub fn date<S: ToString>(value: S) -> Self {
        Expr::new(Literal::Date(value.to_string()), SemanticType::Date)
    }

    pub fn field(field: FieldRef, ty: SemanticType) -> Self {
        Expr::new(field, ty)
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr, ty: SemanticType) -> Self {
        Expr::new(
            BinaryExpr {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            ty,
        )
    }

    pub fn truncate(expr: Expr, unit: TimestampUnit) -> Self {
        let ty = expr.ty.clone();
        Expr::new(
            ExprKind::Truncate {
                expr: Box::new(expr),
                unit,
            },
            ty,
        )
    }

    pub fn delta(base: Expr, op: DeltaOp, amount: Expr, unit: TimestampUnit) -> Self {
        let ty = base.ty.clone();
        Expr::new(
            ExprKind::Delta {
                base: Box::new(base),
                op,
                amount: Box::new(amount),
                unit,
            },
            ty,
        )
    }

    pub fn aggregate(func: AggregateFunc, expr: Option<Expr>, ty: SemanticType) -> Self {
        Expr::new(
            Aggregate {
                func,
                expr: expr.map(Box::new),
                distinct_key: None,
            },
            ty,
        )
    }

    /// Marks an aggregate as running over possibly repeated rows.
    pub fn with_distinct_key(mut self, key: Expr) -> Self {
        if let ExprKind::Aggregate(aggregate) = &mut self.kind {
            aggregate.distinct_key = Some(Box::new(key));
        }
        self
    }

    /// Whether evaluating this expression requires a GROUP BY context.
    pub fn is_aggregate(&self) -> bool {
        match &self.kind {
            ExprKind::Aggregate(_) => true,
            ExprKind::Literal(_) | ExprKind::Field(_) | ExprKind::Now => false,
            ExprKind::Cast { expr, .. }
            | ExprKind::Truncate { expr, .. }
            | ExprKind::Extract { expr, .. }
            | ExprKind::TemporalFilter { expr, .. } => expr.is_aggregate(),
            ExprKind::Delta { base, amount, .. } => base.is_aggregate() || amount.is_aggregate(),
            ExprKind::Measure { from, to, .. } => from.is_aggregate() || to.is_aggregate(),
            ExprKind::RegexMatch { expr, regex } => expr.is_aggregate() || regex.is_aggregate(),
            ExprKind::FunctionCall(call) => call.args.iter().any(Expr::is_aggregate),
            ExprKind::Binary(binary) => binary.left.is_aggregate() || binary.right.is_aggregate(),
            ExprKind::Unary(unary) => unary.expr.is_aggregate(),
            ExprKind::Case(case) => {
                case.cases
                    .iter()
                    .any(|c| c.condition.is_aggregate() || c.value.is_aggregate())
                    || case.default.as_ref().is_some_and(|d| d.is_aggregate())
            }
        }
    }
}

impl From<Literal> for ExprKind {
    fn from(value: Literal) -> Self {
        ExprKind::Literal(value)
    }
}

impl From<FieldRef> for ExprKind {
    fn from(value: FieldRef) -> Self {
        ExprKind::Field(value)
    }
}

impl From<BinaryExpr> for ExprKind {
    fn from(value: BinaryExpr) -> Self {
        ExprKind::Binary(value)
    }
}

impl From<UnaryExpr> for ExprKind {
    fn from(value: UnaryExpr) -> Self {
        ExprKind::Unary(value)
    }
}

impl From<FunctionCall> for ExprKind {
    fn from(value: FunctionCall) -> Self {
        ExprKind::FunctionCall(value)
    }
}

impl From<Aggregate> for ExprKind {
    fn from(value: Aggregate) -> Self {
        ExprKind::Aggregate(value)
    }
}

impl From<CaseExpr> for ExprKind {
    fn from(value: CaseExpr) -> Self {
        ExprKind::Case(value)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::field::{FieldRef, RelationKind};

    #[test]
    fn number_literal_types() {
        assert_eq!(Expr::number(10).ty, SemanticType::integer());
        assert_eq!(Expr::number("1.5").ty, SemanticType::float());
    }

    #[test]
    fn aggregate_detection() {
        let amount = Expr::field(
            FieldRef::new("base", RelationKind::Table, "amount"),
            SemanticType::float(),
        );
        assert!(!amount.is_aggregate());

        let sum = Expr::aggregate(AggregateFunc::Sum, Some(amount.clone()), SemanticType::float());
        let ratio = Expr::binary(sum, BinOp::Div, Expr::number(2), SemanticType::float());
        assert!(ratio.is_aggregate());
    }

    #[test]
    fn serialization() {
        let expr = Expr::string("x");
        assert_eq!(
            serde_json::to_string(&expr).unwrap(),
            r#"{"Literal":{"String":"x"},"ty":"string"}"#
        );
    }
}
