use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::expr::{Expr, SortDirection};
use super::field::FieldDescriptor;

/// A complete query over one source relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Query {
    pub source: Source,
    #[serde(default)]
    pub joins: Vec<Join>,
    /// Row filters, applied before aggregation.
    #[serde(default)]
    pub filters: Vec<Expr>,
    pub root: Segment,
    /// Timezone in which civil-time operations of this query happen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Source {
    pub table: String,
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<Sampling>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Sampling {
    Rows(u64),
    Percent(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Join {
    pub alias: String,
    pub kind: JoinKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, EnumAsInner, JsonSchema)]
pub enum JoinKind {
    Table {
        table: String,
        on: Expr,
        cardinality: Cardinality,
    },
    Unnest(Unnest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

/// Iterates an array or record valued expression as a joined row source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Unnest {
    pub source: Expr,
    /// Fields of each element. Empty for arrays of scalars.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Synthesize a per-element ordinal, `__row_id`, usable as a distinct key.
    #[serde(default)]
    pub needs_distinct_key: bool,
    #[serde(default)]
    pub array_of_scalars: bool,
    /// The unnest happens inside a nested pipeline stage, where the array length
    /// can't be read by a correlated subquery.
    #[serde(default)]
    pub in_nested_pipeline: bool,
}

/// One level of grouping. Nested segments become array (or record) valued columns
/// of their parent's rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub name: String,
    #[serde(default)]
    pub shape: SegmentShape,
    #[serde(default)]
    pub dimensions: Vec<OutputField>,
    #[serde(default)]
    pub measures: Vec<OutputField>,
    #[serde(default)]
    pub nested: Vec<Segment>,
    #[serde(default)]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SegmentShape {
    #[default]
    Array,
    /// A single record; only meaningful for nested segments.
    Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutputField {
    pub name: String,
    pub expr: Expr,
}

/// Ordering by an output field of the same segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Segment {
    pub fn new<S: ToString>(name: S) -> Self {
        Segment {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn dimension<S: ToString>(mut self, name: S, expr: Expr) -> Self {
        self.dimensions.push(OutputField {
            name: name.to_string(),
            expr,
        });
        self
    }

    pub fn measure<S: ToString>(mut self, name: S, expr: Expr) -> Self {
        self.measures.push(OutputField {
            name: name.to_string(),
            expr,
        });
        self
    }

    pub fn nest(mut self, segment: Segment) -> Self {
        self.nested.push(segment);
        self
    }

    pub fn order<S: ToString>(mut self, field: S, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(self, limit: u64) -> Self {
        Segment {
            limit: Some(limit),
            ..self
        }
    }

    pub fn with_shape(self, shape: SegmentShape) -> Self {
        Segment { shape, ..self }
    }

    /// Depth of the deepest nested segment below this one; zero without nesting.
    pub fn depth(&self) -> usize {
        self.nested
            .iter()
            .map(|n| n.depth() + 1)
            .max()
            .unwrap_or(0)
    }
}

impl Query {
    pub fn new(table: &str, alias: &str, root: Segment) -> Self {
        Query {
            source: Source {
                table: table.to_string(),
                alias: alias.to_string(),
                sample: None,
            },
            joins: Vec::new(),
            filters: Vec::new(),
            root,
            timezone: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn depth() {
        let root = Segment::new("root")
            .nest(Segment::new("a").nest(Segment::new("aa")))
            .nest(Segment::new("b"));
        assert_eq!(root.depth(), 2);
        assert_eq!(Segment::new("flat").depth(), 0);
    }
}
