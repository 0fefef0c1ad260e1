use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::SemanticType;

/// Metadata for one field of a relation, as produced by semantic analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDescriptor {
    /// Name of the field in its relation.
    pub name: String,
    /// Name under which the field is emitted, when different from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub ty: SemanticType,
    #[serde(default)]
    pub shape: FieldShape,
    pub relation: RelationKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    #[default]
    Scalar,
    Array,
    Record,
    /// A nested subtable: an array of records produced by a nested segment.
    Nested,
}

/// The kind of relation a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumAsInner, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// The query's source table.
    Table,
    /// A joined table.
    Join,
    /// The synthetic row source produced by unnesting an array or record column.
    Struct { array_of_scalars: bool },
}

/// A reference to a field of a relation which is in scope in the FROM clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldRef {
    /// Alias of the relation in the FROM clause.
    pub relation: String,
    pub relation_kind: RelationKind,
    pub name: String,
}

impl FieldRef {
    pub fn new<R: ToString, N: ToString>(relation: R, relation_kind: RelationKind, name: N) -> Self {
        FieldRef {
            relation: relation.to_string(),
            relation_kind,
            name: name.to_string(),
        }
    }
}

impl FieldDescriptor {
    pub fn new<S: ToString>(name: S, ty: SemanticType, relation: RelationKind) -> Self {
        let shape = match &ty {
            SemanticType::Array(inner) if inner.is_record() => FieldShape::Nested,
            SemanticType::Array(_) => FieldShape::Array,
            SemanticType::Record(_) => FieldShape::Record,
            _ => FieldShape::Scalar,
        };
        FieldDescriptor {
            name: name.to_string(),
            alias: None,
            ty,
            shape,
            relation,
        }
    }

    pub fn with_alias<S: ToString>(self, alias: S) -> Self {
        FieldDescriptor {
            alias: Some(alias.to_string()),
            ..self
        }
    }

    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ir::types::RecordField;

    #[test]
    fn shapes() {
        let nested = FieldDescriptor::new(
            "items",
            SemanticType::Array(Box::new(SemanticType::Record(vec![RecordField {
                name: "sku".to_string(),
                ty: SemanticType::String,
            }]))),
            RelationKind::Table,
        );
        assert_eq!(nested.shape, FieldShape::Nested);

        let tags = FieldDescriptor::new(
            "tags",
            SemanticType::Array(Box::new(SemanticType::String)),
            RelationKind::Table,
        );
        assert_eq!(tags.shape, FieldShape::Array);
        assert_eq!(tags.with_alias("labels").output_name(), "labels");
    }
}
