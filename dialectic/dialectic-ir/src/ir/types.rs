use enum_as_inner::EnumAsInner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter};

/// The closed set of types a query value can have, independent of any backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, EnumAsInner, AsRefStr, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    String,
    Number(NumberKind),
    Boolean,
    Date,
    Timestamp,
    Json,

    /// A backend type with no semantic counterpart. The raw backend name is kept
    /// so it can be rendered back verbatim.
    Native(String),

    Array(Box<SemanticType>),
    Record(Vec<RecordField>),
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum NumberKind {
    Integer,
    #[default]
    Float,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RecordField {
    pub name: String,
    pub ty: SemanticType,
}

impl SemanticType {
    pub fn integer() -> Self {
        SemanticType::Number(NumberKind::Integer)
    }

    pub fn float() -> Self {
        SemanticType::Number(NumberKind::Float)
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, SemanticType::Date | SemanticType::Timestamp)
    }

    /// The coarse kind used when matching function signatures.
    pub fn kind(&self) -> TypeKind {
        match self {
            SemanticType::String => TypeKind::String,
            SemanticType::Number(_) => TypeKind::Number,
            SemanticType::Boolean => TypeKind::Boolean,
            SemanticType::Date => TypeKind::Date,
            SemanticType::Timestamp => TypeKind::Timestamp,
            SemanticType::Json => TypeKind::Json,
            SemanticType::Native(_) => TypeKind::Native,
            SemanticType::Array(_) => TypeKind::Array,
            SemanticType::Record(_) => TypeKind::Record,
        }
    }
}

/// Coarse type classes. Function parameters declare the kinds they accept.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TypeKind {
    String,
    Number,
    Boolean,
    Date,
    Timestamp,
    Json,
    Native,
    Array,
    Record,
    /// Matches any argument; least specific.
    Any,
}

impl TypeKind {
    pub fn accepts(&self, other: TypeKind) -> bool {
        *self == TypeKind::Any || *self == other
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimestampUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimestampUnit {
    /// Units which are whole days or longer, and so are valid on dates.
    pub fn is_calendar(&self) -> bool {
        matches!(
            self,
            TimestampUnit::Day
                | TimestampUnit::Week
                | TimestampUnit::Month
                | TimestampUnit::Quarter
                | TimestampUnit::Year
        )
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    strum::Display,
    strum::EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
    /// ISO numbering: Monday is 1, Sunday is 7.
    DayOfWeek,
    DayOfYear,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(SemanticType::integer().kind(), TypeKind::Number);
        assert_eq!(
            SemanticType::Array(Box::new(SemanticType::String)).kind(),
            TypeKind::Array
        );
        assert!(TypeKind::Any.accepts(TypeKind::Date));
        assert!(!TypeKind::Number.accepts(TypeKind::String));
    }

    #[test]
    fn units() {
        assert_eq!(TimestampUnit::Quarter.to_string(), "quarter");
        assert_eq!(ExtractUnit::DayOfWeek.to_string(), "day_of_week");
        assert_eq!("week".parse::<TimestampUnit>(), Ok(TimestampUnit::Week));
        assert!(!TimestampUnit::Hour.is_calendar());
    }

    #[test]
    fn serde_shape() {
        let ty = SemanticType::Record(vec![RecordField {
            name: "a".to_string(),
            ty: SemanticType::integer(),
        }]);
        let json = serde_json::to_string(&ty).unwrap();
        assert_eq!(json, r#"{"record":[{"name":"a","ty":{"number":"integer"}}]}"#);
    }
}
