//! Request body schemas
//!
//! Every JSON body a route accepts is described by a static [`Schema`]:
//! the closed set of fields, their primitive types and whether they are
//! required. Bodies are checked against the schema before serde decodes
//! them into the typed request, so a failure never reaches the data layer
//! and can always be reported the same way.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Any JSON object
    Object,
    /// One of a fixed set of strings
    Enum(&'static [&'static str]),
    Array(&'static FieldType),
    /// Two-element array, e.g. a `[lat, lon]` pair
    Pair(&'static FieldType),
}

/// `[[lat, lon], ...]`
pub const LAT_LON_ARRAY: FieldType = FieldType::Array(&FieldType::Pair(&FieldType::Number));
/// `[[string, string], ...]`
pub const STRING_PAIR_ARRAY: FieldType = FieldType::Array(&FieldType::Pair(&FieldType::String));
pub const STRING_ARRAY: FieldType = FieldType::Array(&FieldType::String);
pub const INTEGER_ARRAY: FieldType = FieldType::Array(&FieldType::Integer);
pub const NUMBER_ARRAY: FieldType = FieldType::Array(&FieldType::Number);

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Object, Value::Object(_)) => true,
            (FieldType::Enum(options), Value::String(s)) => options.contains(&s.as_str()),
            (FieldType::Array(item), Value::Array(items)) => items.iter().all(|v| item.accepts(v)),
            (FieldType::Pair(item), Value::Array(items)) => {
                items.len() == 2 && items.iter().all(|v| item.accepts(v))
            }
            _ => false,
        }
    }

    /// JSON Schema fragment for this type
    fn describe(&self) -> Value {
        match self {
            FieldType::String => json!({ "type": "string" }),
            FieldType::Integer => json!({ "type": "integer" }),
            FieldType::Number => json!({ "type": "number" }),
            FieldType::Boolean => json!({ "type": "boolean" }),
            FieldType::Object => json!({ "type": "object" }),
            FieldType::Enum(options) => json!({ "enum": options }),
            FieldType::Array(item) => json!({ "type": "array", "items": item.describe() }),
            FieldType::Pair(item) => json!({
                "type": "array",
                "items": item.describe(),
                "minItems": 2,
                "maxItems": 2,
            }),
        }
    }

    fn name(&self) -> String {
        match self {
            FieldType::String => "string".into(),
            FieldType::Integer => "integer".into(),
            FieldType::Number => "number".into(),
            FieldType::Boolean => "boolean".into(),
            FieldType::Object => "object".into(),
            FieldType::Enum(options) => options.join(" | "),
            FieldType::Array(item) => format!("{}[]", item.name()),
            FieldType::Pair(item) => format!("[{0}, {0}]", item.name()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub nullable: bool,
}

impl Field {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Field { name, ty, required: true, nullable: false }
    }

    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Field { name, ty, required: false, nullable: false }
    }

    /// Present, but `null` is accepted
    pub const fn nullable(name: &'static str, ty: FieldType) -> Self {
        Field { name, ty, required: true, nullable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("field `{field}` should be {expected}")]
    WrongType {
        field: &'static str,
        expected: String,
    },

    #[error("{0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub fields: &'static [Field],
}

impl Schema {
    /// Check field presence and primitive types; unknown fields are ignored
    pub fn validate<'a>(&self, body: &'a Value) -> Result<&'a Map<String, Value>, ValidationError> {
        let object = body.as_object().ok_or(ValidationError::NotAnObject)?;

        for field in self.fields {
            match object.get(field.name) {
                None => {
                    if field.required {
                        return Err(ValidationError::Missing(field.name));
                    }
                }
                Some(Value::Null) => {
                    if field.required && !field.nullable {
                        return Err(ValidationError::Missing(field.name));
                    }
                }
                Some(value) => {
                    if !field.ty.accepts(value) {
                        return Err(ValidationError::WrongType {
                            field: field.name,
                            expected: field.ty.name(),
                        });
                    }
                }
            }
        }

        Ok(object)
    }

    /// JSON Schema `properties` object describing every field
    pub fn describe(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|field| {
                let mut described = field.ty.describe();
                if field.nullable {
                    described = json!({ "anyOf": [described, { "type": "null" }] });
                }
                (field.name.to_string(), described)
            })
            .collect();
        Value::Object(properties)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A request type with a static schema
pub trait Validated: DeserializeOwned {
    const SCHEMA: Schema;
}

/// Validate a body against `T::SCHEMA`, then decode it
pub fn decode<T: Validated>(body: Value) -> Result<T, ValidationError> {
    T::SCHEMA.validate(&body)?;
    serde_json::from_value(body).map_err(|e| ValidationError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    const RATINGS: &[&str] = &["good", "bad"];

    #[derive(Debug, Deserialize)]
    struct Sample {
        name: String,
        count: i64,
        #[serde(default)]
        rating: Option<String>,
    }

    impl Validated for Sample {
        const SCHEMA: Schema = Schema {
            fields: &[
                Field::required("name", FieldType::String),
                Field::required("count", FieldType::Integer),
                Field::optional("rating", FieldType::Enum(RATINGS)),
                Field::optional("points", LAT_LON_ARRAY),
            ],
        };
    }

    #[test]
    fn test_decode_valid_body_ignores_extra_fields() {
        let sample: Sample =
            decode(json!({"name": "x", "count": 3, "rating": "good", "extra": true})).unwrap();
        assert_eq!(sample.name, "x");
        assert_eq!(sample.count, 3);
        assert_eq!(sample.rating.as_deref(), Some("good"));
    }

    #[test]
    fn test_missing_and_wrong_types_rejected() {
        assert_eq!(
            decode::<Sample>(json!({"count": 1})).unwrap_err(),
            ValidationError::Missing("name")
        );
        assert!(matches!(
            decode::<Sample>(json!({"name": "x", "count": 1.5})),
            Err(ValidationError::WrongType { field: "count", .. })
        ));
        assert!(matches!(
            decode::<Sample>(json!({"name": "x", "count": 1, "rating": "meh"})),
            Err(ValidationError::WrongType { field: "rating", .. })
        ));
        assert!(matches!(
            decode::<Sample>(json!({"name": "x", "count": 1, "points": [[1.0, 2.0, 3.0]]})),
            Err(ValidationError::WrongType { field: "points", .. })
        ));
        assert_eq!(
            decode::<Sample>(Value::Null).unwrap_err(),
            ValidationError::NotAnObject
        );
    }

    #[test]
    fn test_nullable_field_accepts_null() {
        const SCHEMA: Schema = Schema {
            fields: &[Field::nullable("value", FieldType::Number)],
        };
        assert!(SCHEMA.validate(&json!({"value": null})).is_ok());
        assert!(SCHEMA.validate(&json!({"value": 2.5})).is_ok());
        assert!(SCHEMA.validate(&json!({})).is_err());
    }

    #[test]
    fn test_describe_lists_properties() {
        let described = Sample::SCHEMA.describe();
        assert_eq!(described["name"], json!({"type": "string"}));
        assert_eq!(described["rating"], json!({"enum": ["good", "bad"]}));
        assert_eq!(described["points"]["items"]["maxItems"], json!(2));
    }
}
