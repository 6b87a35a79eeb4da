// SPDX-License-Identifier: MIT

//! Flat-map codec for structured state
//!
//! Thread metadata only holds string values, so every declared field of a
//! model becomes one string entry:
//!
//! - absent values become [`NULL_MARKER`]
//! - enumerated tags are stored as-is
//! - scalars and nested models are stored as JSON text
//! - lists of models are a JSON array of the elements' JSON texts, with the
//!   empty list written as [`EMPTY_LIST_MARKER`]
//!
//! Encoding refuses values that do not conform to their declared type, since
//! decode could never read them back.
//!
//! Decoding is driven by the declared shape, never by what the string looks
//! like. Payloads that fail to parse or do not match their declared type fall
//! back to null (optional fields) or the field's default value. Fallback is per
//! field: a list of models with one unreadable element falls back as a whole,
//! so a decoded list is either the stored list or the default, never a subset.

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::schema::{FieldDecl, Model, ModelSchema, StateModel};
use super::shape::{Shape, ShapeCategory};
use crate::error::{ShapeError, StateError};

/// Persisted representation of a model: field name to serialized value
pub type FlatMap = HashMap<String, String>;

/// Stored for absent or null values
pub const NULL_MARKER: &str = "null";

/// Stored for empty lists
pub const EMPTY_LIST_MARKER: &str = "[]";

/// Encode a model into a flat map with one entry per declared field
pub fn encode<M: Model>(model: &M) -> Result<FlatMap, StateError> {
    let schema = M::schema();
    let value = serde_json::to_value(model)?;
    let Value::Object(obj) = value else {
        return Err(StateError::schema(
            schema.name(),
            "model does not serialize to an object",
        ));
    };
    encode_object(schema, &obj)
}

/// Encode an already-serialized model object
pub fn encode_object(
    schema: &ModelSchema,
    obj: &Map<String, Value>,
) -> Result<FlatMap, StateError> {
    let mut data = FlatMap::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let shape = field.shape()?;
        let value = obj.get(field.name()).unwrap_or(&Value::Null);
        if !field.declared().accepts(value) {
            return Err(StateError::shape(
                field.name(),
                ShapeError::ValueMismatch {
                    expected: field.declared().describe(),
                    found: value_kind(value).to_string(),
                },
            ));
        }
        let encoded = encode_field(shape, value).map_err(|e| match e {
            FieldError::Shape(source) => StateError::shape(field.name(), source),
            FieldError::Json(e) => StateError::Json(e),
        })?;
        data.insert(field.name().to_string(), encoded);
    }

    for key in obj.keys().filter(|k| schema.field(k).is_none()) {
        log::debug!(
            "Model '{}' serializes undeclared field '{}', not persisted",
            schema.name(),
            key
        );
    }

    Ok(data)
}

enum FieldError {
    Shape(ShapeError),
    Json(serde_json::Error),
}

impl From<serde_json::Error> for FieldError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

fn encode_field(shape: &Shape, value: &Value) -> Result<String, FieldError> {
    if value.is_null() {
        return Ok(NULL_MARKER.to_string());
    }

    match &shape.category {
        ShapeCategory::Enumerated(_) => match value {
            Value::String(tag) => Ok(tag.clone()),
            other => Err(mismatch("a literal tag", other)),
        },
        ShapeCategory::Scalar(_) | ShapeCategory::Nested(_) => Ok(serde_json::to_string(value)?),
        ShapeCategory::ListOfNested(_) => {
            let items = value
                .as_array()
                .ok_or_else(|| mismatch("a list", value))?;
            let encoded = items
                .iter()
                .map(serde_json::to_string)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(serde_json::to_string(&encoded)?)
        }
    }
}

fn mismatch(expected: &str, found: &Value) -> FieldError {
    FieldError::Shape(ShapeError::ValueMismatch {
        expected: expected.to_string(),
        found: value_kind(found).to_string(),
    })
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Decode a flat map into a state.
///
/// Missing keys keep the value from `S::default()`, unknown keys are ignored,
/// and corrupted payloads fall back instead of failing the whole decode. A
/// value that conforms to its declared type but not to the Rust field (an
/// out-of-range integer, say) falls back the same way.
pub fn decode<S: StateModel>(data: &FlatMap) -> Result<S, StateError> {
    let schema = S::schema();
    let defaults = match serde_json::to_value(S::default())? {
        Value::Object(obj) => obj,
        _ => {
            return Err(StateError::schema(
                schema.name(),
                "model does not serialize to an object",
            ))
        }
    };

    let obj = decode_object(schema, data, defaults.clone())?;
    let obj = match serde_json::from_value(Value::Object(obj.clone())) {
        Ok(state) => return Ok(state),
        Err(e) => {
            log::debug!("Decoded '{}' does not deserialize: {}", schema.name(), e);
            reset_unreadable_fields::<S>(schema, obj, &defaults)?
        }
    };
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| StateError::schema(schema.name(), e.to_string()))
}

/// Reset every field whose decoded value the Rust type cannot hold.
///
/// Each field is tried on its own on top of the defaults.
fn reset_unreadable_fields<S: StateModel>(
    schema: &ModelSchema,
    mut obj: Map<String, Value>,
    defaults: &Map<String, Value>,
) -> Result<Map<String, Value>, StateError> {
    for field in schema.fields() {
        let shape = field.shape()?;
        let Some(value) = obj.get(field.name()) else {
            continue;
        };
        if defaults.get(field.name()) == Some(value) {
            continue;
        }

        let mut isolated = defaults.clone();
        isolated.insert(field.name().to_string(), value.clone());
        if serde_json::from_value::<S>(Value::Object(isolated)).is_ok() {
            continue;
        }

        let fallback = fallback_value(field, shape, defaults);
        log::warn!(
            "Payload for field '{}' of '{}' does not fit its type, using {}",
            field.name(),
            schema.name(),
            fallback
        );
        obj.insert(field.name().to_string(), fallback);
    }
    Ok(obj)
}

/// Decode a flat map on top of a default object
pub fn decode_object(
    schema: &ModelSchema,
    data: &FlatMap,
    mut obj: Map<String, Value>,
) -> Result<Map<String, Value>, StateError> {
    for field in schema.fields() {
        let shape = field.shape()?;
        let Some(raw) = data.get(field.name()) else {
            continue;
        };

        let decoded = decode_field(shape, raw).filter(|v| field.declared().accepts(v));
        let value = match decoded {
            Some(value) => value,
            None => {
                let fallback = fallback_value(field, shape, &obj);
                log::warn!(
                    "Corrupted payload for field '{}' of '{}', using {}",
                    field.name(),
                    schema.name(),
                    fallback
                );
                fallback
            }
        };
        obj.insert(field.name().to_string(), value);
    }

    for key in data.keys().filter(|k| schema.field(k).is_none()) {
        log::debug!("Ignoring unknown key '{}' for '{}'", key, schema.name());
    }

    Ok(obj)
}

fn decode_field(shape: &Shape, raw: &str) -> Option<Value> {
    if raw == NULL_MARKER {
        return Some(Value::Null);
    }
    if raw == EMPTY_LIST_MARKER {
        return Some(Value::Array(vec![]));
    }

    match &shape.category {
        ShapeCategory::Enumerated(_) => Some(Value::String(raw.to_string())),
        ShapeCategory::Scalar(_) | ShapeCategory::Nested(_) => serde_json::from_str(raw).ok(),
        ShapeCategory::ListOfNested(_) => {
            let items: Vec<String> = serde_json::from_str(raw).ok()?;
            items
                .iter()
                .map(|item| serde_json::from_str(item).ok())
                .collect::<Option<Vec<Value>>>()
                .map(Value::Array)
        }
    }
}

fn fallback_value(field: &FieldDecl, shape: &Shape, defaults: &Map<String, Value>) -> Value {
    if shape.optional {
        return Value::Null;
    }
    defaults.get(field.name()).cloned().unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::schema::DeclaredType;
    use once_cell::sync::Lazy;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    enum Mood {
        Calm,
        Busy,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        qty: u32,
    }

    impl Model for Item {
        fn schema() -> &'static ModelSchema {
            static SCHEMA: Lazy<ModelSchema> = Lazy::new(|| {
                ModelSchema::new(
                    "Item",
                    vec![
                        FieldDecl::new("name", DeclaredType::string()),
                        FieldDecl::new("qty", DeclaredType::integer()),
                    ],
                )
            });
            &SCHEMA
        }
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Cart {
        owner: String,
        count: i64,
        mood: Option<Mood>,
        featured: Option<Item>,
        items: Vec<Item>,
    }

    impl Model for Cart {
        fn schema() -> &'static ModelSchema {
            static SCHEMA: Lazy<ModelSchema> = Lazy::new(|| {
                ModelSchema::new(
                    "Cart",
                    vec![
                        FieldDecl::new("owner", DeclaredType::string()),
                        FieldDecl::new("count", DeclaredType::integer()),
                        FieldDecl::new(
                            "mood",
                            DeclaredType::optional(DeclaredType::literal(["calm", "busy"])),
                        ),
                        FieldDecl::new(
                            "featured",
                            DeclaredType::optional(DeclaredType::model::<Item>()),
                        ),
                        FieldDecl::new("items", DeclaredType::list_of::<Item>()),
                    ],
                )
            });
            &SCHEMA
        }
    }

    impl StateModel for Cart {}

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Tally {
        label: String,
        level: u8,
        items: Vec<Item>,
    }

    impl Model for Tally {
        fn schema() -> &'static ModelSchema {
            static SCHEMA: Lazy<ModelSchema> = Lazy::new(|| {
                ModelSchema::new(
                    "Tally",
                    vec![
                        FieldDecl::new("label", DeclaredType::string()),
                        FieldDecl::new("level", DeclaredType::integer()),
                        FieldDecl::new("items", DeclaredType::list_of::<Item>()),
                    ],
                )
            });
            &SCHEMA
        }
    }

    impl StateModel for Tally {}

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Reminder {
        due: String,
    }

    impl Model for Reminder {
        fn schema() -> &'static ModelSchema {
            static SCHEMA: Lazy<ModelSchema> = Lazy::new(|| {
                ModelSchema::new("Reminder", vec![FieldDecl::new("due", DeclaredType::datetime())])
            });
            &SCHEMA
        }
    }

    fn sample() -> Cart {
        Cart {
            owner: "ada".to_string(),
            count: 2,
            mood: Some(Mood::Busy),
            featured: Some(Item {
                name: "pear".to_string(),
                qty: 1,
            }),
            items: vec![
                Item {
                    name: "apple".to_string(),
                    qty: 3,
                },
                Item {
                    name: "fig".to_string(),
                    qty: 9,
                },
            ],
        }
    }

    #[test]
    fn test_encode_rules() {
        let data = encode(&sample()).unwrap();

        assert_eq!(data.len(), 5);
        assert_eq!(data["owner"], "\"ada\"");
        assert_eq!(data["count"], "2");
        assert_eq!(data["mood"], "busy");
        assert_eq!(data["featured"], r#"{"name":"pear","qty":1}"#);
        assert_eq!(
            data["items"],
            r#"["{\"name\":\"apple\",\"qty\":3}","{\"name\":\"fig\",\"qty\":9}"]"#
        );
    }

    #[test]
    fn test_encode_absent_and_empty() {
        let data = encode(&Cart::default()).unwrap();

        assert_eq!(data["mood"], NULL_MARKER);
        assert_eq!(data["featured"], NULL_MARKER);
        assert_eq!(data["items"], EMPTY_LIST_MARKER);
        assert_ne!(NULL_MARKER, EMPTY_LIST_MARKER);
    }

    #[test]
    fn test_round_trip() {
        let cart = sample();
        let decoded: Cart = decode(&encode(&cart).unwrap()).unwrap();
        assert_eq!(decoded, cart);
    }

    #[test]
    fn test_enumerated_tag_is_not_json_parsed() {
        let mut data = encode(&Cart::default()).unwrap();
        data.insert("mood".to_string(), "calm".to_string());

        let decoded: Cart = decode(&data).unwrap();
        assert_eq!(decoded.mood, Some(Mood::Calm));
    }

    #[test]
    fn test_unknown_tag_falls_back_to_null() {
        let mut data = encode(&sample()).unwrap();
        data.insert("mood".to_string(), "furious".to_string());

        let decoded: Cart = decode(&data).unwrap();
        assert_eq!(decoded.mood, None);
    }

    #[test]
    fn test_scalar_string_that_looks_like_a_marker_survives() {
        let cart = Cart {
            owner: "null".to_string(),
            ..Cart::default()
        };
        let data = encode(&cart).unwrap();
        assert_eq!(data["owner"], "\"null\"");

        let decoded: Cart = decode(&data).unwrap();
        assert_eq!(decoded.owner, "null");
    }

    #[test]
    fn test_corrupted_nested_payload_falls_back() {
        let mut data = encode(&sample()).unwrap();
        data.insert("featured".to_string(), "{not json".to_string());
        data.insert("items".to_string(), r#"["{\"name\":1}"]"#.to_string());

        let decoded: Cart = decode(&data).unwrap();
        assert_eq!(decoded.featured, None);
        assert!(decoded.items.is_empty());
        assert_eq!(decoded.owner, "ada");
    }

    #[test]
    fn test_null_marker_on_required_field_uses_default() {
        let mut data = encode(&sample()).unwrap();
        data.insert("count".to_string(), NULL_MARKER.to_string());

        let decoded: Cart = decode(&data).unwrap();
        assert_eq!(decoded.count, 0);
    }

    #[test]
    fn test_enumerated_field_rejects_non_string_value() {
        let obj = serde_json::json!({ "mood": 3 });
        let err = encode_object(Cart::schema(), obj.as_object().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            StateError::Shape {
                source: ShapeError::ValueMismatch { .. },
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_range_integer_falls_back() {
        let mut data = FlatMap::new();
        data.insert("level".to_string(), "300".to_string());
        data.insert("label".to_string(), "\"ada\"".to_string());

        let decoded: Tally = decode(&data).unwrap();
        assert_eq!(decoded.level, 0);
        assert_eq!(decoded.label, "ada");
    }

    #[test]
    fn test_out_of_range_nested_integer_falls_back() {
        let mut data = FlatMap::new();
        data.insert("level".to_string(), "7".to_string());
        data.insert(
            "items".to_string(),
            r#"["{\"name\":\"fig\",\"qty\":-1}"]"#.to_string(),
        );

        let decoded: Tally = decode(&data).unwrap();
        assert!(decoded.items.is_empty());
        assert_eq!(decoded.level, 7);
    }

    #[test]
    fn test_encode_rejects_value_decode_cannot_read() {
        let err = encode(&Reminder {
            due: "tomorrow".to_string(),
        })
        .unwrap_err();
        assert!(matches!(
            err,
            StateError::Shape {
                ref field,
                source: ShapeError::ValueMismatch { .. },
            } if field == "due"
        ));
    }

    #[test]
    fn test_naive_datetime_text_round_trips() {
        let reminder = Reminder {
            due: "2024-05-02T15:00:00".to_string(),
        };
        let data = encode(&reminder).unwrap();
        assert_eq!(data["due"], "\"2024-05-02T15:00:00\"");

        let obj = decode_object(Reminder::schema(), &data, Map::new()).unwrap();
        assert_eq!(obj["due"], "2024-05-02T15:00:00");
    }

    #[test]
    fn test_unsupported_shape_is_raised() {
        let schema = ModelSchema::new(
            "Tags",
            vec![FieldDecl::new("tags", DeclaredType::list(DeclaredType::string()))],
        );
        let mut data = FlatMap::new();
        data.insert("tags".to_string(), r#"["a"]"#.to_string());

        let err = decode_object(&schema, &data, Map::new()).unwrap_err();
        assert!(matches!(err, StateError::Shape { ref field, .. } if field == "tags"));
    }
}
