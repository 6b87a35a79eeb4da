// SPDX-License-Identifier: MIT

//! Shape inspection for declared field types

use super::codec::{EMPTY_LIST_MARKER, NULL_MARKER};
use super::schema::{DeclaredType, ScalarKind, SchemaRef};
use crate::error::ShapeError;

/// Structural category of a top-level field
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeCategory {
    Scalar(ScalarKind),
    Enumerated(Vec<String>),
    Nested(SchemaRef),
    ListOfNested(SchemaRef),
}

/// Category plus the orthogonal optionality flag
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub category: ShapeCategory,
    pub optional: bool,
}

impl Shape {
    fn required(category: ShapeCategory) -> Self {
        Self {
            category,
            optional: false,
        }
    }
}

/// Classify a declared type.
///
/// Optional wrappers are peeled and reported through `Shape::optional`.
/// Lists are only representable when their element is a structured model.
pub fn inspect(declared: &DeclaredType) -> Result<Shape, ShapeError> {
    match declared {
        DeclaredType::Optional(inner) => {
            let mut shape = inspect(inner)?;
            shape.optional = true;
            Ok(shape)
        }
        DeclaredType::Scalar(kind) => Ok(Shape::required(ShapeCategory::Scalar(*kind))),
        DeclaredType::Literal(tags) => {
            if tags.is_empty() {
                return Err(ShapeError::EmptyLiteral);
            }
            if let Some(tag) = tags
                .iter()
                .find(|t| t.as_str() == NULL_MARKER || t.as_str() == EMPTY_LIST_MARKER)
            {
                return Err(ShapeError::ReservedTag(tag.clone()));
            }
            Ok(Shape::required(ShapeCategory::Enumerated(tags.clone())))
        }
        DeclaredType::Model(schema) => Ok(Shape::required(ShapeCategory::Nested(*schema))),
        DeclaredType::List(element) => match element.as_ref() {
            DeclaredType::Model(schema) => {
                Ok(Shape::required(ShapeCategory::ListOfNested(*schema)))
            }
            other => Err(ShapeError::UnsupportedListElement(other.describe())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::schema::{FieldDecl, Model, ModelSchema};
    use once_cell::sync::Lazy;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    impl Model for Note {
        fn schema() -> &'static ModelSchema {
            static SCHEMA: Lazy<ModelSchema> = Lazy::new(|| {
                ModelSchema::new("Note", vec![FieldDecl::new("text", DeclaredType::string())])
            });
            &SCHEMA
        }
    }

    #[test]
    fn test_scalar() {
        let shape = inspect(&DeclaredType::integer()).unwrap();
        assert_eq!(shape.category, ShapeCategory::Scalar(ScalarKind::Integer));
        assert!(!shape.optional);
    }

    #[test]
    fn test_optional_is_a_flag() {
        let shape = inspect(&DeclaredType::optional(DeclaredType::string())).unwrap();
        assert_eq!(shape.category, ShapeCategory::Scalar(ScalarKind::String));
        assert!(shape.optional);
    }

    #[test]
    fn test_nested_optional_collapses() {
        let declared =
            DeclaredType::optional(DeclaredType::optional(DeclaredType::model::<Note>()));
        let shape = inspect(&declared).unwrap();
        assert_eq!(shape.category, ShapeCategory::Nested(SchemaRef::of::<Note>()));
        assert!(shape.optional);
    }

    #[test]
    fn test_enumerated() {
        let shape = inspect(&DeclaredType::literal(["open", "closed"])).unwrap();
        assert_eq!(
            shape.category,
            ShapeCategory::Enumerated(vec!["open".to_string(), "closed".to_string()])
        );
    }

    #[test]
    fn test_list_of_nested() {
        let shape = inspect(&DeclaredType::optional(DeclaredType::list_of::<Note>())).unwrap();
        assert_eq!(
            shape.category,
            ShapeCategory::ListOfNested(SchemaRef::of::<Note>())
        );
        assert!(shape.optional);
    }

    #[test]
    fn test_list_of_scalars_is_unsupported() {
        let err = inspect(&DeclaredType::list(DeclaredType::string())).unwrap_err();
        assert_eq!(err, ShapeError::UnsupportedListElement("string".to_string()));
    }

    #[test]
    fn test_list_of_optional_models_is_unsupported() {
        let declared = DeclaredType::list(DeclaredType::optional(DeclaredType::model::<Note>()));
        assert!(matches!(
            inspect(&declared),
            Err(ShapeError::UnsupportedListElement(_))
        ));
    }

    #[test]
    fn test_nested_lists_are_unsupported() {
        let declared = DeclaredType::list(DeclaredType::list_of::<Note>());
        assert_eq!(
            inspect(&declared).unwrap_err(),
            ShapeError::UnsupportedListElement("list<Note>".to_string())
        );
    }

    #[test]
    fn test_literal_rejects_reserved_markers() {
        assert_eq!(
            inspect(&DeclaredType::literal(["ok", "null"])).unwrap_err(),
            ShapeError::ReservedTag("null".to_string())
        );
        assert_eq!(
            inspect(&DeclaredType::literal(["[]"])).unwrap_err(),
            ShapeError::ReservedTag("[]".to_string())
        );
    }

    #[test]
    fn test_empty_literal() {
        let tags: Vec<String> = vec![];
        assert_eq!(
            inspect(&DeclaredType::literal(tags)).unwrap_err(),
            ShapeError::EmptyLiteral
        );
    }

    #[test]
    fn test_deterministic() {
        let declared = DeclaredType::list_of::<Note>();
        assert_eq!(inspect(&declared), inspect(&declared));
    }
}
