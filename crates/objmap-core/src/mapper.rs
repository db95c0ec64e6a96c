//! Value mapper: one mapping applied to one payload fragment.
//!
//! The mapper builds objects from fragments and hands back the sub-fragments
//! that still need mapping. It does not recurse; the engine drives traversal so
//! that output order stays under its control.
//!
//! ## Architecture
//!
//! ```text
//!  fragment                 ValueMapper                    engine
//! ┌──────────────┐        ┌───────────────────┐        ┌──────────────┐
//! │ {id, name,   │        │ factory.create()  │ object │              │
//! │  posts: [..]}│───────▶│ coerce attributes │───────▶│ MappingResult│
//! │              │        │ collect relations │ child  │              │
//! │              │        │                   │ work   │ (recurse)    │
//! └──────────────┘        └───────────────────┘───────▶└──────────────┘
//! ```
//!
//! A fragment that is an array is mapped once per element. Missing or null
//! keys leave fields at their defaults and drop relations. Values that cannot
//! be converted are defaulted and reported to the diagnostics sink.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::descriptor::{ObjectMapping, RelationMapping};
use crate::diagnostics::{DiagnosticsSink, MappingWarning};
use crate::object::Mappable;
use crate::value::{coerce, json_kind};

/// A relation sub-fragment waiting to be mapped.
#[derive(Debug)]
pub struct ChildWork<'a> {
    /// The relation that produced this work.
    pub relation: &'a RelationMapping,
    /// Mapping to apply to the sub-fragment.
    pub mapping: Arc<ObjectMapping>,
    /// The sub-fragment under the relation key.
    pub fragment: &'a Value,
}

/// One object built from one fragment, plus its pending relations.
#[derive(Debug)]
pub struct AppliedObject<'a> {
    pub object: Box<dyn Mappable>,
    /// Relations in declaration order.
    pub children: Vec<ChildWork<'a>>,
}

/// Applies object mappings to fragments.
pub struct ValueMapper<'d> {
    diagnostics: &'d dyn DiagnosticsSink,
}

impl<'d> ValueMapper<'d> {
    pub fn new(diagnostics: &'d dyn DiagnosticsSink) -> Self {
        Self { diagnostics }
    }

    /// Apply `mapping` to `fragment`.
    ///
    /// An object fragment yields one result, an array yields one per object
    /// element, and null yields nothing. Scalars (including scalar array
    /// elements) are skipped with a warning.
    pub fn apply<'a>(&self, mapping: &'a Arc<ObjectMapping>, fragment: &'a Value) -> Vec<AppliedObject<'a>> {
        match fragment {
            Value::Object(map) => vec![self.apply_one(mapping, map)],
            Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(self.apply_one(mapping, map)),
                    Value::Null => None,
                    other => {
                        self.unexpected(mapping, other);
                        None
                    }
                })
                .collect(),
            Value::Null => Vec::new(),
            other => {
                self.unexpected(mapping, other);
                Vec::new()
            }
        }
    }

    fn apply_one<'a>(&self, mapping: &'a Arc<ObjectMapping>, map: &'a Map<String, Value>) -> AppliedObject<'a> {
        let mut object = mapping.factory().create();

        for attribute in mapping.attributes() {
            let field = attribute.field();
            let raw = attribute.key().resolve_in(map).filter(|v| !v.is_null());

            let Some(raw) = raw else {
                self.default_field(mapping, object.as_mut(), field, attribute.attribute_type());
                continue;
            };

            match coerce(raw, attribute.attribute_type(), attribute.format()) {
                Some(value) => {
                    if let Err(e) = object.set_field(field, value) {
                        self.diagnostics.warn(MappingWarning::FieldRejected {
                            type_name: mapping.type_name().to_string(),
                            field: field.to_string(),
                            reason: e.to_string(),
                        });
                        self.default_field(mapping, object.as_mut(), field, attribute.attribute_type());
                    }
                }
                None => {
                    self.diagnostics.warn(MappingWarning::CoercionFailed {
                        type_name: mapping.type_name().to_string(),
                        key: attribute.key().to_string(),
                        expected: attribute.attribute_type(),
                        found: json_kind(raw),
                    });
                    self.default_field(mapping, object.as_mut(), field, attribute.attribute_type());
                }
            }
        }

        let children = mapping
            .relations()
            .iter()
            .filter_map(|relation| {
                let fragment = relation.key().resolve_in(map).filter(|v| !v.is_null())?;
                Some(ChildWork {
                    relation,
                    mapping: relation.resolve(mapping),
                    fragment,
                })
            })
            .collect();

        AppliedObject { object, children }
    }

    fn default_field(
        &self,
        mapping: &ObjectMapping,
        object: &mut dyn Mappable,
        field: &str,
        attribute_type: crate::value::AttributeType,
    ) {
        if let Err(e) = object.default_field(field, attribute_type) {
            self.diagnostics.warn(MappingWarning::FieldRejected {
                type_name: mapping.type_name().to_string(),
                field: field.to_string(),
                reason: e.to_string(),
            });
        }
    }

    fn unexpected(&self, mapping: &ObjectMapping, fragment: &Value) {
        self.diagnostics.warn(MappingWarning::UnexpectedFragment {
            type_name: mapping.type_name().to_string(),
            found: json_kind(fragment),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::object::{DynamicObject, ObjectFactory};
    use crate::value::{AttributeType, FieldValue};
    use serde_json::json;

    fn post_mapping() -> Arc<ObjectMapping> {
        ObjectMapping::builder(ObjectFactory::dynamic("Post"))
            .field("id", AttributeType::Integer)
            .field("title", AttributeType::String)
            .build()
            .unwrap()
    }

    fn user_mapping() -> Arc<ObjectMapping> {
        ObjectMapping::builder(ObjectFactory::dynamic("User"))
            .field("id", AttributeType::Integer)
            .field("name", AttributeType::String)
            .attribute("profile.age", "age", AttributeType::Integer)
            .relation("posts", post_mapping())
            .build()
            .unwrap()
    }

    fn field(applied: &AppliedObject<'_>, name: &str) -> Option<FieldValue> {
        applied.object.get_field(name)
    }

    #[test]
    fn test_apply_object_fragment() {
        let sink = CollectingDiagnostics::new();
        let mapper = ValueMapper::new(&sink);
        let mapping = user_mapping();
        let fragment = json!({
            "id": "1",
            "name": "Ada",
            "profile": {"age": 36},
            "posts": [{"id": 10, "title": "X"}],
            "ignored": true
        });

        let applied = mapper.apply(&mapping, &fragment);
        assert_eq!(applied.len(), 1);
        assert_eq!(field(&applied[0], "id"), Some(FieldValue::Integer(1)));
        assert_eq!(field(&applied[0], "name"), Some(FieldValue::from("Ada")));
        assert_eq!(field(&applied[0], "age"), Some(FieldValue::Integer(36)));
        assert_eq!(field(&applied[0], "ignored"), None);

        assert_eq!(applied[0].children.len(), 1);
        assert_eq!(applied[0].children[0].relation.name(), "posts");
        assert_eq!(applied[0].children[0].fragment, &json!([{"id": 10, "title": "X"}]));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_apply_array_fragment() {
        let sink = CollectingDiagnostics::new();
        let mapper = ValueMapper::new(&sink);
        let mapping = post_mapping();
        let fragment = json!([{"id": 1}, null, {"id": 2}, "stray"]);

        let applied = mapper.apply(&mapping, &fragment);
        let ids: Vec<_> = applied.iter().map(|a| field(a, "id")).collect();
        assert_eq!(ids, vec![Some(FieldValue::Integer(1)), Some(FieldValue::Integer(2))]);

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            warnings[0],
            MappingWarning::UnexpectedFragment { found: "string", .. }
        ));
    }

    #[test]
    fn test_missing_keys_default_without_warning() {
        let sink = CollectingDiagnostics::new();
        let mapper = ValueMapper::new(&sink);
        let mapping = user_mapping();
        let fragment = json!({"id": 1, "name": null, "posts": null});

        let applied = mapper.apply(&mapping, &fragment);
        let object = applied[0].object.downcast_ref::<DynamicObject>().unwrap();
        assert_eq!(object.get("name"), Some(&FieldValue::from("")));
        assert_eq!(object.get("age"), Some(&FieldValue::Integer(0)));
        assert!(applied[0].children.is_empty());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_coercion_failure_defaults_and_warns() {
        let sink = CollectingDiagnostics::new();
        let mapper = ValueMapper::new(&sink);
        let mapping = user_mapping();
        let fragment = json!({"id": "abc", "name": "Ada"});

        let applied = mapper.apply(&mapping, &fragment);
        assert_eq!(field(&applied[0], "id"), Some(FieldValue::Integer(0)));
        assert_eq!(field(&applied[0], "name"), Some(FieldValue::from("Ada")));

        let warnings = sink.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            MappingWarning::CoercionFailed { key, expected: AttributeType::Integer, found: "string", .. } if key == "id"
        ));
    }

    #[test]
    fn test_scalar_fragment_is_skipped() {
        let sink = CollectingDiagnostics::new();
        let mapper = ValueMapper::new(&sink);
        let mapping = post_mapping();

        assert!(mapper.apply(&mapping, &json!(42)).is_empty());
        assert!(mapper.apply(&mapping, &Value::Null).is_empty());
        assert_eq!(sink.len(), 1);
    }
}
