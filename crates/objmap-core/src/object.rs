//! Target objects and how the mapper talks to them.
//!
//! The mapper never inspects concrete types. It builds objects through an
//! [`ObjectFactory`] and reads or writes fields by name through the
//! [`Mappable`] capability trait. Plain structs implement it with
//! [`impl_mappable!`](crate::impl_mappable); [`DynamicObject`] covers
//! configuration-driven use where no Rust type exists.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::value::{AttributeType, FieldValue};

/// Errors returned by [`Mappable::set_field`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// The object has no field with this name.
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// The value does not fit the field's type.
    #[error("Field '{field}' expects {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
    },
}

/// Get/set-by-name access to a mapped object.
pub trait Mappable: Send + Sync + std::fmt::Debug + 'static {
    /// Name of the target type, matched against descriptor mappings.
    fn type_name(&self) -> &str;

    /// Read a field. `None` when the object has no such field.
    fn get_field(&self, field: &str) -> Option<FieldValue>;

    /// Write a field.
    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FieldError>;

    /// Called when the payload carries no usable value for `field`.
    ///
    /// Freshly built objects already hold their defaults, so the provided
    /// implementation leaves the field untouched.
    fn default_field(&mut self, _field: &str, _attribute_type: AttributeType) -> Result<(), FieldError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
}

impl dyn Mappable {
    /// Downcast to a concrete type.
    pub fn downcast_ref<T: Mappable>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Builds empty target objects for a mapping.
#[derive(Clone)]
pub struct ObjectFactory {
    create: Arc<dyn Fn() -> Box<dyn Mappable> + Send + Sync>,
}

impl ObjectFactory {
    /// Factory from an arbitrary constructor.
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> Box<dyn Mappable> + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(create),
        }
    }

    /// Factory producing `T::default()`.
    pub fn of<T: Mappable + Default>() -> Self {
        Self::new(|| Box::new(T::default()))
    }

    /// Factory producing empty [`DynamicObject`]s of the given type name.
    pub fn dynamic(type_name: impl Into<String>) -> Self {
        let type_name: String = type_name.into();
        Self::new(move || Box::new(DynamicObject::new(type_name.clone())))
    }

    pub fn create(&self) -> Box<dyn Mappable> {
        (self.create)()
    }
}

impl std::fmt::Debug for ObjectFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectFactory").finish_non_exhaustive()
    }
}

/// A schemaless object: any field can be written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DynamicObject {
    type_name: String,
    fields: BTreeMap<String, FieldValue>,
}

impl DynamicObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Build from a JSON object, inferring each field's value from its shape.
    pub fn from_json(type_name: impl Into<String>, fields: &Map<String, Value>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
                .collect(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json(None)))
                .collect(),
        )
    }
}

impl Mappable for DynamicObject {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get_field(&self, field: &str) -> Option<FieldValue> {
        self.fields.get(field).cloned()
    }

    fn set_field(&mut self, field: &str, value: FieldValue) -> Result<(), FieldError> {
        self.fields.insert(field.to_string(), value);
        Ok(())
    }

    fn default_field(&mut self, field: &str, attribute_type: AttributeType) -> Result<(), FieldError> {
        self.fields
            .insert(field.to_string(), attribute_type.default_value());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dynamic_object_fields() {
        let mut obj = DynamicObject::new("User");
        obj.set_field("name", FieldValue::from("Ada")).unwrap();
        obj.default_field("age", AttributeType::Integer).unwrap();

        assert_eq!(obj.type_name(), "User");
        assert_eq!(obj.get_field("name"), Some(FieldValue::from("Ada")));
        assert_eq!(obj.get_field("age"), Some(FieldValue::Integer(0)));
        assert_eq!(obj.get_field("email"), None);
        assert_eq!(obj.to_json(), json!({"name": "Ada", "age": 0}));
    }

    #[test]
    fn test_dynamic_object_from_json() {
        let raw = json!({"id": 3, "ratio": 0.5, "tags": ["a"], "active": true});
        let obj = DynamicObject::from_json("Item", raw.as_object().unwrap());

        assert_eq!(obj.get("id"), Some(&FieldValue::Integer(3)));
        assert_eq!(obj.get("ratio"), Some(&FieldValue::Float(0.5)));
        assert_eq!(obj.get("tags"), Some(&FieldValue::Json(json!(["a"]))));
        assert_eq!(obj.get("active"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn test_factory_and_downcast() {
        let factory = ObjectFactory::dynamic("Post");
        let obj = factory.create();
        assert_eq!(obj.type_name(), "Post");

        let concrete = obj.downcast_ref::<DynamicObject>().unwrap();
        assert!(concrete.fields().is_empty());
    }
}
