//! Mapping descriptors.
//!
//! An [`ObjectMapping`] says how one payload fragment becomes one object: which
//! keys feed which fields, which keys hold embedded relations and how those are
//! mapped in turn. A [`MappingDescriptor`] binds a top-level object mapping to
//! a `(path pattern, method)` route and an optional envelope key path.
//!
//! Both are validated when built; a built descriptor is immutable and shared
//! behind `Arc`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{RegistrationError, RegistrationResult};
use crate::keypath::KeyPath;
use crate::method::Method;
use crate::object::ObjectFactory;
use crate::path::PathPattern;
use crate::value::{is_valid_date_format, AttributeType};

/// One payload key copied into one object field.
#[derive(Debug, Clone)]
pub struct AttributeMapping {
    key: KeyPath,
    field: String,
    attribute_type: AttributeType,
    format: Option<String>,
}

impl AttributeMapping {
    pub fn new(key: &str, field: &str, attribute_type: AttributeType) -> RegistrationResult<Self> {
        let key = KeyPath::parse(key)?;
        if field.trim().is_empty() {
            return Err(RegistrationError::EmptyAttributeField {
                key: key.to_string(),
            });
        }
        Ok(Self {
            key,
            field: field.to_string(),
            attribute_type,
            format: None,
        })
    }

    /// Date format used to parse and render this attribute.
    pub fn with_format(mut self, format: &str) -> RegistrationResult<Self> {
        if !is_valid_date_format(format) {
            return Err(RegistrationError::InvalidDateFormat {
                key: self.key.to_string(),
                format: format.to_string(),
            });
        }
        self.format = Some(format.to_string());
        Ok(self)
    }

    pub fn key(&self) -> &KeyPath {
        &self.key
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn attribute_type(&self) -> AttributeType {
        self.attribute_type
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }
}

/// What a relation's sub-fragment is mapped with.
#[derive(Debug, Clone)]
pub enum RelationTarget {
    /// A separate nested mapping.
    Mapping(Arc<ObjectMapping>),
    /// The enclosing mapping itself, for tree-shaped payloads.
    Recursive,
}

/// An embedded relation: the sub-fragment under `key` mapped with `target`.
#[derive(Debug, Clone)]
pub struct RelationMapping {
    key: KeyPath,
    name: String,
    target: RelationTarget,
}

impl RelationMapping {
    pub fn key(&self) -> &KeyPath {
        &self.key
    }

    /// Relation name used for links in the mapping result.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &RelationTarget {
        &self.target
    }

    /// The mapping to apply, given the mapping that declares this relation.
    pub fn resolve(&self, parent: &Arc<ObjectMapping>) -> Arc<ObjectMapping> {
        match &self.target {
            RelationTarget::Mapping(mapping) => Arc::clone(mapping),
            RelationTarget::Recursive => Arc::clone(parent),
        }
    }
}

/// How one fragment becomes one object.
#[derive(Debug)]
pub struct ObjectMapping {
    type_name: String,
    factory: ObjectFactory,
    attributes: Vec<AttributeMapping>,
    relations: Vec<RelationMapping>,
    identity: Option<String>,
}

impl ObjectMapping {
    /// Start a mapping whose objects come from `factory`.
    ///
    /// The type name is taken from a probe object built by the factory.
    pub fn builder(factory: ObjectFactory) -> ObjectMappingBuilder {
        let type_name = factory.create().type_name().to_string();
        ObjectMappingBuilder {
            type_name,
            factory,
            attributes: Vec::new(),
            relations: Vec::new(),
            identity: None,
            error: None,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn factory(&self) -> &ObjectFactory {
        &self.factory
    }

    /// Attributes in declaration order.
    pub fn attributes(&self) -> &[AttributeMapping] {
        &self.attributes
    }

    /// Relations in declaration order; children are emitted in this order.
    pub fn relations(&self) -> &[RelationMapping] {
        &self.relations
    }

    /// The attribute declared as identity, if any.
    pub fn identity(&self) -> Option<&AttributeMapping> {
        let field = self.identity.as_deref()?;
        self.attributes.iter().find(|a| a.field == field)
    }
}

/// Builder for [`ObjectMapping`]. The first configuration error is kept and
/// returned from [`build`](Self::build).
#[derive(Debug)]
pub struct ObjectMappingBuilder {
    type_name: String,
    factory: ObjectFactory,
    attributes: Vec<AttributeMapping>,
    relations: Vec<RelationMapping>,
    identity: Option<String>,
    error: Option<RegistrationError>,
}

impl ObjectMappingBuilder {
    /// Map payload `key` to a field of the same name.
    pub fn field(self, key: &str, attribute_type: AttributeType) -> Self {
        self.attribute(key, key, attribute_type)
    }

    /// Map payload `key` to `field`.
    pub fn attribute(mut self, key: &str, field: &str, attribute_type: AttributeType) -> Self {
        match AttributeMapping::new(key, field, attribute_type) {
            Ok(attribute) => self.attributes.push(attribute),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Map a date attribute using an explicit format.
    pub fn date(mut self, key: &str, field: &str, format: &str) -> Self {
        match AttributeMapping::new(key, field, AttributeType::Date).and_then(|a| a.with_format(format)) {
            Ok(attribute) => self.attributes.push(attribute),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Add a prepared attribute mapping.
    pub fn attribute_mapping(mut self, attribute: AttributeMapping) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Embed a relation under `key`, named after the key.
    pub fn relation(self, key: &str, mapping: Arc<ObjectMapping>) -> Self {
        self.named_relation(key, key, RelationTarget::Mapping(mapping))
    }

    /// Embed a relation mapped with this same mapping.
    pub fn recursive_relation(self, key: &str) -> Self {
        self.named_relation(key, key, RelationTarget::Recursive)
    }

    /// Embed a relation under `key` with an explicit relation name.
    pub fn named_relation(mut self, key: &str, name: &str, target: RelationTarget) -> Self {
        match KeyPath::parse(key) {
            Ok(key) => self.relations.push(RelationMapping {
                key,
                name: name.to_string(),
                target,
            }),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Declare which field identifies an object for store intents.
    pub fn identity(mut self, field: &str) -> Self {
        self.identity = Some(field.to_string());
        self
    }

    pub fn build(self) -> RegistrationResult<Arc<ObjectMapping>> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let mut fields = HashSet::new();
        for attribute in &self.attributes {
            if !fields.insert(attribute.field.as_str()) {
                return Err(RegistrationError::DuplicateField {
                    type_name: self.type_name.clone(),
                    field: attribute.field.clone(),
                });
            }
        }

        let mut keys = HashSet::new();
        for relation in &self.relations {
            if !keys.insert(relation.key.to_string()) {
                return Err(RegistrationError::DuplicateRelationKey {
                    type_name: self.type_name.clone(),
                    key: relation.key.to_string(),
                });
            }
        }

        if let Some(identity) = &self.identity {
            if !fields.contains(identity.as_str()) {
                return Err(RegistrationError::UnknownIdentityField {
                    type_name: self.type_name.clone(),
                    field: identity.clone(),
                });
            }
        }

        Ok(Arc::new(ObjectMapping {
            type_name: self.type_name,
            factory: self.factory,
            attributes: self.attributes,
            relations: self.relations,
            identity: self.identity,
        }))
    }

    fn fail(&mut self, error: RegistrationError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

/// A top-level mapping bound to a route.
#[derive(Debug, Clone)]
pub struct MappingDescriptor {
    pattern: PathPattern,
    method: Method,
    root_key_path: Option<KeyPath>,
    mapping: Arc<ObjectMapping>,
}

impl MappingDescriptor {
    /// Bind `mapping` to `(method, pattern)` with the payload root as fragment.
    pub fn new(method: Method, pattern: &str, mapping: Arc<ObjectMapping>) -> RegistrationResult<Self> {
        Ok(Self {
            pattern: PathPattern::parse(pattern)?,
            method,
            root_key_path: None,
            mapping,
        })
    }

    /// Read the root fragment from `key_path` (an envelope key) instead of the payload root.
    pub fn with_root_key_path(mut self, key_path: &str) -> RegistrationResult<Self> {
        self.root_key_path = Some(KeyPath::parse(key_path)?);
        Ok(self)
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn root_key_path(&self) -> Option<&KeyPath> {
        self.root_key_path.as_ref()
    }

    pub fn mapping(&self) -> &Arc<ObjectMapping> {
        &self.mapping
    }

    pub fn type_name(&self) -> &str {
        self.mapping.type_name()
    }
}

impl std::fmt::Display for MappingDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} -> {}", self.method, self.pattern, self.mapping.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_mapping() -> Arc<ObjectMapping> {
        ObjectMapping::builder(ObjectFactory::dynamic("Post"))
            .field("id", AttributeType::Integer)
            .field("title", AttributeType::String)
            .identity("id")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_keeps_declaration_order() {
        let mapping = ObjectMapping::builder(ObjectFactory::dynamic("User"))
            .field("id", AttributeType::Integer)
            .attribute("profile.name", "name", AttributeType::String)
            .relation("posts", post_mapping())
            .recursive_relation("friends")
            .build()
            .unwrap();

        assert_eq!(mapping.type_name(), "User");
        let fields: Vec<_> = mapping.attributes().iter().map(|a| a.field()).collect();
        assert_eq!(fields, vec!["id", "name"]);
        let relations: Vec<_> = mapping.relations().iter().map(|r| r.name()).collect();
        assert_eq!(relations, vec!["posts", "friends"]);
    }

    #[test]
    fn test_recursive_relation_resolves_to_parent() {
        let mapping = ObjectMapping::builder(ObjectFactory::dynamic("Node"))
            .field("id", AttributeType::Integer)
            .recursive_relation("children")
            .build()
            .unwrap();

        let resolved = mapping.relations()[0].resolve(&mapping);
        assert!(Arc::ptr_eq(&resolved, &mapping));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = ObjectMapping::builder(ObjectFactory::dynamic("User"))
            .field("id", AttributeType::Integer)
            .attribute("user_id", "id", AttributeType::Integer)
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateField { .. }));
    }

    #[test]
    fn test_duplicate_relation_key_rejected() {
        let err = ObjectMapping::builder(ObjectFactory::dynamic("User"))
            .relation("posts", post_mapping())
            .relation("posts", post_mapping())
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateRelationKey { .. }));
    }

    #[test]
    fn test_unknown_identity_rejected() {
        let err = ObjectMapping::builder(ObjectFactory::dynamic("User"))
            .field("name", AttributeType::String)
            .identity("id")
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::UnknownIdentityField { .. }));
    }

    #[test]
    fn test_first_error_wins() {
        let err = ObjectMapping::builder(ObjectFactory::dynamic("User"))
            .field("", AttributeType::Integer)
            .date("born", "born", "%Q")
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidKeyPath(_)));
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let err = AttributeMapping::new("born", "born", AttributeType::Date)
            .unwrap()
            .with_format("%Q")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidDateFormat { .. }));
    }

    #[test]
    fn test_descriptor_validation() {
        assert!(MappingDescriptor::new(Method::Get, "users", post_mapping()).is_err());

        let descriptor = MappingDescriptor::new(Method::Get, "/posts", post_mapping())
            .unwrap()
            .with_root_key_path("data.posts")
            .unwrap();
        assert_eq!(descriptor.root_key_path().unwrap().to_string(), "data.posts");
        assert_eq!(descriptor.to_string(), "GET /posts -> Post");

        assert!(MappingDescriptor::new(Method::Get, "/posts", post_mapping())
            .unwrap()
            .with_root_key_path("data..posts")
            .is_err());
    }
}
