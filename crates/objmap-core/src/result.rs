//! Flat mapping results.
//!
//! A [`MappingResult`] owns every object produced by one mapping pass, in
//! depth-first order: each parent precedes its children, children follow their
//! parent's relation declaration order. Nesting is recorded as
//! [`ObjectIndex`] links, so no object owns another.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::descriptor::ObjectMapping;
use crate::object::Mappable;
use crate::store::{ObjectIdentity, StoreRecord};

newtype_wrapper!(
    /// Position of an object inside a [`MappingResult`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ObjectIndex(usize)
);

/// One mapped object and its links.
#[derive(Debug)]
pub struct MappedObject {
    object: Box<dyn Mappable>,
    mapping: Arc<ObjectMapping>,
    parent: Option<(ObjectIndex, String)>,
    relations: Vec<(String, Vec<ObjectIndex>)>,
    depth: usize,
}

impl MappedObject {
    pub(crate) fn new(
        object: Box<dyn Mappable>,
        mapping: Arc<ObjectMapping>,
        parent: Option<(ObjectIndex, String)>,
        depth: usize,
    ) -> Self {
        Self {
            object,
            mapping,
            parent,
            relations: Vec::new(),
            depth,
        }
    }

    pub fn object(&self) -> &dyn Mappable {
        self.object.as_ref()
    }

    pub fn into_object(self) -> Box<dyn Mappable> {
        self.object
    }

    /// Downcast the object to a concrete type.
    pub fn downcast_ref<T: Mappable>(&self) -> Option<&T> {
        self.object.as_any().downcast_ref::<T>()
    }

    pub fn type_name(&self) -> &str {
        self.object.type_name()
    }

    /// The mapping this object was built with.
    pub fn mapping(&self) -> &Arc<ObjectMapping> {
        &self.mapping
    }

    /// The parent object and the relation this object was found under.
    pub fn parent(&self) -> Option<(ObjectIndex, &str)> {
        self.parent.as_ref().map(|(idx, name)| (*idx, name.as_str()))
    }

    /// Children found under `relation`, in payload order.
    pub fn relation(&self, relation: &str) -> &[ObjectIndex] {
        self.relations
            .iter()
            .find(|(name, _)| name == relation)
            .map(|(_, children)| children.as_slice())
            .unwrap_or(&[])
    }

    /// Relation nesting depth; top-level objects are at depth 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Identity value, when the mapping declares one and the object has it.
    pub fn identity(&self) -> Option<ObjectIdentity> {
        ObjectIdentity::of(self.object.as_ref(), &self.mapping)
    }

    /// Declared attribute fields as JSON, keyed by field name.
    pub fn fields(&self) -> Map<String, Value> {
        self.mapping
            .attributes()
            .iter()
            .filter_map(|attribute| {
                let value = self.object.get_field(attribute.field())?;
                Some((attribute.field().to_string(), value.to_json(attribute.format())))
            })
            .collect()
    }

    /// `{"type": ..., "fields": {...}}` view of the object.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "type": self.type_name(),
            "fields": Value::Object(self.fields()),
        })
    }

    /// Persist intent payload for this object.
    pub fn to_record(&self) -> StoreRecord {
        StoreRecord {
            identity: self.identity(),
            type_name: self.type_name().to_string(),
            fields: self.fields(),
        }
    }

    fn link(&mut self, relation: &str, child: ObjectIndex) {
        match self.relations.iter_mut().find(|(name, _)| name == relation) {
            Some((_, children)) => children.push(child),
            None => self.relations.push((relation.to_string(), vec![child])),
        }
    }
}

/// Every object produced by one mapping pass.
#[derive(Debug, Default)]
pub struct MappingResult {
    objects: Vec<MappedObject>,
}

impl MappingResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object, linking it to its parent when it has one.
    pub(crate) fn push(&mut self, object: MappedObject) -> ObjectIndex {
        let index = ObjectIndex::new(self.objects.len());
        if let Some((parent, relation)) = object.parent.clone() {
            if let Some(parent) = self.objects.get_mut(parent.into_inner()) {
                parent.link(&relation, index);
            }
        }
        self.objects.push(object);
        index
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn get(&self, index: ObjectIndex) -> Option<&MappedObject> {
        self.objects.get(index.into_inner())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MappedObject> {
        self.objects.iter()
    }

    /// Objects that have no parent, in order.
    pub fn roots(&self) -> impl Iterator<Item = &MappedObject> {
        self.objects.iter().filter(|o| o.parent.is_none())
    }

    /// Children of `index` under `relation`.
    pub fn children(&self, index: ObjectIndex, relation: &str) -> Vec<&MappedObject> {
        self.get(index)
            .map(|parent| {
                parent
                    .relation(relation)
                    .iter()
                    .filter_map(|child| self.get(*child))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every object of concrete type `T`, in order.
    pub fn objects_of<T: Mappable>(&self) -> Vec<&T> {
        self.objects.iter().filter_map(|o| o.downcast_ref::<T>()).collect()
    }

    /// Every object whose type name is `type_name`, in order.
    pub fn of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a MappedObject> + 'a {
        self.objects.iter().filter(move |o| o.type_name() == type_name)
    }

    /// JSON array of every object, in order.
    pub fn to_json(&self) -> Value {
        Value::Array(self.objects.iter().map(MappedObject::to_json).collect())
    }

    pub fn into_objects(self) -> Vec<MappedObject> {
        self.objects
    }
}

impl IntoIterator for MappingResult {
    type Item = MappedObject;
    type IntoIter = std::vec::IntoIter<MappedObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}

impl<'a> IntoIterator for &'a MappingResult {
    type Item = &'a MappedObject;
    type IntoIter = std::slice::Iter<'a, MappedObject>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}
