//! Store adapter abstractions.
//!
//! The engine never stores objects itself. It issues persist and delete
//! intents to a [`StoreAdapter`]; cascade and retry policy belong to the
//! adapter.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::descriptor::ObjectMapping;
use crate::object::Mappable;
use crate::value::FieldValue;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store adapter error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store refused the intent.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// The object is not in the store.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend error.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Other error.
    #[error("Store error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Type name plus identity value of an object.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectIdentity {
    pub type_name: String,
    pub id: FieldValue,
}

impl ObjectIdentity {
    pub fn new(type_name: impl Into<String>, id: impl Into<FieldValue>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }

    /// Read the identity of `object` as declared by `mapping`.
    ///
    /// `None` when the mapping declares no identity or the value is missing or null.
    pub fn of(object: &dyn Mappable, mapping: &ObjectMapping) -> Option<Self> {
        let attribute = mapping.identity()?;
        let id = object.get_field(attribute.field()).filter(|v| !v.is_null())?;
        Some(Self::new(object.type_name(), id))
    }
}

impl std::fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.type_name, self.id)
    }
}

impl Serialize for ObjectIdentity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("ObjectIdentity", 2)?;
        state.serialize_field("type", &self.type_name)?;
        state.serialize_field("id", &self.id.to_json(None))?;
        state.end()
    }
}

/// Persist intent payload: an object's declared fields keyed by field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreRecord {
    pub identity: Option<ObjectIdentity>,
    pub type_name: String,
    pub fields: Map<String, Value>,
}

/// Persistence capability consumed by the engine.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Persist one mapped object.
    async fn persist(&self, record: StoreRecord) -> Result<()>;

    /// Delete the object with this identity.
    async fn delete(&self, identity: &ObjectIdentity) -> Result<()>;
}

/// Adapter that accepts and discards every intent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStore;

#[async_trait]
impl StoreAdapter for NoOpStore {
    async fn persist(&self, _record: StoreRecord) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _identity: &ObjectIdentity) -> Result<()> {
        Ok(())
    }
}

/// In-memory adapter that records every intent it receives.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoreRecord>>,
    deletes: Mutex<Vec<ObjectIdentity>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records currently held, in persist order.
    pub fn records(&self) -> Vec<StoreRecord> {
        self.records.lock().clone()
    }

    /// Every delete intent received, in order.
    pub fn deletes(&self) -> Vec<ObjectIdentity> {
        self.deletes.lock().clone()
    }
}

#[async_trait]
impl StoreAdapter for MemoryStore {
    async fn persist(&self, record: StoreRecord) -> Result<()> {
        let mut records = self.records.lock();
        match &record.identity {
            Some(identity) => {
                if let Some(existing) = records
                    .iter_mut()
                    .find(|r| r.identity.as_ref() == Some(identity))
                {
                    *existing = record;
                    return Ok(());
                }
                records.push(record);
            }
            None => records.push(record),
        }
        Ok(())
    }

    async fn delete(&self, identity: &ObjectIdentity) -> Result<()> {
        self.deletes.lock().push(identity.clone());
        self.records
            .lock()
            .retain(|r| r.identity.as_ref() != Some(identity));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: i64, name: &str) -> StoreRecord {
        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(id));
        fields.insert("name".to_string(), json!(name));
        StoreRecord {
            identity: Some(ObjectIdentity::new("User", id)),
            type_name: "User".to_string(),
            fields,
        }
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound("User#1".to_string());
        assert!(err.to_string().contains("User#1"));
    }

    #[test]
    fn test_identity_display_and_json() {
        let identity = ObjectIdentity::new("Post", "abc");
        assert_eq!(identity.to_string(), "Post#abc");
        assert_eq!(
            serde_json::to_value(&identity).unwrap(),
            json!({"type": "Post", "id": "abc"})
        );
    }

    #[tokio::test]
    async fn test_memory_store_upserts_by_identity() {
        let store = MemoryStore::new();
        store.persist(record(1, "A")).await.unwrap();
        store.persist(record(2, "B")).await.unwrap();
        store.persist(record(1, "A2")).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields["name"], json!("A2"));
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryStore::new();
        store.persist(record(1, "A")).await.unwrap();
        store.delete(&ObjectIdentity::new("User", 1)).await.unwrap();

        assert!(store.records().is_empty());
        assert_eq!(store.deletes(), vec![ObjectIdentity::new("User", 1)]);
    }
}
