//! Mapping engine.
//!
//! The engine selects descriptors for a request, walks the response payload
//! depth-first and collects every mapped object into one flat
//! [`MappingResult`]. It also maps objects back into request payloads and
//! issues store intents.
//!
//! # Delivery
//!
//! Every form of `map_response` validates the request on the caller's thread
//! and then runs one complete pass; results are never delivered partially.
//!
//! - [`MappingEngine::map_response`] returns a future. With
//!   [`EngineConfig::offload`] set, the pass runs on tokio's blocking pool and
//!   the result is delivered to the awaiting task.
//! - [`MappingEngine::map_response_with`] invokes the completion exactly once,
//!   on the blocking-pool worker that ran the pass.
//! - [`MappingEngine::map_response_sync`] runs the pass on the caller's thread.
//!
//! A started pass cannot be cancelled. Dropping the future discards the result.
//!
//! The engine keeps no per-call state; the registry is the only shared state.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::descriptor::{MappingDescriptor, ObjectMapping};
use crate::diagnostics::{DiagnosticsSink, MappingWarning, TracingDiagnostics};
use crate::error::{MappingError, Result};
use crate::mapper::ValueMapper;
use crate::method::Method;
use crate::object::Mappable;
use crate::registry::DescriptorRegistry;
use crate::result::{MappedObject, MappingResult, ObjectIndex};
use crate::store::{NoOpStore, ObjectIdentity, StoreAdapter};
use crate::transport::{Request, Response};

/// Outcome of [`MappingEngine::delete_object_from_store`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// A delete intent was issued for this identity.
    Deleted(ObjectIdentity),
    /// No descriptor for the request maps the object's type; nothing was issued.
    Unmapped,
}

/// Maps responses to objects and objects to request payloads.
#[derive(Clone)]
pub struct MappingEngine {
    registry: Arc<DescriptorRegistry>,
    store: Arc<dyn StoreAdapter>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    config: EngineConfig,
}

impl MappingEngine {
    /// Engine with a no-op store, tracing diagnostics and default config.
    pub fn new(registry: Arc<DescriptorRegistry>) -> Self {
        Self {
            registry,
            store: Arc::new(NoOpStore),
            diagnostics: Arc::new(TracingDiagnostics),
            config: EngineConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<dyn StoreAdapter>) -> Self {
        self.store = store;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<DescriptorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether at least one descriptor applies to the request.
    pub fn can_map_request_response(&self, request: &Request) -> bool {
        self.registry.can_map(request)
    }

    /// Map a response, delivering the complete result to the awaiting task.
    ///
    /// Fails only for an invalid request (checked before any work is
    /// scheduled) or if the worker running the pass dies.
    pub async fn map_response(&self, response: &Response, request: &Request) -> Result<MappingResult> {
        request.validate()?;
        if !self.config.offload {
            return Ok(self.run_pass(response, request));
        }

        let engine = self.clone();
        let response = response.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || engine.run_pass(&response, &request))
            .await
            .map_err(|e| MappingError::Worker(e.to_string()))
    }

    /// Map a response and hand the result to `completion`.
    ///
    /// The request is validated before anything is scheduled. `completion`
    /// runs exactly once, on the blocking-pool worker that ran the pass.
    /// Requires a tokio runtime.
    pub fn map_response_with<F>(&self, response: &Response, request: &Request, completion: F) -> Result<JoinHandle<()>>
    where
        F: FnOnce(MappingResult) + Send + 'static,
    {
        request.validate()?;
        let handle = tokio::runtime::Handle::try_current().map_err(|e| MappingError::Runtime(e.to_string()))?;

        let engine = self.clone();
        let response = response.clone();
        let request = request.clone();
        Ok(handle.spawn_blocking(move || {
            let result = engine.run_pass(&response, &request);
            completion(result);
        }))
    }

    /// Map a response on the caller's thread.
    pub fn map_response_sync(&self, response: &Response, request: &Request) -> Result<MappingResult> {
        request.validate()?;
        Ok(self.run_pass(response, request))
    }

    /// Map `object` into a request payload using the descriptor for `(path, method)`.
    ///
    /// Attribute keys are written as in the payload; dotted keys become
    /// nested objects. Relations are not written. An unmapped route yields an
    /// empty mapping.
    pub fn map_object(&self, object: &dyn Mappable, path: &str, method: Method) -> Map<String, Value> {
        let descriptors = self.registry.descriptors_for(path, method);
        let Some(descriptor) = select_for_type(&descriptors, object.type_name()).or(descriptors.first()) else {
            tracing::debug!(%method, path, "No descriptor to serialize object with");
            return Map::new();
        };

        let mut payload = Map::new();
        for attribute in descriptor.mapping().attributes() {
            if let Some(value) = object.get_field(attribute.field()) {
                attribute
                    .key()
                    .insert(&mut payload, value.to_json(attribute.format()));
            }
        }
        payload
    }

    /// Issue a delete intent for `object`.
    ///
    /// The descriptor is resolved from the request's path and method, then
    /// narrowed to the one whose mapping targets the object's type. Its
    /// identity attribute supplies the identity sent to the store. Store
    /// failures are returned unchanged.
    pub async fn delete_object_from_store(&self, object: &dyn Mappable, request: &Request) -> Result<DeleteOutcome> {
        request.validate()?;

        let descriptors = self.registry.descriptors_for(request.path(), request.method());
        let Some(descriptor) = select_for_type(&descriptors, object.type_name()) else {
            tracing::warn!(
                method = %request.method(),
                path = request.path(),
                type_name = object.type_name(),
                "No descriptor maps object type; delete skipped"
            );
            return Ok(DeleteOutcome::Unmapped);
        };

        let identity = ObjectIdentity::of(object, descriptor.mapping()).ok_or_else(|| MappingError::MissingIdentity {
            type_name: object.type_name().to_string(),
        })?;

        self.store.delete(&identity).await?;
        tracing::debug!(identity = %identity, "Delete intent issued");
        Ok(DeleteOutcome::Deleted(identity))
    }

    /// Issue one persist intent per object, in result order.
    ///
    /// Stops at the first store failure and returns it unchanged. Returns the
    /// number of objects persisted.
    pub async fn persist_result(&self, result: &MappingResult) -> Result<usize> {
        let mut persisted = 0;
        for mapped in result {
            self.store.persist(mapped.to_record()).await?;
            persisted += 1;
        }
        Ok(persisted)
    }

    fn run_pass(&self, response: &Response, request: &Request) -> MappingResult {
        let mut result = MappingResult::new();
        let descriptors = self.registry.descriptors_for(request.path(), request.method());
        if descriptors.is_empty() {
            tracing::debug!(method = %request.method(), path = request.path(), "No descriptors for request");
            return result;
        }

        let payload = response.payload();
        for descriptor in &descriptors {
            let root = match descriptor.root_key_path() {
                Some(key_path) => match key_path.resolve(payload) {
                    Some(fragment) => fragment,
                    None => {
                        tracing::debug!(descriptor = %descriptor, root = %key_path, "Root key absent");
                        continue;
                    }
                },
                None => payload,
            };

            let before = result.len();
            self.map_fragment(descriptor.mapping(), root, None, 0, &mut result);
            tracing::debug!(descriptor = %descriptor, objects = result.len() - before, "Descriptor applied");
        }
        result
    }

    fn map_fragment(
        &self,
        mapping: &Arc<ObjectMapping>,
        fragment: &Value,
        parent: Option<(ObjectIndex, &str)>,
        depth: usize,
        result: &mut MappingResult,
    ) {
        if depth > self.config.max_depth {
            self.diagnostics.warn(MappingWarning::DepthLimitReached {
                type_name: mapping.type_name().to_string(),
                depth,
            });
            return;
        }

        let mapper = ValueMapper::new(self.diagnostics.as_ref());
        for applied in mapper.apply(mapping, fragment) {
            let index = result.push(MappedObject::new(
                applied.object,
                Arc::clone(mapping),
                parent.map(|(idx, relation)| (idx, relation.to_string())),
                depth,
            ));

            for work in applied.children {
                self.map_fragment(
                    &work.mapping,
                    work.fragment,
                    Some((index, work.relation.name())),
                    depth + 1,
                    result,
                );
            }
        }
    }
}

impl std::fmt::Debug for MappingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingEngine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn select_for_type<'a>(descriptors: &'a [Arc<MappingDescriptor>], type_name: &str) -> Option<&'a Arc<MappingDescriptor>> {
    descriptors.iter().find(|d| d.type_name() == type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::object::{DynamicObject, ObjectFactory};
    use crate::store::MemoryStore;
    use crate::value::{AttributeType, FieldValue};
    use serde_json::json;

    fn node_mapping() -> Arc<ObjectMapping> {
        ObjectMapping::builder(ObjectFactory::dynamic("Node"))
            .field("id", AttributeType::Integer)
            .recursive_relation("children")
            .identity("id")
            .build()
            .unwrap()
    }

    fn engine_with(registry: DescriptorRegistry, config: EngineConfig) -> (MappingEngine, Arc<CollectingDiagnostics>) {
        let sink = Arc::new(CollectingDiagnostics::new());
        let engine = MappingEngine::new(Arc::new(registry))
            .with_diagnostics(sink.clone())
            .with_config(config);
        (engine, sink)
    }

    fn ids(result: &MappingResult) -> Vec<i64> {
        result
            .iter()
            .filter_map(|o| match o.object().get_field("id") {
                Some(FieldValue::Integer(i)) => Some(i),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_recursive_tree_is_depth_first() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Get, "/tree", node_mapping()).unwrap();
        let (engine, _) = engine_with(registry, EngineConfig::default());

        let payload = json!({"id": 1, "children": [
            {"id": 2, "children": [{"id": 3}]},
            {"id": 4}
        ]});
        let result = engine
            .map_response_sync(&Response::new(payload), &Request::new(Method::Get, "/tree"))
            .unwrap();

        assert_eq!(ids(&result), vec![1, 2, 3, 4]);
        let root = ObjectIndex::new(0);
        let children: Vec<_> = result.get(root).unwrap().relation("children").to_vec();
        assert_eq!(children, vec![ObjectIndex::new(1), ObjectIndex::new(3)]);
        assert_eq!(result.get(ObjectIndex::new(2)).unwrap().depth(), 2);
    }

    #[test]
    fn test_depth_limit_skips_deep_fragments() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Get, "/tree", node_mapping()).unwrap();
        let (engine, sink) = engine_with(registry, EngineConfig::default().with_max_depth(1));

        let payload = json!({"id": 1, "children": [{"id": 2, "children": [{"id": 3}]}]});
        let result = engine
            .map_response_sync(&Response::new(payload), &Request::new(Method::Get, "/tree"))
            .unwrap();

        assert_eq!(ids(&result), vec![1, 2]);
        assert!(matches!(
            sink.warnings()[0],
            MappingWarning::DepthLimitReached { depth: 2, .. }
        ));
    }

    #[test]
    fn test_root_key_path_envelope() {
        let registry = DescriptorRegistry::new();
        registry.register(
            MappingDescriptor::new(Method::Get, "/nodes", node_mapping())
                .unwrap()
                .with_root_key_path("data.items")
                .unwrap(),
        );
        let (engine, _) = engine_with(registry, EngineConfig::default());
        let request = Request::new(Method::Get, "/nodes");

        let result = engine
            .map_response_sync(&Response::new(json!({"data": {"items": [{"id": 5}]}})), &request)
            .unwrap();
        assert_eq!(ids(&result), vec![5]);

        let result = engine
            .map_response_sync(&Response::new(json!({"items": [{"id": 5}]})), &request)
            .unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_invalid_request_fails_synchronously() {
        let (engine, _) = engine_with(DescriptorRegistry::new(), EngineConfig::default());
        let err = engine
            .map_response_sync(&Response::new(json!({})), &Request::new(Method::Get, "nodes"))
            .unwrap_err();
        assert!(matches!(err, MappingError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_map_response_inline_and_offloaded_agree() {
        let registry = Arc::new(DescriptorRegistry::new());
        registry.register_route(Method::Get, "/tree", node_mapping()).unwrap();
        let payload = Response::new(json!({"id": 1, "children": [{"id": 2}]}));
        let request = Request::new(Method::Get, "/tree");

        let offloaded = MappingEngine::new(registry.clone());
        let inline = MappingEngine::new(registry).with_config(EngineConfig::default().with_offload(false));

        let a = offloaded.map_response(&payload, &request).await.unwrap();
        let b = inline.map_response(&payload, &request).await.unwrap();
        assert_eq!(a.to_json(), b.to_json());
    }

    #[test]
    fn test_map_response_with_requires_runtime() {
        let (engine, _) = engine_with(DescriptorRegistry::new(), EngineConfig::default());
        let err = engine
            .map_response_with(&Response::new(json!({})), &Request::new(Method::Get, "/x"), |_| {})
            .unwrap_err();
        assert!(matches!(err, MappingError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_delete_unmapped_type_is_skipped() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Delete, "/nodes/:id", node_mapping()).unwrap();
        let store = Arc::new(MemoryStore::new());
        let engine = MappingEngine::new(Arc::new(registry)).with_store(store.clone());

        let other = DynamicObject::new("User").with_field("id", 1i64);
        let outcome = engine
            .delete_object_from_store(&other, &Request::new(Method::Delete, "/nodes/1"))
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Unmapped);
        assert!(store.deletes().is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_identity_value_fails() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Delete, "/nodes/:id", node_mapping()).unwrap();
        let engine = MappingEngine::new(Arc::new(registry));

        let node = DynamicObject::new("Node");
        let err = engine
            .delete_object_from_store(&node, &Request::new(Method::Delete, "/nodes/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MappingError::MissingIdentity { .. }));
    }

    #[test]
    fn test_map_object_prefers_matching_type() {
        let registry = DescriptorRegistry::new();
        let tag = ObjectMapping::builder(ObjectFactory::dynamic("Tag"))
            .attribute("meta.label", "label", AttributeType::String)
            .build()
            .unwrap();
        registry.register_route(Method::Put, "/items/:id", node_mapping()).unwrap();
        registry.register_route(Method::Put, "/items/tags", tag).unwrap();
        let engine = MappingEngine::new(Arc::new(registry));

        let node = DynamicObject::new("Node").with_field("id", 9i64);
        let payload = engine.map_object(&node, "/items/tags", Method::Put);
        assert_eq!(Value::Object(payload), json!({"id": 9}));

        let tag = DynamicObject::new("Tag").with_field("label", "hot");
        let payload = engine.map_object(&tag, "/items/tags", Method::Put);
        assert_eq!(Value::Object(payload), json!({"meta": {"label": "hot"}}));
    }
}
