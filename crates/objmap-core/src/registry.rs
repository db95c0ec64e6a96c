//! Descriptor registry.
//!
//! The registry owns every registered [`MappingDescriptor`] and answers which of
//! them apply to a request. It provides:
//! - Registration with last-write-wins replacement per `(pattern, method)`
//! - Lookup indexed by method, ordered by specificity then registration order
//! - Teardown via [`unregister`](DescriptorRegistry::unregister) and [`clear`](DescriptorRegistry::clear)
//!
//! Reads take a shared lock, so concurrent mapping passes never block each
//! other. Registration takes the write lock and is expected during startup,
//! but is safe at any time.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::descriptor::{MappingDescriptor, ObjectMapping};
use crate::error::RegistrationResult;
use crate::method::Method;
use crate::path::{split_request_path, PathPattern};
use crate::transport::Request;

struct Entry {
    seq: u64,
    shape: String,
    descriptor: Arc<MappingDescriptor>,
}

/// Registry of mapping descriptors keyed by `(path pattern, method)`.
#[derive(Default)]
pub struct DescriptorRegistry {
    by_method: RwLock<HashMap<Method, Vec<Entry>>>,
    next_seq: AtomicU64,
}

impl DescriptorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor.
    ///
    /// A descriptor with the same pattern shape and method replaces the
    /// previous one in place, keeping its registration slot. The replaced
    /// descriptor is returned.
    pub fn register(&self, descriptor: MappingDescriptor) -> Option<Arc<MappingDescriptor>> {
        let descriptor = Arc::new(descriptor);
        let shape = descriptor.pattern().shape();
        let mut by_method = self.by_method.write();
        let entries = by_method.entry(descriptor.method()).or_default();

        if let Some(entry) = entries.iter_mut().find(|e| e.shape == shape) {
            tracing::info!(
                method = %descriptor.method(),
                pattern = %descriptor.pattern(),
                previous = %entry.descriptor.type_name(),
                replacement = %descriptor.type_name(),
                "Replacing mapping descriptor"
            );
            return Some(std::mem::replace(&mut entry.descriptor, descriptor));
        }

        tracing::info!(
            method = %descriptor.method(),
            pattern = %descriptor.pattern(),
            target = %descriptor.type_name(),
            "Registered mapping descriptor"
        );
        entries.push(Entry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            shape,
            descriptor,
        });
        None
    }

    /// Build and register a descriptor in one step.
    pub fn register_route(
        &self,
        method: Method,
        pattern: &str,
        mapping: Arc<ObjectMapping>,
    ) -> RegistrationResult<Option<Arc<MappingDescriptor>>> {
        Ok(self.register(MappingDescriptor::new(method, pattern, mapping)?))
    }

    /// Remove the descriptor registered for `(pattern, method)`.
    pub fn unregister(
        &self,
        method: Method,
        pattern: &str,
    ) -> RegistrationResult<Option<Arc<MappingDescriptor>>> {
        let shape = PathPattern::parse(pattern)?.shape();
        let mut by_method = self.by_method.write();
        let Some(entries) = by_method.get_mut(&method) else {
            return Ok(None);
        };
        let removed = entries
            .iter()
            .position(|e| e.shape == shape)
            .map(|idx| entries.remove(idx).descriptor);
        Ok(removed)
    }

    /// Descriptors applying to `path` and `method`.
    ///
    /// Never fails: an unmatched or structurally invalid path yields an empty
    /// list. More specific patterns come first; ties keep registration order.
    pub fn descriptors_for(&self, path: &str, method: Method) -> Vec<Arc<MappingDescriptor>> {
        let Ok(parts) = split_request_path(path) else {
            return Vec::new();
        };

        let by_method = self.by_method.read();
        let Some(entries) = by_method.get(&method) else {
            return Vec::new();
        };

        let mut matched: Vec<&Entry> = entries
            .iter()
            .filter(|e| e.descriptor.pattern().match_parts(&parts))
            .collect();
        matched.sort_by_key(|e| (Reverse(e.descriptor.pattern().specificity()), e.seq));
        matched
            .into_iter()
            .map(|e| Arc::clone(&e.descriptor))
            .collect()
    }

    /// Whether any descriptor applies to the request.
    pub fn can_map(&self, request: &Request) -> bool {
        !self.descriptors_for(request.path(), request.method()).is_empty()
    }

    /// Every registered descriptor in registration order.
    pub fn descriptors(&self) -> Vec<Arc<MappingDescriptor>> {
        let by_method = self.by_method.read();
        let mut all: Vec<&Entry> = by_method.values().flatten().collect();
        all.sort_by_key(|e| e.seq);
        all.into_iter().map(|e| Arc::clone(&e.descriptor)).collect()
    }

    /// Number of registered descriptors.
    pub fn len(&self) -> usize {
        self.by_method.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every descriptor.
    pub fn clear(&self) {
        self.by_method.write().clear();
    }
}

impl std::fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorRegistry")
            .field("descriptors", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectFactory;
    use crate::value::AttributeType;

    fn mapping(type_name: &str) -> Arc<ObjectMapping> {
        ObjectMapping::builder(ObjectFactory::dynamic(type_name))
            .field("id", AttributeType::Integer)
            .build()
            .unwrap()
    }

    fn types(descriptors: &[Arc<MappingDescriptor>]) -> Vec<String> {
        descriptors
            .iter()
            .map(|d| d.type_name().to_string())
            .collect()
    }

    #[test]
    fn test_registry_register_and_lookup() {
        let registry = DescriptorRegistry::new();
        registry
            .register_route(Method::Get, "/users", mapping("User"))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(types(&registry.descriptors_for("/users", Method::Get)), vec!["User"]);
        assert!(registry.descriptors_for("/users", Method::Post).is_empty());
        assert!(registry.descriptors_for("/posts", Method::Get).is_empty());
    }

    #[test]
    fn test_registry_duplicate_replaces() {
        let registry = DescriptorRegistry::new();
        registry
            .register_route(Method::Get, "/users/:id", mapping("User"))
            .unwrap();
        let replaced = registry
            .register_route(Method::Get, "/users/{user_id}", mapping("Account"))
            .unwrap();

        assert_eq!(replaced.unwrap().type_name(), "User");
        assert_eq!(registry.len(), 1);
        assert_eq!(types(&registry.descriptors_for("/users/1", Method::Get)), vec!["Account"]);
    }

    #[test]
    fn test_registry_same_pattern_other_method_is_distinct() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Get, "/users", mapping("User")).unwrap();
        let replaced = registry.register_route(Method::Post, "/users", mapping("User")).unwrap();

        assert!(replaced.is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_registry_orders_by_specificity() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Get, "/users/:id", mapping("User")).unwrap();
        registry.register_route(Method::Get, "/users/me", mapping("Me")).unwrap();
        registry.register_route(Method::Get, "/:collection/:id", mapping("Any")).unwrap();

        assert_eq!(
            types(&registry.descriptors_for("/users/me", Method::Get)),
            vec!["Me", "User", "Any"]
        );
        assert_eq!(
            types(&registry.descriptors_for("/users/7", Method::Get)),
            vec!["User", "Any"]
        );
    }

    #[test]
    fn test_registry_invalid_path_yields_nothing() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Get, "/users", mapping("User")).unwrap();
        assert!(registry.descriptors_for("users", Method::Get).is_empty());
        assert!(registry.descriptors_for("", Method::Get).is_empty());
    }

    #[test]
    fn test_registry_invalid_pattern_is_fatal() {
        let registry = DescriptorRegistry::new();
        assert!(registry.register_route(Method::Get, "/users/:", mapping("User")).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_can_map() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Get, "/users", mapping("User")).unwrap();

        assert!(registry.can_map(&Request::new(Method::Get, "/users")));
        assert!(!registry.can_map(&Request::new(Method::Post, "/ping")));
    }

    #[test]
    fn test_registry_unregister_and_clear() {
        let registry = DescriptorRegistry::new();
        registry.register_route(Method::Get, "/users", mapping("User")).unwrap();
        registry.register_route(Method::Get, "/posts", mapping("Post")).unwrap();

        let removed = registry.unregister(Method::Get, "/users/").unwrap();
        assert_eq!(removed.unwrap().type_name(), "User");
        assert!(registry.unregister(Method::Delete, "/users").unwrap().is_none());
        assert_eq!(types(&registry.descriptors()), vec!["Post"]);

        registry.clear();
        assert!(registry.is_empty());
    }
}
