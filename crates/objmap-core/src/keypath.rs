//! Dotted key paths into payload fragments.
//!
//! `"data.users"` walks into the `data` object and then its `users` key. Paths
//! only traverse objects; hitting an array or scalar mid-path resolves to
//! nothing.

use serde_json::{Map, Value};

use crate::error::{RegistrationError, RegistrationResult};

/// A parsed, non-empty dotted key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse a dotted path. Empty paths and empty segments are rejected.
    pub fn parse(path: &str) -> RegistrationResult<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(RegistrationError::InvalidKeyPath(path.to_string()));
        }

        let segments: Vec<String> = trimmed.split('.').map(str::to_string).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(RegistrationError::InvalidKeyPath(path.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Look the path up starting from an arbitrary value.
    pub fn resolve<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match value {
            Value::Object(map) => self.resolve_in(map),
            _ => None,
        }
    }

    /// Look the path up starting from an object.
    pub fn resolve_in<'a>(&self, map: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = map.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// Write `value` at this path, creating intermediate objects.
    ///
    /// An intermediate key holding a non-object is replaced by an object.
    pub fn insert(&self, target: &mut Map<String, Value>, value: Value) {
        let Some((last, parents)) = self.segments.split_last() else {
            return;
        };

        let mut current = target;
        for segment in parents {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.clone(), value);
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl std::str::FromStr for KeyPath {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(KeyPath::parse("").is_err());
        assert!(KeyPath::parse("data..users").is_err());
        assert!(KeyPath::parse(".users").is_err());
        assert_eq!(KeyPath::parse("data.users").unwrap().segments().len(), 2);
    }

    #[test]
    fn test_resolve_nested() {
        let payload = json!({"data": {"users": [1, 2]}, "count": 2});
        let path = KeyPath::parse("data.users").unwrap();
        assert_eq!(path.resolve(&payload), Some(&json!([1, 2])));

        let missing = KeyPath::parse("data.posts").unwrap();
        assert_eq!(missing.resolve(&payload), None);

        let through_scalar = KeyPath::parse("count.value").unwrap();
        assert_eq!(through_scalar.resolve(&payload), None);
    }

    #[test]
    fn test_resolve_on_non_object() {
        let path = KeyPath::parse("id").unwrap();
        assert_eq!(path.resolve(&json!([{"id": 1}])), None);
    }

    #[test]
    fn test_insert_creates_parents() {
        let mut map = Map::new();
        KeyPath::parse("profile.name").unwrap().insert(&mut map, json!("Ada"));
        KeyPath::parse("profile.age").unwrap().insert(&mut map, json!(36));
        KeyPath::parse("id").unwrap().insert(&mut map, json!(1));

        assert_eq!(
            Value::Object(map),
            json!({"id": 1, "profile": {"name": "Ada", "age": 36}})
        );
    }

    #[test]
    fn test_insert_replaces_scalar_parent() {
        let mut map = Map::new();
        map.insert("profile".to_string(), json!("flat"));
        KeyPath::parse("profile.name").unwrap().insert(&mut map, json!("Ada"));
        assert_eq!(Value::Object(map), json!({"profile": {"name": "Ada"}}));
    }
}
