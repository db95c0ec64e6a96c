//! Descriptor configuration files.
//!
//! ```json
//! {
//!   "descriptors": [
//!     {
//!       "path": "/users",
//!       "method": "GET",
//!       "root_key_path": "data",
//!       "mapping": {
//!         "type": "User",
//!         "identity": "id",
//!         "attributes": [{ "key": "id", "type": "integer" }],
//!         "relations": [{ "key": "posts", "mapping": { "type": "Post" } }]
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Objects built from these descriptors are [`DynamicObject`]s.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use objmap_core::descriptor::{AttributeMapping, MappingDescriptor, ObjectMapping, RelationTarget};
use objmap_core::{AttributeType, DescriptorRegistry, Method, ObjectFactory};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DescriptorFile {
    pub descriptors: Vec<DescriptorSpec>,
}

#[derive(Debug, Deserialize)]
pub struct DescriptorSpec {
    pub path: String,
    pub method: Method,
    #[serde(default)]
    pub root_key_path: Option<String>,
    pub mapping: ObjectSpec,
}

#[derive(Debug, Deserialize)]
pub struct ObjectSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default)]
    pub relations: Vec<RelationSpec>,
}

#[derive(Debug, Deserialize)]
pub struct AttributeSpec {
    pub key: String,
    /// Defaults to `key`.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default, rename = "type")]
    pub attribute_type: AttributeType,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RelationSpec {
    pub key: String,
    /// Relation name. Defaults to `key`.
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub mapping: Option<ObjectSpec>,
    #[serde(default)]
    pub recursive: bool,
}

impl DescriptorFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read descriptor file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse descriptor file {}", path.display()))
    }

    /// Build every descriptor and register it.
    pub fn into_registry(self) -> Result<DescriptorRegistry> {
        let registry = DescriptorRegistry::new();
        for spec in self.descriptors {
            let route = format!("{} {}", spec.method, spec.path);
            let mapping = spec
                .mapping
                .build()
                .with_context(|| format!("Invalid mapping for {route}"))?;

            let mut descriptor = MappingDescriptor::new(spec.method, &spec.path, mapping)
                .with_context(|| format!("Invalid descriptor {route}"))?;
            if let Some(root) = &spec.root_key_path {
                descriptor = descriptor
                    .with_root_key_path(root)
                    .with_context(|| format!("Invalid root key path for {route}"))?;
            }

            if registry.register(descriptor).is_some() {
                tracing::warn!(route = %route, "Descriptor replaced an earlier entry");
            }
        }
        Ok(registry)
    }
}

impl ObjectSpec {
    pub fn build(&self) -> Result<Arc<ObjectMapping>> {
        let mut builder = ObjectMapping::builder(ObjectFactory::dynamic(self.type_name.as_str()));

        for attribute in &self.attributes {
            let field = attribute.field.as_deref().unwrap_or(&attribute.key);
            let mut mapping = AttributeMapping::new(&attribute.key, field, attribute.attribute_type)?;
            if let Some(format) = &attribute.format {
                mapping = mapping.with_format(format)?;
            }
            builder = builder.attribute_mapping(mapping);
        }

        for relation in &self.relations {
            let name = relation.field.as_deref().unwrap_or(&relation.key);
            let target = match (&relation.mapping, relation.recursive) {
                (Some(_), true) => bail!(
                    "Relation '{}' of {} sets both mapping and recursive",
                    relation.key,
                    self.type_name
                ),
                (Some(spec), false) => RelationTarget::Mapping(spec.build()?),
                (None, true) => RelationTarget::Recursive,
                (None, false) => bail!(
                    "Relation '{}' of {} needs a mapping or recursive: true",
                    relation.key,
                    self.type_name
                ),
            };
            builder = builder.named_relation(&relation.key, name, target);
        }

        if let Some(identity) = &self.identity {
            builder = builder.identity(identity);
        }
        Ok(builder.build()?)
    }
}
