//! Declarative object mapping for JSON APIs.
//!
//! Descriptors bind a request route to an object mapping. The engine uses
//! them to turn response payloads into typed objects, to turn objects back
//! into request payloads and to issue store intents.

#[macro_use]
pub mod macros;

pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod keypath;
pub mod mapper;
pub mod method;
pub mod object;
pub mod path;
pub mod registry;
pub mod result;
pub mod store;
pub mod transport;
pub mod value;

pub use config::EngineConfig;
pub use descriptor::{AttributeMapping, MappingDescriptor, ObjectMapping, ObjectMappingBuilder, RelationMapping, RelationTarget};
pub use diagnostics::{CollectingDiagnostics, DiagnosticsSink, MappingWarning, TracingDiagnostics};
pub use engine::{DeleteOutcome, MappingEngine};
pub use error::{MappingError, RegistrationError, RegistrationResult, Result};
pub use keypath::KeyPath;
pub use method::Method;
pub use object::{DynamicObject, FieldError, Mappable, ObjectFactory};
pub use path::PathPattern;
pub use registry::DescriptorRegistry;
pub use result::{MappedObject, MappingResult, ObjectIndex};
pub use store::{MemoryStore, NoOpStore, ObjectIdentity, StoreAdapter, StoreError, StoreRecord};
pub use transport::{Request, Response};
pub use value::{AttributeType, FieldValue, FromFieldValue};

/// Re-exports commonly used types.
pub mod prelude {
    // Configuration
    pub use crate::config::{defaults, env_vars, EngineConfig};

    // Error handling
    pub use crate::error::{MappingError, RegistrationError, Result};

    // Descriptors
    pub use crate::descriptor::{MappingDescriptor, ObjectMapping};
    pub use crate::method::Method;
    pub use crate::registry::DescriptorRegistry;

    // Objects
    pub use crate::object::{DynamicObject, Mappable, ObjectFactory};
    pub use crate::value::{AttributeType, FieldValue};

    // Engine
    pub use crate::engine::{DeleteOutcome, MappingEngine};
    pub use crate::result::{MappedObject, MappingResult};
    pub use crate::transport::{Request, Response};

    // Store
    pub use crate::store::{StoreAdapter, StoreRecord};
}
