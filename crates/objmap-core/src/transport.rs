//! Request and response values supplied by the transport layer.
//!
//! The engine only needs a logical path and method from the request and the
//! decoded payload from the response. Headers, status codes and the like stay
//! with the transport.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MappingError, Result};
use crate::method::Method;
use crate::path::split_request_path;

/// A request as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    method: Method,
    path: String,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Check the path is structurally valid.
    pub fn validate(&self) -> Result<()> {
        split_request_path(&self.path)
            .map(|_| ())
            .map_err(MappingError::InvalidRequest)
    }
}

/// A response payload. Cloning shares the decoded payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    payload: Arc<Value>,
}

impl Response {
    pub fn new(payload: Value) -> Self {
        Self {
            payload: Arc::new(payload),
        }
    }

    /// Decode a JSON body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        Ok(Self::new(serde_json::from_slice(body)?))
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

impl From<Value> for Response {
    fn from(payload: Value) -> Self {
        Self::new(payload)
    }
}
