//! Path patterns for descriptor lookup.
//!
//! A pattern is a `/`-separated list of segments. Literal segments must match
//! exactly; placeholder segments (`:id` or `{id}`) match any single non-empty
//! segment. Two patterns that differ only in placeholder names have the same
//! [`shape`](PathPattern::shape) and are treated as the same route.

use std::collections::BTreeMap;

use crate::error::{RegistrationError, RegistrationResult};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A validated path pattern such as `/users/:id/posts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse and validate a pattern.
    pub fn parse(pattern: &str) -> RegistrationResult<Self> {
        let invalid = |reason: &str| RegistrationError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'"));
        }
        if pattern.contains(['?', '#']) {
            return Err(invalid("must not contain a query or fragment"));
        }
        if pattern.chars().any(char::is_whitespace) {
            return Err(invalid("must not contain whitespace"));
        }

        let body = &pattern[1..];
        let body = body.strip_suffix('/').unwrap_or(body);

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        if !body.is_empty() {
            for part in body.split('/') {
                if part.is_empty() {
                    return Err(invalid("contains an empty segment"));
                }

                let param = part
                    .strip_prefix(':')
                    .or_else(|| part.strip_prefix('{').and_then(|p| p.strip_suffix('}')));

                match param {
                    Some(name) => {
                        if name.is_empty()
                            || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                        {
                            return Err(invalid("placeholder names must be alphanumeric"));
                        }
                        if names.contains(&name) {
                            return Err(invalid("placeholder names must be unique"));
                        }
                        names.push(name);
                        segments.push(Segment::Param(name.to_string()));
                    }
                    None => {
                        if part.contains(['{', '}', ':']) {
                            return Err(invalid("malformed placeholder"));
                        }
                        segments.push(Segment::Literal(part.to_string()));
                    }
                }
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Canonical form with anonymous placeholders, e.g. `/users/{}/posts`.
    pub fn shape(&self) -> String {
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => format!("/{}", l),
                Segment::Param(_) => "/{}".to_string(),
            })
            .collect()
    }

    /// Number of literal segments. Higher is more specific.
    pub fn specificity(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Whether the request path matches this pattern.
    pub fn is_match(&self, path: &str) -> bool {
        split_request_path(path)
            .map(|parts| self.match_parts(&parts))
            .unwrap_or(false)
    }

    /// Placeholder values captured from `path`, or `None` when it does not match.
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let parts = split_request_path(path).ok()?;
        if !self.match_parts(&parts) {
            return None;
        }
        Some(
            self.segments
                .iter()
                .zip(parts)
                .filter_map(|(segment, part)| match segment {
                    Segment::Param(name) => Some((name.clone(), part.to_string())),
                    Segment::Literal(_) => None,
                })
                .collect(),
        )
    }

    pub(crate) fn match_parts(&self, parts: &[&str]) -> bool {
        self.segments.len() == parts.len()
            && self
                .segments
                .iter()
                .zip(parts)
                .all(|(segment, part)| match segment {
                    Segment::Literal(l) => l == part,
                    Segment::Param(_) => true,
                })
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Split a request path into segments.
///
/// Query strings, fragments and a trailing `/` are ignored. Paths that do not
/// start with `/` or that contain empty segments are structurally invalid.
pub fn split_request_path(path: &str) -> Result<Vec<&str>, String> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    if !path.starts_with('/') {
        return Err(format!("path '{}' must start with '/'", path));
    }

    let body = &path[1..];
    let body = body.strip_suffix('/').unwrap_or(body);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let parts: Vec<&str> = body.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(format!("path '{}' contains an empty segment", path));
    }
    Ok(parts)
}
