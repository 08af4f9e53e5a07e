use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separates the storage provider id from the space id
pub const STORAGE_DELIMITER: char = '$';
/// Separates the space id from the opaque (node) id
pub const OPAQUE_DELIMITER: char = '!';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("invalid resource id: {0:?}")]
    InvalidResourceId(String),
}

/// Identifies a space, or a single resource within a space.
///
/// The textual form is `[<storage>$]<space>[!<opaque>]`. A missing
///  opaque id addresses the whole space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub storage_id: Option<String>,
    pub space_id: String,
    pub opaque_id: Option<String>,
}

impl ResourceId {
    /// An id addressing a whole space
    pub fn space(space_id: impl Into<String>) -> Self {
        Self {
            storage_id: None,
            space_id: space_id.into(),
            opaque_id: None,
        }
    }

    /// An id addressing a single node within a space
    pub fn node(space_id: impl Into<String>, opaque_id: impl Into<String>) -> Self {
        Self {
            storage_id: None,
            space_id: space_id.into(),
            opaque_id: Some(opaque_id.into()),
        }
    }

    pub fn opaque_id(&self) -> Option<&str> {
        self.opaque_id.as_deref()
    }
}

impl FromStr for ResourceId {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReferenceError::InvalidResourceId(s.to_string());
        let s = s.trim();
        if s.is_empty() {
            return Err(invalid());
        }

        let (head, opaque_id) = match s.split_once(OPAQUE_DELIMITER) {
            Some((head, opaque)) => (head, Some(opaque)),
            None => (s, None),
        };
        let (storage_id, space_id) = match head.split_once(STORAGE_DELIMITER) {
            Some((storage, space)) => (Some(storage), space),
            None => (None, head),
        };
        if space_id.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            storage_id: storage_id
                .filter(|id| !id.is_empty())
                .map(str::to_string),
            space_id: space_id.to_string(),
            opaque_id: opaque_id.filter(|id| !id.is_empty()).map(str::to_string),
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(storage_id) = &self.storage_id {
            write!(f, "{}{}", storage_id, STORAGE_DELIMITER)?;
        }
        write!(f, "{}", self.space_id)?;
        if let Some(opaque_id) = &self.opaque_id {
            write!(f, "{}{}", OPAQUE_DELIMITER, opaque_id)?;
        }
        Ok(())
    }
}

/// A resource id paired with a path relative to it.
///
/// Used both as the scope of listing operations and as the
///  destination of restores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub resource_id: ResourceId,
    pub path: String,
}

impl Reference {
    /// A reference to the root of a space
    pub fn space_root(resource_id: ResourceId) -> Self {
        Self {
            resource_id,
            path: ".".to_string(),
        }
    }

    /// Copy of this reference pointing at another path
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        Self {
            resource_id: self.resource_id.clone(),
            path: path.into(),
        }
    }
}

impl FromStr for Reference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::space_root(s.parse()?))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_id, self.path)
    }
}

/// Turn an absolute path into one relative to the space root.
///
/// `/a/b` becomes `./a/b`, the root itself becomes `.`.
pub fn make_relative_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    if parts.is_empty() {
        ".".to_string()
    } else {
        format!("./{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_resource_id() {
        let id: ResourceId = "storage-1$space-1!node-1".parse().unwrap();
        assert_eq!(id.storage_id.as_deref(), Some("storage-1"));
        assert_eq!(id.space_id, "space-1");
        assert_eq!(id.opaque_id(), Some("node-1"));
        assert_eq!(id.to_string(), "storage-1$space-1!node-1");
    }

    #[test]
    fn test_parse_space_only() {
        let id: ResourceId = "space-1".parse().unwrap();
        assert_eq!(id, ResourceId::space("space-1"));

        // Trailing delimiter without an opaque id still means "whole space"
        let id: ResourceId = "space-1!".parse().unwrap();
        assert_eq!(id.opaque_id(), None);
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<ResourceId>().is_err());
        assert!("storage$".parse::<ResourceId>().is_err());
        assert!("!node".parse::<ResourceId>().is_err());
    }

    #[test]
    fn test_make_relative_path() {
        assert_eq!(make_relative_path("/docs/report.pdf"), "./docs/report.pdf");
        assert_eq!(make_relative_path("docs//report.pdf"), "./docs/report.pdf");
        assert_eq!(make_relative_path("/"), ".");
        assert_eq!(make_relative_path(""), ".");
        assert_eq!(make_relative_path("/a/../b"), "./b");
    }
}
