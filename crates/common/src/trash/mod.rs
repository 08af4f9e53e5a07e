use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::Reference;

mod empty_dirs;
mod restore;

pub use empty_dirs::{purge_empty_dirs, EmptyDirsReport};
pub use restore::{BatchReport, RestoreError, RestoreOutcome, TrashRestoreResolver};

/// Below this many keep-both attempts the ceiling is raised
pub const MIN_RENAME_ATTEMPTS: usize = 100;

/// Status codes reported by the storage gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    Ok,
    NotFound,
    PermissionDenied,
    AlreadyExists,
    Aborted,
    Internal,
    Unavailable,
    Unknown,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::AlreadyExists => "ALREADY_EXISTS",
            StatusCode::Aborted => "ABORTED",
            StatusCode::Internal => "INTERNAL",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The gateway answered with a non-OK status
    #[error("gateway returned {code}: {message}")]
    Status { code: StatusCode, message: String },
    /// The request never got an answer
    #[error("gateway request failed: {0}")]
    Transport(String),
}

impl GatewayError {
    pub fn status(code: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::Status {
                code: StatusCode::NotFound,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    File,
    Folder,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::File => write!(f, "file"),
            ItemKind::Folder => write!(f, "folder"),
        }
    }
}

/// What a successful stat returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub path: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub size: u64,
}

/// A trashed node waiting to be restored or to expire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecycleItem {
    pub key: String,
    /// Path the item occupied before deletion, absolute within its space
    pub path: String,
    pub kind: ItemKind,
    pub deleted_at: DateTime<Utc>,
}

/// File operations offered by the storage gateway
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Stat a reference; `Ok(None)` if nothing exists there
    async fn stat(&self, reference: &Reference) -> Result<Option<ResourceInfo>, GatewayError>;

    /// Delete the tree at a reference
    async fn delete(&self, reference: &Reference) -> Result<(), GatewayError>;

    /// Items in the trash of the space `reference` points into
    async fn list_recycle(&self, reference: &Reference) -> Result<Vec<RecycleItem>, GatewayError>;

    /// Restore the item `key` of `space`'s trash to `destination`,
    ///  returning where it ended up
    async fn restore(
        &self,
        space: &Reference,
        key: &str,
        destination: &Reference,
    ) -> Result<Reference, GatewayError>;
}

/// How to handle a restore whose destination is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestorePolicy {
    /// Leave the existing resource alone and don't restore
    #[default]
    Skip,
    /// Delete the existing resource, then restore
    Replace,
    /// Restore under the next free `name (n).ext`
    KeepBoth,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid restore option '{0}', expected skip, replace or keep-both")]
pub struct InvalidPolicy(String);

impl FromStr for RestorePolicy {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(RestorePolicy::Skip),
            "replace" => Ok(RestorePolicy::Replace),
            "keep-both" => Ok(RestorePolicy::KeepBoth),
            other => Err(InvalidPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for RestorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestorePolicy::Skip => write!(f, "skip"),
            RestorePolicy::Replace => write!(f, "replace"),
            RestorePolicy::KeepBoth => write!(f, "keep-both"),
        }
    }
}

/// Extensions kept together when numbering a file
const COMPOUND_EXTENSIONS: [&str; 3] = [".tar.gz", ".tar.bz", ".tar.bz2"];

/// Insert ` (n)` before a path's extension, the way clients name copies:
///  `report.pdf` becomes `report (2).pdf`, `data.tar.gz` becomes
///  `data (2).tar.gz`.
pub fn modify_filename(path: &str, n: usize) -> String {
    let lower = path.to_lowercase();
    let extension_len = COMPOUND_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| ext.len())
        .unwrap_or_else(|| extension(path).len());

    let split = path.len().saturating_sub(extension_len);
    // Lowercasing may change byte lengths; fall back to no extension
    let (stem, ext) = if path.is_char_boundary(split) {
        path.split_at(split)
    } else {
        (path, "")
    };
    format!("{} ({}){}", stem, n, ext)
}

/// Extension of the last path element, including the dot. Names that
///  start with their only dot (`.profile`) have none.
fn extension(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(0) | None => "",
        Some(i) => &name[i..],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modify_filename() {
        assert_eq!(modify_filename("./report.pdf", 1), "./report (1).pdf");
        assert_eq!(modify_filename("./docs/report.pdf", 2), "./docs/report (2).pdf");
        assert_eq!(modify_filename("./data.tar.gz", 2), "./data (2).tar.gz");
        assert_eq!(modify_filename("./data.tar.bz2", 1), "./data (1).tar.bz2");
        assert_eq!(modify_filename("./Backup.TAR.GZ", 1), "./Backup (1).TAR.GZ");
        assert_eq!(modify_filename("./archive.gz", 1), "./archive (1).gz");
        assert_eq!(modify_filename("./folder", 3), "./folder (3)");
        assert_eq!(modify_filename("./v1.2/notes", 1), "./v1.2/notes (1)");
        assert_eq!(modify_filename("./.profile", 1), "./.profile (1)");
    }

    #[test]
    fn test_policy_names() {
        for policy in [RestorePolicy::Skip, RestorePolicy::Replace, RestorePolicy::KeepBoth] {
            assert_eq!(policy.to_string().parse::<RestorePolicy>().unwrap(), policy);
        }
        assert_eq!(RestorePolicy::default(), RestorePolicy::Skip);
        assert!("overwrite".parse::<RestorePolicy>().is_err());
    }

    #[test]
    fn test_not_found_status() {
        assert!(GatewayError::status(StatusCode::NotFound, "gone").is_not_found());
        assert!(!GatewayError::status(StatusCode::Internal, "boom").is_not_found());
        assert!(!GatewayError::Transport("refused".into()).is_not_found());
    }
}
