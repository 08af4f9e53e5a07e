//! Node metadata
//!
//! Every node, revision and space root carries a set of named
//!  attributes (`user.oc.*`). Values are raw bytes; numbers are stored
//!  as decimal ASCII.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;

pub(crate) mod messagepack;

pub use messagepack::MessagePackBackend;

/// Attribute names used by the decomposed layout
pub mod attr {
    pub const BLOB_ID: &str = "user.oc.blobid";
    pub const BLOB_SIZE: &str = "user.oc.blobsize";
    pub const TREE_SIZE: &str = "user.oc.treesize";
    pub const TYPE: &str = "user.oc.type";
    pub const NAME: &str = "user.oc.name";
    pub const PARENT_ID: &str = "user.oc.parentid";
    pub const ID: &str = "user.oc.id";
    pub const SPACE_NAME: &str = "user.oc.space.name";
}

/// Attribute name to raw value, ordered by name
pub type Attributes = BTreeMap<String, Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("failed to read metadata of {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write metadata of {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed metadata in {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("failed to encode metadata for {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("attribute {name} missing on {path}")]
    MissingAttribute { path: PathBuf, name: String },
    #[error("attribute {name} on {path} is not a valid number: {value:?}")]
    InvalidNumber {
        path: PathBuf,
        name: String,
        value: String,
    },
    #[error("nothing to purge at {0}")]
    NotFound(PathBuf),
}

/// Storage for node attributes
#[async_trait]
pub trait MetadataBackend: Send + Sync + std::fmt::Debug {
    /// Short backend name, as detected on disk
    fn name(&self) -> &'static str;

    /// Location of the attribute record for `path`
    fn metadata_path(&self, path: &Path) -> PathBuf;

    /// All attributes of `path`. A node without a record has no attributes.
    async fn all(&self, path: &Path) -> Result<Attributes, MetadataError>;

    async fn get(&self, path: &Path, name: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        Ok(self.all(path).await?.remove(name))
    }

    async fn set(&self, path: &Path, name: &str, value: &[u8]) -> Result<(), MetadataError>;

    /// Remove `path` together with its attribute record and lock file.
    ///
    /// Fails with [`MetadataError::NotFound`] if none of them existed.
    async fn purge(&self, path: &Path) -> Result<(), MetadataError>;
}

/// Read a decimal attribute
pub async fn get_u64<B>(backend: &B, path: &Path, name: &str) -> Result<u64, MetadataError>
where
    B: MetadataBackend + ?Sized,
{
    let value = backend
        .get(path, name)
        .await?
        .ok_or_else(|| MetadataError::MissingAttribute {
            path: path.to_path_buf(),
            name: name.to_string(),
        })?;
    parse_u64(path, name, &value)
}

pub(crate) fn parse_u64(path: &Path, name: &str, value: &[u8]) -> Result<u64, MetadataError> {
    let text = String::from_utf8_lossy(value);
    text.trim()
        .parse()
        .map_err(|_| MetadataError::InvalidNumber {
            path: path.to_path_buf(),
            name: name.to_string(),
            value: text.to_string(),
        })
}

/// Render an attribute value for display.
///
/// Printable ASCII is shown in double quotes, anything else as
///  `0s` followed by standard base64.
pub fn attribute_to_string(value: &[u8]) -> String {
    if value.iter().all(|b| (32..127).contains(b)) {
        format!("\"{}\"", String::from_utf8_lossy(value))
    } else {
        format!(
            "0s{}",
            base64::engine::general_purpose::STANDARD.encode(value)
        )
    }
}

/// Result of decoding a user supplied attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedValue {
    /// `0s` (base64) or `0x` (hex) prefixed value, or a plain string
    Decoded(Vec<u8>),
    /// Prefixed value that failed to decode; kept verbatim
    Raw { value: Vec<u8>, reason: String },
}

impl ParsedValue {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ParsedValue::Decoded(value) => value,
            ParsedValue::Raw { value, .. } => value,
        }
    }
}

/// Decode an attribute value given on the command line
pub fn parse_attribute_value(value: &str) -> ParsedValue {
    let decoded = if let Some(encoded) = value.strip_prefix("0s") {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| format!("invalid base64: {}", e))
    } else if let Some(encoded) = value.strip_prefix("0x") {
        hex::decode(encoded).map_err(|e| format!("invalid hex: {}", e))
    } else {
        Ok(value.as_bytes().to_vec())
    };

    match decoded {
        Ok(bytes) => ParsedValue::Decoded(bytes),
        Err(reason) => ParsedValue::Raw {
            value: value.as_bytes().to_vec(),
            reason,
        },
    }
}

/// Select attributes whose name matches a shell-style pattern
///  (`user.*`). No pattern selects everything.
pub fn filter_attributes<'a>(
    attributes: &'a Attributes,
    pattern: Option<&str>,
) -> Result<Vec<(&'a str, &'a [u8])>, glob::PatternError> {
    let pattern = pattern.map(glob::Pattern::new).transpose()?;
    Ok(attributes
        .iter()
        .filter(|(name, _)| pattern.as_ref().map_or(true, |p| p.matches(name)))
        .map(|(name, value)| (name.as_str(), value.as_slice()))
        .collect())
}
