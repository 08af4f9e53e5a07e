use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Attributes, MetadataBackend, MetadataError};

const METADATA_EXTENSION: &str = "mpk";
const LOCK_EXTENSION: &str = "mlock";

/// Attributes stored as a MessagePack map in a `<path>.mpk` sidecar
#[derive(Debug, Clone, Default)]
pub struct MessagePackBackend;

impl MessagePackBackend {
    pub fn new() -> Self {
        Self
    }

    /// Whether `root` holds a storage that uses this backend
    pub fn detect(root: &Path) -> bool {
        let spaces = crate::layout::Layout::new(root).spaces_dir();
        glob::glob(&format!(
            "{}/*/*/nodes/*/*/*/*/*.{}",
            glob::Pattern::escape(&spaces.to_string_lossy()),
            METADATA_EXTENSION
        ))
        .map(|mut paths| paths.next().is_some())
        .unwrap_or(false)
    }

    fn lock_path(path: &Path) -> PathBuf {
        with_suffix(path, LOCK_EXTENSION)
    }

    pub(crate) fn decode(path: &Path, bytes: &[u8]) -> Result<Attributes, MetadataError> {
        if bytes.is_empty() {
            return Ok(Attributes::new());
        }
        rmp_serde::from_slice::<Record>(bytes)
            .map(|record| record.0)
            .map_err(|e| MetadataError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl MetadataBackend for MessagePackBackend {
    fn name(&self) -> &'static str {
        "mpk"
    }

    fn metadata_path(&self, path: &Path) -> PathBuf {
        with_suffix(path, METADATA_EXTENSION)
    }

    async fn all(&self, path: &Path) -> Result<Attributes, MetadataError> {
        let record_path = self.metadata_path(path);
        match tokio::fs::read(&record_path).await {
            Ok(bytes) => Self::decode(&record_path, &bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Attributes::new()),
            Err(source) => Err(MetadataError::Read {
                path: record_path,
                source,
            }),
        }
    }

    async fn set(&self, path: &Path, name: &str, value: &[u8]) -> Result<(), MetadataError> {
        let mut attributes = self.all(path).await?;
        attributes.insert(name.to_string(), value.to_vec());

        let record_path = self.metadata_path(path);
        let bytes = encode(&attributes).map_err(|e| {
            MetadataError::Encode {
                path: record_path.clone(),
                reason: e.to_string(),
            }
        })?;

        // Write next to the record and rename over it so readers never
        //  observe a half written map
        let staging = with_suffix(&record_path, "tmp");
        let write_err = |source| MetadataError::Write {
            path: record_path.clone(),
            source,
        };
        tokio::fs::write(&staging, &bytes).await.map_err(write_err)?;
        tokio::fs::rename(&staging, &record_path)
            .await
            .map_err(write_err)?;
        Ok(())
    }

    async fn purge(&self, path: &Path) -> Result<(), MetadataError> {
        let mut removed = false;
        for target in [
            self.metadata_path(path),
            path.to_path_buf(),
            Self::lock_path(path),
        ] {
            match remove(&target).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(MetadataError::Write {
                        path: target,
                        source,
                    })
                }
            }
        }

        if removed {
            Ok(())
        } else {
            Err(MetadataError::NotFound(path.to_path_buf()))
        }
    }
}

async fn remove(path: &Path) -> std::io::Result<()> {
    let meta = tokio::fs::symlink_metadata(path).await?;
    if meta.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut out = path.as_os_str().to_owned();
    out.push(".");
    out.push(suffix);
    PathBuf::from(out)
}

/* Wire format */

/// Encode attributes the way the backend writes them
pub(crate) fn encode(attributes: &Attributes) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec(&RecordRef(attributes))
}

// Values are written as msgpack `bin`; older records may carry `str`
//  or integer arrays, all of which are accepted on read.

struct RecordRef<'a>(&'a Attributes);

impl Serialize for RecordRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, &Bin(value))?;
        }
        map.end()
    }
}

struct Bin<'a>(&'a [u8]);

impl Serialize for Bin<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

struct Record(Attributes);

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RecordVisitor;

        impl<'de> Visitor<'de> for RecordVisitor {
            type Value = Record;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of attribute names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
                let mut attributes = Attributes::new();
                while let Some((name, value)) = access.next_entry::<String, OwnedBin>()? {
                    attributes.insert(name, value.0);
                }
                Ok(Record(attributes))
            }
        }

        deserializer.deserialize_map(RecordVisitor)
    }
}

struct OwnedBin(Vec<u8>);

impl<'de> Deserialize<'de> for OwnedBin {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BinVisitor;

        impl<'de> Visitor<'de> for BinVisitor {
            type Value = OwnedBin;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("bytes or a string")
            }

            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<OwnedBin, E> {
                Ok(OwnedBin(v.to_vec()))
            }

            fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<OwnedBin, E> {
                Ok(OwnedBin(v))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<OwnedBin, E> {
                Ok(OwnedBin(v.as_bytes().to_vec()))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OwnedBin, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(byte) = seq.next_element::<u8>()? {
                    out.push(byte);
                }
                Ok(OwnedBin(out))
            }
        }

        deserializer.deserialize_byte_buf(BinVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::attr;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_and_read_back() {
        let temp = TempDir::new().unwrap();
        let node = temp.path().join("node");
        tokio::fs::write(&node, b"").await.unwrap();
        let backend = MessagePackBackend::new();

        assert!(backend.all(&node).await.unwrap().is_empty());

        backend.set(&node, attr::NAME, b"report.pdf").await.unwrap();
        backend.set(&node, attr::BLOB_ID, &[0, 159, 146]).await.unwrap();

        let attributes = backend.all(&node).await.unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[attr::NAME], b"report.pdf".to_vec());
        assert_eq!(attributes[attr::BLOB_ID], vec![0, 159, 146]);
        assert_eq!(
            backend.get(&node, attr::NAME).await.unwrap(),
            Some(b"report.pdf".to_vec())
        );
        assert!(temp.path().join("node.mpk").exists());
        assert!(!temp.path().join("node.mpk.tmp").exists());
    }

    #[tokio::test]
    async fn test_reads_string_values() {
        let temp = TempDir::new().unwrap();
        let node = temp.path().join("node");
        let mut map = std::collections::BTreeMap::new();
        map.insert("user.oc.name".to_string(), "plain".to_string());
        std::fs::write(
            temp.path().join("node.mpk"),
            rmp_serde::to_vec(&map).unwrap(),
        )
        .unwrap();

        let attributes = MessagePackBackend::new().all(&node).await.unwrap();
        assert_eq!(attributes["user.oc.name"], b"plain".to_vec());
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let temp = TempDir::new().unwrap();
        let node = temp.path().join("node");
        std::fs::write(temp.path().join("node.mpk"), [0xc1]).unwrap();

        let result = MessagePackBackend::new().all(&node).await;
        assert!(matches!(result, Err(MetadataError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_purge() {
        let temp = TempDir::new().unwrap();
        let node = temp.path().join("node.REV.2024-01-01T00:00:00.1Z");
        let backend = MessagePackBackend::new();
        std::fs::write(&node, b"").unwrap();
        backend.set(&node, attr::BLOB_ID, b"blob").await.unwrap();
        std::fs::write(MessagePackBackend::lock_path(&node), b"").unwrap();

        backend.purge(&node).await.unwrap();
        assert!(std::fs::read_dir(temp.path()).unwrap().next().is_none());

        // Second purge finds nothing
        assert!(matches!(
            backend.purge(&node).await,
            Err(MetadataError::NotFound(_))
        ));
    }
}
