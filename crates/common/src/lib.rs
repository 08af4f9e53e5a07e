/**
 * Blob payload deletion.
 *  Wraps the object store backends (local decomposed
 *  layout, S3, memory) behind a single deleter.
 */
pub mod blobstore;
/**
 * Path discovery over the sharded on-disk layout.
 *  Three interchangeable strategies producing the
 *  same set of node locations for a scope.
 */
pub mod discovery;
/**
 * Fire-and-forget events consumed by the external
 *  postprocessing worker.
 */
pub mod events;
/**
 * Helpers for the decomposed on-disk layout:
 *  sharded ids, scope patterns and path parsing.
 */
pub mod layout;
/**
 * Node metadata attributes and the sidecar
 *  backend they are stored in.
 */
pub mod metadata;
/**
 * Storage references: space ids, resource ids
 *  and relative paths within a space.
 */
pub mod reference;
/**
 * Garbage collection of old file revisions.
 */
pub mod revisions;
/**
 * In-memory collaborators and on-disk fixtures
 *  for exercising the maintenance operations.
 */
pub mod testkit;
/**
 * Trash restore with name collision handling,
 *  and cleanup of empty trash directories.
 */
pub mod trash;
/**
 * Tree access and the aggregate size auditor.
 */
pub mod tree;

pub mod prelude {
    pub use crate::blobstore::{BlobRef, Blobstore, BlobstoreConfig, BlobstoreDeleter};
    pub use crate::discovery::{Discovery, Strategy};
    pub use crate::layout::{Layout, Scope};
    pub use crate::metadata::{MessagePackBackend, MetadataBackend};
    pub use crate::reference::{Reference, ResourceId};
    pub use crate::revisions::{PurgeTally, RevisionPurger};
    pub use crate::trash::{Gateway, RestorePolicy, TrashRestoreResolver};
    pub use crate::tree::{Node, NodeKind, TreeAccess, TreeSizeAuditor};
}
