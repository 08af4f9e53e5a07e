/// Test harness for the maintenance operations
///
/// Everything here runs in-process: an on-disk storage root in a
/// temporary directory, an in-memory tree with injectable failures,
/// and an in-memory gateway standing in for the storage service.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::LayoutFixture;
///
/// let fixture = LayoutFixture::new();
/// fixture.space("ssss1111-0000", "Personal");
/// let docs = fixture.container("ssss1111-0000", "ssss1111-0000", "docs0000-0001", "docs");
/// fixture.file("ssss1111-0000", &docs, "file0000-0002", "a.txt", 12);
/// ```
mod fixture;
mod memory_gateway;
mod memory_tree;

pub use fixture::LayoutFixture;
pub use memory_gateway::MemoryGateway;
pub use memory_tree::{MemoryTree, MemoryTreeError};
