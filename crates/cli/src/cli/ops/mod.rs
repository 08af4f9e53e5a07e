pub mod decomposedfs;
pub mod init;
pub mod postprocessing;
pub mod revisions;
pub mod trash;
pub mod trash_bin;
pub mod version;

pub use decomposedfs::Decomposedfs;
pub use init::Init;
pub use postprocessing::Postprocessing;
pub use revisions::Revisions;
pub use trash::Trash;
pub use trash_bin::TrashBin;
pub use version::Version;
