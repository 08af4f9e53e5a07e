pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Decomposedfs, Init, Postprocessing, Revisions, Trash, TrashBin, Version};
