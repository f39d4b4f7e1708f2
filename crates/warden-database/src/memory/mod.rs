//! In-memory Directory Store.

mod directory;

pub use directory::MemoryDirectory;
