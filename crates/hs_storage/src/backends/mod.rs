pub mod fs;
pub mod memory;

pub use fs::FsModelStore;
pub use memory::MemoryModelStore;
