mod pg;

#[cfg(any(test, feature = "test-support"))]
mod memory;

pub use pg::PgStore;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
