//! Adapters for the storage, print provider and messaging ports
pub mod events;
pub mod memory_store;
pub mod pg_store;
pub mod printify;

pub use memory_store::MemoryStore;
pub use pg_store::PgStore;
pub use printify::PrintifyClient;
