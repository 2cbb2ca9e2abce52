pub mod client;
pub mod memory;
pub mod schema;
pub mod store;
pub mod table;
pub mod writer;

pub use client::{VectorSearchClient, VectorSearchOutcome};
pub use memory::InMemoryStore;
pub use store::LanceStore;
pub use writer::LanceWriter;
