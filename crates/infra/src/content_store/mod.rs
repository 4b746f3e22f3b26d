pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryContentStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresContentStore;
pub use r#trait::{BlogFilter, ContentStore, StoreError};
