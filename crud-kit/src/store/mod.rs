pub mod memory;
pub mod mongo;

pub use memory::{MemoryProvider, MemoryStore, MemoryTransaction, MemoryUserBoundProvider};
pub use mongo::{MongoProvider, MongoStore, MongoTransaction, MongoUserBoundProvider};
