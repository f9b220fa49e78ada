//! 分发队列持久化实现

pub mod memory;
pub mod postgres;

pub use memory::{DeadLetter, InMemoryDistributionQueue};
pub use postgres::PostgresDistributionQueue;
