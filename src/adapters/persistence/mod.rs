mod in_memory;
mod postgres;

pub use in_memory::InMemoryWorkforceStore;
pub use postgres::PostgresWorkforceStore;
