//! Connection pool and migration helpers.

pub mod pool;

pub use pool::{create_pool, run_migrations, Database, DatabaseError};
