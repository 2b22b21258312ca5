//! Dialect DDL for grouped operations.

mod ddl;
mod postgres;

pub use ddl::PostgresDdl;
pub use postgres::PostgresApplier;
