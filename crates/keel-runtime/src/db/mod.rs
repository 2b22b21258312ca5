mod pool;
mod transaction;

pub use pool::{Database, DatabasePool};
pub use transaction::PgTransaction;
