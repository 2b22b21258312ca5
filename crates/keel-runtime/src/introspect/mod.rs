//! Reading the current relational model from a live database.

mod postgres;

pub use postgres::PostgresIntrospector;

use std::future::Future;
use std::pin::Pin;

use keel_core::{AbstractDatabase, Result};

/// Produces the current model of one schema namespace.
pub trait Introspector: Send + Sync {
    fn introspect<'a>(
        &'a self,
        namespace: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<AbstractDatabase>> + Send + 'a>>;
}
