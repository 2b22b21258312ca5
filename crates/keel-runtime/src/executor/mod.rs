//! Transactional, grouped application of sorted operations.

mod group;

pub use group::{next_group, GroupKind, OperationGroup};

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use keel_core::{Operation, Result};
use tracing::{debug, info, warn};

use crate::plugin::{HookPhase, HookRegistry};
use crate::sort::OperationSorter;

/// Executes the DDL for one group on an open connection.
pub trait SchemaApplier<C>: Send + Sync {
    fn apply<'a>(
        &'a self,
        conn: &'a mut C,
        group: &'a OperationGroup,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// A transaction the executor can run inside and then settle.
pub trait MigrationTransaction: Send {
    type Connection: Send;

    fn connection(&mut self) -> &mut Self::Connection;

    fn commit(self) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;

    fn rollback(self) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Applies operations group by group, firing plugin hooks around each group.
pub struct MigrationExecutor<C> {
    applier: Arc<dyn SchemaApplier<C>>,
    hooks: HookRegistry<C>,
}

impl<C: Send> MigrationExecutor<C> {
    /// Create a new executor with no hooks.
    pub fn new<A: SchemaApplier<C> + 'static>(applier: A) -> Self {
        Self {
            applier: Arc::new(applier),
            hooks: HookRegistry::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: HookRegistry<C>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn hooks(&self) -> &HookRegistry<C> {
        &self.hooks
    }

    /// Sort and apply `operations` on `conn`. Returns the operations in the order they
    /// were applied. The first failure stops the run.
    pub async fn apply(&self, conn: &mut C, mut operations: Vec<Operation>) -> Result<Vec<Operation>> {
        OperationSorter::sort(&mut operations);
        let mut queue: VecDeque<Operation> = operations.into();
        let mut applied = Vec::with_capacity(queue.len());

        while let Some(group) = next_group(&mut queue) {
            debug!(
                table = %group.table,
                kind = ?group.kind,
                operations = group.len(),
                "Applying group"
            );
            self.apply_group(conn, &group).await?;
            applied.extend(group.into_operations());
        }

        Ok(applied)
    }

    async fn apply_group(&self, conn: &mut C, group: &OperationGroup) -> Result<()> {
        self.hooks.fire(HookPhase::Before, &group.parent, conn).await?;
        for child in &group.children {
            self.hooks.fire(HookPhase::Before, child, conn).await?;
        }

        self.applier.apply(conn, group).await?;

        for child in &group.children {
            self.hooks.fire(HookPhase::After, child, conn).await?;
        }
        self.hooks.fire(HookPhase::After, &group.parent, conn).await
    }

    /// Apply `operations` inside `tx`: committed when everything succeeded, rolled back
    /// otherwise.
    pub async fn execute<T>(&self, mut tx: T, operations: Vec<Operation>) -> Result<Vec<Operation>>
    where
        T: MigrationTransaction<Connection = C>,
    {
        match self.apply(tx.connection(), operations).await {
            Ok(applied) => {
                tx.commit().await?;
                info!(operations = applied.len(), "Migration committed");
                Ok(applied)
            }
            Err(e) => {
                warn!(error = %e, "Migration failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}
