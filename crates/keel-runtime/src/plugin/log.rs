use tracing::info;

use super::{HookPhase, HookRegistry, Plugin};

/// Logs every operation once it has been applied.
pub struct OperationLogPlugin;

impl<C: Send> Plugin<C> for OperationLogPlugin {
    fn name(&self) -> &str {
        "log"
    }

    fn register(&self, hooks: &mut HookRegistry<C>) {
        hooks.tap_all(HookPhase::After, |operation, _| {
            Box::pin(async move {
                info!(operation = %operation, "Applied");
                Ok(())
            })
        });
    }
}
