use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::SchemaError;

/// Cooperative cancellation flag shared between a host and the engine.
/// Long loops poll it; work observed under cancellation is never cached.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<(), SchemaError> {
        if self.is_cancelled() {
            return Err(SchemaError::Cancelled);
        }
        Ok(())
    }
}
