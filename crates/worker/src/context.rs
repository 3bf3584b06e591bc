use std::sync::Arc;

use varia_core::storage::StorageLayout;
use varia_events::ProgressPublisher;
use varia_generator::VariationGenerator;

/// Shared, read-only dependencies of every executor in a process.
///
/// Built once at startup and cloned into each runner; nothing in it is
/// mutated after construction.
#[derive(Clone)]
pub struct WorkerContext {
    pub generator: Arc<dyn VariationGenerator>,
    pub publisher: Arc<dyn ProgressPublisher>,
    pub storage: StorageLayout,
}

impl WorkerContext {
    pub fn new(
        generator: Arc<dyn VariationGenerator>,
        publisher: Arc<dyn ProgressPublisher>,
        storage: StorageLayout,
    ) -> Self {
        Self {
            generator,
            publisher,
            storage,
        }
    }
}
