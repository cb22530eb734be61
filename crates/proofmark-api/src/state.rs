use std::sync::Arc;

use proofmark_registry::{RegistryContext, VerificationEngine};

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<RegistryContext>,
    pub engine: Arc<VerificationEngine>,
    pub registry_configured: bool,
}

impl AppState {
    pub fn new(ctx: Arc<RegistryContext>, engine: VerificationEngine, registry_configured: bool) -> Self {
        Self {
            ctx,
            engine: Arc::new(engine),
            registry_configured,
        }
    }
}
