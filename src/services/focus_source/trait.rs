use crate::config::Config;
use crate::error::Result;
use crate::services::lock_engine::EngineHandle;
use std::sync::Arc;

/// Trait for focus sources that can run in different modes
#[async_trait::async_trait]
pub trait FocusSourceTrait {
    /// Run the focus source
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate focus source based on the dry_run flag
pub fn create_focus_source(
    config: Arc<Config>,
    engine: EngineHandle,
    dry_run: bool,
) -> Result<Box<dyn FocusSourceTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_run::DryRunFocusSource::new(engine)))
    } else {
        Ok(Box::new(super::polling::PollingFocusSource::new(config, engine)))
    }
}
