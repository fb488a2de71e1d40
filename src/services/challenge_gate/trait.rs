use crate::events::TriggerChallenge;
use crate::services::credential::CredentialStore;
use crate::services::grant_bus::UnlockGrantBus;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Экран проверки: получает запрос от движка и при успехе публикует допуск
#[async_trait::async_trait]
pub trait ChallengeGate: Send + Sync {
    async fn on_trigger(&self, trigger: TriggerChallenge);
}

/// Factory function to create an appropriate challenge gate based on the dry_run flag
pub fn create_challenge_gate(
    credentials: Arc<CredentialStore>,
    bus: UnlockGrantBus,
    dry_run: bool,
) -> Box<dyn ChallengeGate> {
    if dry_run {
        Box::new(super::dry_run::DryRunChallengeGate::new(bus))
    } else {
        Box::new(super::console::ConsoleChallengeGate::new(credentials, bus))
    }
}

/// Доставляет запросы проверки экрану по одному, пока движок жив
pub async fn run_challenge_gate(
    gate: Box<dyn ChallengeGate>,
    mut triggers: mpsc::Receiver<TriggerChallenge>,
) {
    info!("Экран проверки готов принимать запросы");

    while let Some(trigger) = triggers.recv().await {
        gate.on_trigger(trigger).await;
    }

    info!("Очередь запросов проверки закрыта");
}
