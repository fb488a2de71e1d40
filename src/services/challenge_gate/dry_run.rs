use crate::events::TriggerChallenge;
use crate::services::grant_bus::UnlockGrantBus;
use tracing::info;

use super::r#trait::ChallengeGate;

/// Сразу выдаёт допуск без ввода PIN
pub struct DryRunChallengeGate {
    bus: UnlockGrantBus,
}

impl DryRunChallengeGate {
    pub fn new(bus: UnlockGrantBus) -> Self {
        Self { bus }
    }
}

#[async_trait::async_trait]
impl ChallengeGate for DryRunChallengeGate {
    async fn on_trigger(&self, trigger: TriggerChallenge) {
        info!("[DRY RUN] Запрос проверки для {} - выдаём допуск", trigger.app_id);
        self.bus.publish(trigger.app_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ApplicationId;
    use std::time::Instant;

    #[tokio::test]
    async fn test_dry_run_grants_immediately() {
        let bus = UnlockGrantBus::default();
        let mut sub = bus.subscribe();
        let gate = DryRunChallengeGate::new(bus);

        let app_id = ApplicationId::parse("firefox").unwrap();
        gate.on_trigger(TriggerChallenge::new(app_id.clone(), Instant::now())).await;

        assert_eq!(sub.try_recv(), Some(app_id));
    }
}
