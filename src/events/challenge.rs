use super::ApplicationId;
use std::fmt;
use std::time::Instant;

/// Решение движка: показать экран проверки для приложения
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerChallenge {
    pub app_id: ApplicationId,
    pub triggered_at: Instant,
}

impl TriggerChallenge {
    pub fn new(app_id: ApplicationId, triggered_at: Instant) -> Self {
        Self { app_id, triggered_at }
    }
}

impl fmt::Display for TriggerChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TriggerChallenge({})", self.app_id)
    }
}

/// Временный допуск к приложению после успешной проверки
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockGrant {
    pub app_id: ApplicationId,
    pub granted_at: Instant,
}

impl UnlockGrant {
    pub fn new(app_id: ApplicationId, granted_at: Instant) -> Self {
        Self { app_id, granted_at }
    }
}

impl fmt::Display for UnlockGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (выдан {}ms назад)",
            self.app_id,
            self.granted_at.elapsed().as_millis()
        )
    }
}
