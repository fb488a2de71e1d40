//! Lock Decision Engine: decides when a foreground transition requires a challenge.
//!
//! `LockEngine` is a plain state machine driven with explicit timestamps. It is
//! owned by exactly one task (`LockCoordinator`), which serializes focus events,
//! grant deliveries and registry reads through a single evaluation point.

mod coordinator;

pub use coordinator::{EngineHandle, EngineStatus, LockCoordinator};

use crate::debug_if_enabled;
use crate::events::{ApplicationId, TriggerChallenge, UnlockGrant};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

/// Минимальный интервал между запросами проверки для одного приложения
pub const THROTTLE_WINDOW: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForegroundState {
    pub current: Option<ApplicationId>,
    pub previous: Option<ApplicationId>,
}

/// Время последнего запроса проверки по приложениям.
///
/// Пишет только движок; читать можно из любого потока для диагностики.
/// Записи не вытесняются: их число ограничено числом защищённых приложений.
#[derive(Debug, Clone, Default)]
pub struct ThrottleTable {
    last_trigger: Arc<DashMap<ApplicationId, Instant>>,
}

impl ThrottleTable {
    pub fn last_trigger(&self, app_id: &ApplicationId) -> Option<Instant> {
        self.last_trigger.get(app_id).map(|entry| *entry.value())
    }

    /// Отсутствующая запись означает бесконечно давний запрос
    fn allows(&self, app_id: &ApplicationId, now: Instant) -> bool {
        match self.last_trigger(app_id) {
            Some(last) => now.saturating_duration_since(last) > THROTTLE_WINDOW,
            None => true,
        }
    }

    fn record(&self, app_id: ApplicationId, now: Instant) {
        self.last_trigger.insert(app_id, now);
    }

    pub fn len(&self) -> usize {
        self.last_trigger.len()
    }
}

#[derive(Debug, Default)]
pub struct LockEngine {
    foreground: ForegroundState,
    grant: Option<UnlockGrant>,
    throttle: ThrottleTable,
}

impl LockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn foreground(&self) -> &ForegroundState {
        &self.foreground
    }

    pub fn grant(&self) -> Option<&UnlockGrant> {
        self.grant.as_ref()
    }

    pub fn throttle(&self) -> &ThrottleTable {
        &self.throttle
    }

    fn is_granted(&self, app_id: &ApplicationId) -> bool {
        self.grant
            .as_ref()
            .is_some_and(|grant| &grant.app_id == app_id)
    }

    /// Обработать разрешённое приложение переднего плана.
    ///
    /// `locked` - снимок реестра на момент оценки.
    pub fn on_focus(
        &mut self,
        app_id: ApplicationId,
        locked: &HashSet<ApplicationId>,
        now: Instant,
    ) -> Option<TriggerChallenge> {
        // Повтор того же приложения - не переход
        if self.foreground.current.as_ref() == Some(&app_id) {
            return None;
        }

        // Уход с разблокированного приложения снова его блокирует
        if let Some(prev) = &self.foreground.current {
            if locked.contains(prev) && self.is_granted(prev) && &app_id != prev {
                info!("Повторная блокировка {} после ухода на {}", prev, app_id);
                self.grant = None;
            }
        }

        let mut trigger = None;
        if locked.contains(&app_id) && !self.is_granted(&app_id) {
            if self.throttle.allows(&app_id, now) {
                self.throttle.record(app_id.clone(), now);
                info!("Блокировка приложения: {}", app_id);
                trigger = Some(TriggerChallenge::new(app_id.clone(), now));
            } else {
                debug_if_enabled!("Пропуск запроса проверки для {} (throttle)", app_id);
            }
        }

        // Обновляется всегда, даже если запрос подавлен
        self.foreground.previous = self.foreground.current.replace(app_id);

        trigger
    }

    /// Допуск заменяет предыдущий безусловно, даже для другого приложения
    pub fn on_grant(&mut self, app_id: ApplicationId, now: Instant) {
        info!("Временная разблокировка: {}", app_id);
        self.grant = Some(UnlockGrant::new(app_id, now));
    }
}
