use crate::error::Result;
use crate::events::RawFocusEvent;
use crate::services::lock_engine::EngineHandle;
use tokio::time::{interval, Duration};
use tracing::info;

use super::r#trait::FocusSourceTrait;

/// Эмулирует смену окон по фиксированному сценарию
pub struct DryRunFocusSource {
    engine: EngineHandle,
    period: Duration,
}

impl DryRunFocusSource {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            period: Duration::from_secs(5),
        }
    }

    fn script() -> Vec<RawFocusEvent> {
        vec![
            RawFocusEvent::from_source("terminal").with_class_hint("Terminal"),
            RawFocusEvent::from_source("firefox").with_class_hint("Navigator"),
            // Клавиатура поверх браузера - не смена приложения
            RawFocusEvent::from_source("onboard").with_class_hint("InputMethodPanel"),
            RawFocusEvent::from_source("telegram-desktop").with_class_hint("TelegramDesktop"),
            RawFocusEvent::from_source("lockgate").with_class_hint("LockScreen"),
            RawFocusEvent::from_source("firefox").with_class_hint("Navigator"),
        ]
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - источник фокуса работает в режиме эмуляции");

        let script = Self::script();
        let mut ticker = interval(self.period);

        for event in script.into_iter().cycle() {
            ticker.tick().await;

            let mut event = event;
            event.observed_at = std::time::Instant::now();
            info!("Dry-run: эмулируем смену фокуса: {}", event);
            self.engine.notify_focus_changed(event);
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl FocusSourceTrait for DryRunFocusSource {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
