use crate::config::Config;
use crate::error::{LockError, Result};
use crate::services::lock_engine::EngineHandle;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

use super::r#trait::FocusSourceTrait;
use super::sway::SwayProbe;
use super::window::ActiveWindow;
use super::wmctrl::WmctrlProbe;
use super::xdotool::XdotoolProbe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkingMethod {
    Xdotool,
    Wmctrl,
    Sway,
}

/// Опрашивает активное окно через утилиты рабочего стола и сообщает
/// ядру о каждой смене окна
pub struct PollingFocusSource {
    config: Arc<Config>,
    engine: EngineHandle,
    current_window: Option<ActiveWindow>,
    working_method: Option<WorkingMethod>,

    xdotool: XdotoolProbe,
    wmctrl: WmctrlProbe,
    sway: SwayProbe,
}

impl PollingFocusSource {
    pub fn new(config: Arc<Config>, engine: EngineHandle) -> Self {
        info!("Инициализация PollingFocusSource");

        Self {
            config,
            engine,
            current_window: None,
            working_method: None,
            xdotool: XdotoolProbe::new(),
            wmctrl: WmctrlProbe::new(),
            sway: SwayProbe::new(),
        }
    }

    fn forced_method(&self) -> Option<WorkingMethod> {
        match self.config.source.detection_mode.as_str() {
            "xdotool" => Some(WorkingMethod::Xdotool),
            "wmctrl" => Some(WorkingMethod::Wmctrl),
            "sway" => Some(WorkingMethod::Sway),
            _ => None,
        }
    }

    async fn detect_working_method(&self) -> Result<WorkingMethod> {
        if let Some(method) = self.forced_method() {
            return Ok(method);
        }

        info!("Определяем рабочий метод детекции окон...");

        // Под Wayland sway надёжнее, X11-утилиты видят только XWayland
        let wayland = std::env::var("XDG_SESSION_TYPE").is_ok_and(|session| session == "wayland");
        if wayland && self.sway.test().await.is_ok() {
            info!("Используем swaymsg");
            return Ok(WorkingMethod::Sway);
        }

        if self.xdotool.test().await.is_ok() {
            info!("Используем xdotool");
            return Ok(WorkingMethod::Xdotool);
        }

        if self.wmctrl.test().await.is_ok() {
            info!("Используем wmctrl");
            return Ok(WorkingMethod::Wmctrl);
        }

        if self.sway.test().await.is_ok() {
            info!("Используем swaymsg");
            return Ok(WorkingMethod::Sway);
        }

        LockError::service_unavailable("Ни один метод детекции окон не работает")
    }

    async fn get_window_by_method(&self, method: WorkingMethod) -> Result<ActiveWindow> {
        match method {
            WorkingMethod::Xdotool => self.xdotool.get_active_window().await,
            WorkingMethod::Wmctrl => self.wmctrl.get_active_window().await,
            WorkingMethod::Sway => self.sway.get_active_window().await,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        let mut ticker = interval(Duration::from_millis(self.config.source.polling_interval_ms));

        loop {
            ticker.tick().await;

            let method = match self.working_method {
                Some(method) => method,
                None => match self.detect_working_method().await {
                    Ok(method) => {
                        self.working_method = Some(method);
                        method
                    }
                    Err(_) => {
                        error!("Ни один метод не работает. Приостанавливаем детекцию на 10 секунд");
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        continue;
                    }
                },
            };

            match self.get_window_by_method(method).await {
                Ok(window) => {
                    if self.is_window_changed(&window) {
                        self.send_focus_event(window);
                    }
                }
                Err(e) => {
                    // Ошибка ОС - не фатальна, переопределяем метод на следующем тике
                    warn!("Рабочий метод {:?} перестал работать: {}. Переопределяем...", method, e);
                    self.working_method = None;
                }
            }
        }
    }

    fn is_window_changed(&self, new_window: &ActiveWindow) -> bool {
        match &self.current_window {
            Some(current) => {
                current.pid != new_window.pid
                    || current.app_id != new_window.app_id
                    || current.class != new_window.class
            }
            None => true,
        }
    }

    fn send_focus_event(&mut self, window: ActiveWindow) {
        debug!("Смена активного окна: {}", window);

        self.engine.notify_focus_changed(window.clone().into_raw_event());
        self.current_window = Some(window);
    }
}

impl Drop for PollingFocusSource {
    fn drop(&mut self) {
        info!("PollingFocusSource завершает работу");
    }
}

#[async_trait::async_trait]
impl FocusSourceTrait for PollingFocusSource {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run().await
    }
}
