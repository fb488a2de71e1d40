use super::window::ActiveWindow;
use crate::error::Result;
use crate::lock_error;
use std::process::Command;
use tracing::debug;

pub struct XdotoolProbe;

impl XdotoolProbe {
    pub fn new() -> Self {
        Self
    }

    fn query(args: &[&str]) -> Result<String> {
        let output = Command::new("xdotool").args(args).output().map_err(|e| {
            debug!("xdotool не найден или не работает: {}", e);
            lock_error!(service_unavailable, "xdotool не найден: {}", e)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("xdotool вернул ошибку: {}", stderr);
            return Err(lock_error!(service_unavailable, "xdotool вернул ошибку: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub async fn test(&self) -> Result<()> {
        Self::query(&["getactivewindow"]).map(|_| ())
    }

    pub async fn get_active_window(&self) -> Result<ActiveWindow> {
        let title = Self::query(&["getactivewindow", "getwindowname"])?;
        let mut window = ActiveWindow::new(title);

        // pid и класс есть не у всех окон - это не ошибка
        match Self::query(&["getactivewindow", "getwindowpid"]) {
            Ok(pid) => {
                if let Ok(pid) = pid.parse::<u32>() {
                    window = window.with_pid(pid);
                }
            }
            Err(e) => debug!("Не удалось получить pid окна: {}", e),
        }

        match Self::query(&["getactivewindow", "getwindowclassname"]) {
            Ok(class) if !class.is_empty() => window = window.with_class(class),
            Ok(_) => {}
            Err(e) => debug!("Не удалось получить класс окна: {}", e),
        }

        debug!("xdotool получил окно: {}", window);
        Ok(window)
    }
}
