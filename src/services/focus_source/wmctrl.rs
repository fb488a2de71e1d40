use super::window::ActiveWindow;
use crate::error::{LockError, Result};
use std::process::Command;

pub struct WmctrlProbe;

impl WmctrlProbe {
    pub fn new() -> Self {
        Self
    }

    pub async fn test(&self) -> Result<()> {
        let output = Command::new("wmctrl").args(["-l"]).output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(LockError::ServiceUnavailable("wmctrl failed".to_string()))
        }
    }

    pub async fn get_active_window(&self) -> Result<ActiveWindow> {
        let active = Command::new("xprop")
            .args(["-root", "_NET_ACTIVE_WINDOW"])
            .output()
            .map_err(|e| LockError::ServiceUnavailable(format!("xprop не найден: {}", e)))?;

        let active_id = parse_active_window_id(&String::from_utf8_lossy(&active.stdout))
            .ok_or_else(|| LockError::ServiceUnavailable("_NET_ACTIVE_WINDOW не задан".to_string()))?;

        let output = Command::new("wmctrl")
            .args(["-lpx"])
            .output()
            .map_err(|e| LockError::ServiceUnavailable(format!("wmctrl не найден: {}", e)))?;

        if !output.status.success() {
            return Err(LockError::ServiceUnavailable("wmctrl вернул ошибку".to_string()));
        }

        find_window(&String::from_utf8_lossy(&output.stdout), active_id)
            .ok_or_else(|| LockError::ServiceUnavailable("Активное окно не найдено".to_string()))
    }
}

fn parse_hex(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.trim().trim_start_matches("0x"), 16).ok()
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3a00007`
fn parse_active_window_id(xprop: &str) -> Option<u64> {
    let id = xprop.rsplit('#').next()?.split(',').next()?;
    parse_hex(id).filter(|id| *id != 0)
}

/// Строка `wmctrl -lpx`: id, рабочий стол, pid, WM_CLASS, хост, заголовок
fn find_window(listing: &str, active_id: u64) -> Option<ActiveWindow> {
    listing.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 || parse_hex(parts[0]) != Some(active_id) {
            return None;
        }

        let title = if parts.len() > 5 { parts[5..].join(" ") } else { String::new() };
        let mut window = ActiveWindow::new(title).with_class(parts[3]);
        if let Ok(pid) = parts[2].parse::<u32>() {
            if pid > 0 {
                window = window.with_pid(pid);
            }
        }
        Some(window)
    })
}
