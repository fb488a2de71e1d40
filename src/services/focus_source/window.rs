use crate::events::RawFocusEvent;
use std::fmt;
use std::path::Path;

/// Активное окно в том виде, в каком его отдаёт утилита рабочего стола
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveWindow {
    pub pid: Option<u32>,
    /// Wayland app_id (есть только у части композиторов)
    pub app_id: Option<String>,
    /// WM_CLASS или его аналог
    pub class: Option<String>,
    pub title: String,
}

impl ActiveWindow {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Источник события - процесс окна, владелец - app_id, подсказка - класс окна
    pub fn into_raw_event(self) -> RawFocusEvent {
        let mut event = RawFocusEvent::new();
        event.source_app = self.pid.and_then(process_name);
        event.window_owner = self.app_id;
        event.class_hint = self.class;
        event
    }
}

impl fmt::Display for ActiveWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class {
            Some(class) => write!(f, "\"{}\" ({})", self.title, class),
            None => write!(f, "\"{}\"", self.title),
        }
    }
}

/// Имя исполняемого файла процесса.
///
/// `/proc/<pid>/comm` ядро обрезает до 15 байт, поэтому сначала смотрим на
/// `/proc/<pid>/exe` и `argv[0]`, а `comm` берём только как последний вариант.
pub fn process_name(pid: u32) -> Option<String> {
    let proc_dir = Path::new("/proc").join(pid.to_string());

    std::fs::read_link(proc_dir.join("exe"))
        .ok()
        .and_then(|exe| exe_name(&exe))
        .or_else(|| {
            std::fs::read(proc_dir.join("cmdline"))
                .ok()
                .and_then(|cmdline| argv0_name(&cmdline))
        })
        .or_else(|| {
            std::fs::read_to_string(proc_dir.join("comm"))
                .ok()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
        })
}

fn exe_name(exe: &Path) -> Option<String> {
    let name = exe.file_name()?.to_string_lossy();
    // Заменённый на диске бинарник ядро помечает суффиксом
    let name = name.strip_suffix(" (deleted)").unwrap_or(&name).trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn argv0_name(cmdline: &[u8]) -> Option<String> {
    let argv0 = cmdline.split(|byte| *byte == 0).next()?;
    let argv0 = String::from_utf8_lossy(argv0);
    let name = argv0.rsplit('/').next()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_raw_event_maps_fields() {
        let event = ActiveWindow::new("Inbox")
            .with_app_id("org.mozilla.Thunderbird")
            .with_class("thunderbird")
            .into_raw_event();

        assert_eq!(event.source_app, None);
        assert_eq!(event.window_owner.as_deref(), Some("org.mozilla.Thunderbird"));
        assert_eq!(event.class_hint.as_deref(), Some("thunderbird"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_name_of_self() {
        let name = process_name(std::process::id());
        assert!(name.is_some_and(|name| !name.is_empty()));
    }

    #[test]
    fn test_exe_name_strips_deleted_marker() {
        assert_eq!(
            exe_name(Path::new("/usr/bin/telegram-desktop (deleted)")).as_deref(),
            Some("telegram-desktop")
        );
        assert_eq!(exe_name(Path::new("/")), None);
    }

    #[test]
    fn test_argv0_name_keeps_full_basename() {
        let cmdline = b"/opt/telegram/telegram-desktop\0--startintray\0";
        assert_eq!(argv0_name(cmdline).as_deref(), Some("telegram-desktop"));
        assert_eq!(argv0_name(b"\0"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_long_process_name_is_not_truncated() {
        let dir = std::env::temp_dir().join(format!("lockgate-window-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let binary = dir.join("telegram-desktop");
        std::fs::copy("/bin/sleep", &binary).unwrap();

        let mut child = std::process::Command::new(&binary).arg("5").spawn().unwrap();
        let event = ActiveWindow::new("Telegram").with_pid(child.id()).into_raw_event();
        child.kill().unwrap();
        let _ = child.wait();
        let _ = std::fs::remove_dir_all(&dir);

        assert_eq!(event.source_app.as_deref(), Some("telegram-desktop"));
    }
}
