use crate::error::{LockError, Result};
use crate::events::ApplicationId;
use std::process::Command;
use tracing::debug;

const COMM_MAX_LEN: usize = 15;

/// Источник списка активных методов ввода (экранные клавиатуры, IME-демоны)
pub trait InputMethodProvider: Send + Sync {
    fn enumerate(&self) -> Result<Vec<ApplicationId>>;
}

/// Проверяет запущенные процессы методов ввода через `pgrep -x`
pub struct ProcessInputMethodProvider {
    candidates: Vec<String>,
}

impl ProcessInputMethodProvider {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    fn is_running(name: &str) -> Result<bool> {
        let output = Command::new("pgrep").args(["-x", comm_pattern(name)]).output()?;
        // pgrep: 0 - найден, 1 - не найден, остальное - ошибка
        match output.status.code() {
            Some(0) => Ok(!output.stdout.is_empty()),
            Some(1) => Ok(false),
            _ => Err(LockError::ServiceUnavailable(format!(
                "pgrep вернул ошибку: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

impl InputMethodProvider for ProcessInputMethodProvider {
    fn enumerate(&self) -> Result<Vec<ApplicationId>> {
        let mut found = Vec::new();

        for candidate in &self.candidates {
            let Some(app_id) = ApplicationId::parse(candidate) else {
                continue;
            };

            if Self::is_running(app_id.as_str())? {
                debug!("Обнаружен метод ввода: {}", app_id);
                found.push(app_id);
            }
        }

        Ok(found)
    }
}

/// `pgrep -x` сравнивает с `comm`, который ядро обрезает до 15 байт
fn comm_pattern(name: &str) -> &str {
    if name.len() <= COMM_MAX_LEN {
        return name;
    }
    let mut end = COMM_MAX_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Фиксированный список - для dry-run и тестов
pub struct StaticInputMethodProvider {
    ids: Vec<ApplicationId>,
}

impl StaticInputMethodProvider {
    pub fn new(ids: Vec<ApplicationId>) -> Self {
        Self { ids }
    }
}

impl InputMethodProvider for StaticInputMethodProvider {
    fn enumerate(&self) -> Result<Vec<ApplicationId>> {
        Ok(self.ids.clone())
    }
}
