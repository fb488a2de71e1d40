use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Идентификатор установленного приложения (сравнение - точное совпадение строки)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApplicationId(Arc<str>);

impl ApplicationId {
    /// Пустая строка (после trim) идентификатором не является
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Arc::from(trimmed)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ApplicationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Сырое уведомление о смене фокуса от наблюдателя ОС.
///
/// Все поля опциональны: источник может не знать владельца окна,
/// а класс UI бывает только у части событий.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFocusEvent {
    /// Приложение, отправившее событие
    pub source_app: Option<String>,
    /// Владелец реально сфокусированного окна (предпочтительнее source_app)
    pub window_owner: Option<String>,
    /// Подсказка класса UI (имя класса окна / экрана)
    pub class_hint: Option<String>,
    pub observed_at: Instant,
}

impl RawFocusEvent {
    pub fn new() -> Self {
        Self {
            source_app: None,
            window_owner: None,
            class_hint: None,
            observed_at: Instant::now(),
        }
    }

    pub fn from_source(source_app: impl Into<String>) -> Self {
        Self::new().with_source(source_app)
    }

    pub fn with_source(mut self, source_app: impl Into<String>) -> Self {
        self.source_app = Some(source_app.into());
        self
    }

    pub fn with_owner(mut self, window_owner: impl Into<String>) -> Self {
        self.window_owner = Some(window_owner.into());
        self
    }

    pub fn with_class_hint(mut self, class_hint: impl Into<String>) -> Self {
        self.class_hint = Some(class_hint.into());
        self
    }

    /// Источник события, если он непустой
    pub fn source_id(&self) -> Option<ApplicationId> {
        self.source_app.as_deref().and_then(ApplicationId::parse)
    }

    /// Владелец окна, если он непустой
    pub fn owner_id(&self) -> Option<ApplicationId> {
        self.window_owner.as_deref().and_then(ApplicationId::parse)
    }

    /// Непустая подсказка класса UI
    pub fn class_hint(&self) -> Option<&str> {
        self.class_hint
            .as_deref()
            .map(str::trim)
            .filter(|hint| !hint.is_empty())
    }
}

impl Default for RawFocusEvent {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RawFocusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source={} owner={} class={} ({}ms ago)",
            self.source_app.as_deref().unwrap_or("-"),
            self.window_owner.as_deref().unwrap_or("-"),
            self.class_hint.as_deref().unwrap_or("-"),
            self.observed_at.elapsed().as_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_id_rejects_blank() {
        assert!(ApplicationId::parse("").is_none());
        assert!(ApplicationId::parse("   ").is_none());
        assert_eq!(ApplicationId::parse(" org.mozilla.firefox ").unwrap().as_str(), "org.mozilla.firefox");
    }

    #[test]
    fn test_application_id_exact_match() {
        let a = ApplicationId::parse("Firefox").unwrap();
        let b = ApplicationId::parse("firefox").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_raw_event_accessors_skip_empty() {
        let event = RawFocusEvent::from_source("")
            .with_owner("  ")
            .with_class_hint("");

        assert!(event.source_id().is_none());
        assert!(event.owner_id().is_none());
        assert!(event.class_hint().is_none());

        let event = RawFocusEvent::from_source("telegram").with_class_hint("MainWindow");
        assert_eq!(event.source_id().unwrap().as_str(), "telegram");
        assert_eq!(event.class_hint(), Some("MainWindow"));
    }
}
