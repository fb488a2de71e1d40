use crate::events::ApplicationId;
use crate::services::input_methods::InputMethodProvider;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Приложения, события фокуса от которых никогда не считаются сменой приложения:
/// системная оболочка и методы ввода.
///
/// Состав вычисляется при создании и по запросу через `refresh()`,
/// но не перечитывается из ОС на каждое событие.
pub struct IgnoreSet {
    system_shell: ApplicationId,
    extra: Vec<ApplicationId>,
    provider: Arc<dyn InputMethodProvider>,
    ids: RwLock<Arc<HashSet<ApplicationId>>>,
}

impl IgnoreSet {
    pub fn build(
        system_shell: ApplicationId,
        extra: Vec<ApplicationId>,
        provider: Arc<dyn InputMethodProvider>,
    ) -> Self {
        let ids = Self::compute(&system_shell, &extra, provider.as_ref());
        info!("Игнорируемые приложения (оболочка/методы ввода): {}", ids.len());

        Self {
            system_shell,
            extra,
            provider,
            ids: RwLock::new(Arc::new(ids)),
        }
    }

    fn compute(
        system_shell: &ApplicationId,
        extra: &[ApplicationId],
        provider: &dyn InputMethodProvider,
    ) -> HashSet<ApplicationId> {
        let mut ids = HashSet::new();
        ids.insert(system_shell.clone());
        ids.extend(extra.iter().cloned());

        // Ошибка ОС - просто нет дополнительной информации
        match provider.enumerate() {
            Ok(input_methods) => ids.extend(input_methods),
            Err(e) => warn!("Не удалось перечислить методы ввода: {}", e),
        }

        ids
    }

    /// Пересчитать состав (например, после установки новой клавиатуры)
    pub fn refresh(&self) {
        let ids = Self::compute(&self.system_shell, &self.extra, self.provider.as_ref());
        info!("Список игнорируемых приложений обновлён: {}", ids.len());
        *self.ids.write() = Arc::new(ids);
    }

    pub fn snapshot(&self) -> Arc<HashSet<ApplicationId>> {
        self.ids.read().clone()
    }

    pub fn contains(&self, app_id: &ApplicationId) -> bool {
        self.ids.read().contains(app_id)
    }
}
