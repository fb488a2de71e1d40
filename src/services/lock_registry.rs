use crate::config::Config;
use crate::events::ApplicationId;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

pub type RegistrySnapshot = Arc<HashSet<ApplicationId>>;

/// Живой набор защищённых приложений.
///
/// Обновление всегда заменяет набор целиком: читатель получает `Arc` на
/// неизменяемый снимок и никогда не видит частично применённое изменение.
pub struct LockRegistry {
    snapshot: RwLock<RegistrySnapshot>,
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new(HashSet::new())
    }
}

impl LockRegistry {
    pub fn new(initial: HashSet<ApplicationId>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(initial)),
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.snapshot.read().clone()
    }

    /// Принимает как новый набор, так и готовый снимок из ленты
    pub fn replace(&self, apps: impl Into<RegistrySnapshot>) {
        let apps = apps.into();
        let count = apps.len();
        *self.snapshot.write() = apps;
        info!("Список защищённых приложений обновлён: {}", count);
    }

    pub fn contains(&self, app_id: &ApplicationId) -> bool {
        self.snapshot.read().contains(app_id)
    }
}

/// Производитель ленты обновлений реестра: блокировка и разблокировка приложений.
///
/// Каждое изменение публикует набор целиком. Хранение набора между запусками
/// остаётся на стороне внешнего хранилища.
pub struct RegistryFeed {
    tx: watch::Sender<RegistrySnapshot>,
}

impl RegistryFeed {
    pub fn new(initial: HashSet<ApplicationId>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrySnapshot> {
        self.tx.subscribe()
    }

    pub fn locked_apps(&self) -> RegistrySnapshot {
        self.tx.borrow().clone()
    }

    /// Возвращает false, если приложение уже было защищено
    pub fn lock_app(&self, app_id: ApplicationId) -> bool {
        self.tx.send_if_modified(|current| {
            if current.contains(&app_id) {
                return false;
            }
            let mut next = HashSet::clone(current);
            info!("Приложение {} добавлено в защищённые", app_id);
            next.insert(app_id);
            *current = Arc::new(next);
            true
        })
    }

    /// Возвращает false, если приложение не было защищено
    pub fn unlock_app(&self, app_id: &ApplicationId) -> bool {
        self.tx.send_if_modified(|current| {
            if !current.contains(app_id) {
                return false;
            }
            let mut next = HashSet::clone(current);
            next.remove(app_id);
            info!("Приложение {} удалено из защищённых", app_id);
            *current = Arc::new(next);
            true
        })
    }

    pub fn set_all(&self, apps: HashSet<ApplicationId>) {
        self.tx.send_replace(Arc::new(apps));
    }

    /// Применить `registry.protected_apps` из перечитанной конфигурации.
    /// Подписчики уведомляются только при реальном изменении набора.
    pub fn reload(&self, config: &Config) -> bool {
        let apps = config.protected_apps();
        let changed = self.tx.send_if_modified(|current| {
            if **current == apps {
                return false;
            }
            *current = Arc::new(apps);
            true
        });

        if changed {
            info!("Защищённые приложения перечитаны из конфигурации: {}", self.locked_apps().len());
        } else {
            debug!("Список защищённых приложений в конфигурации не изменился");
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str) -> ApplicationId {
        ApplicationId::parse(id).unwrap()
    }

    fn set(ids: &[&str]) -> HashSet<ApplicationId> {
        ids.iter().map(|id| app(id)).collect()
    }

    #[test]
    fn test_replace_swaps_whole_set() {
        let registry = LockRegistry::new(set(&["a", "b"]));
        let before = registry.snapshot();

        registry.replace(set(&["c"]));

        assert!(registry.contains(&app("c")));
        assert!(!registry.contains(&app("a")));
        // Ранее выданный снимок остаётся целостным
        assert_eq!(*before, set(&["a", "b"]));
    }

    #[test]
    fn test_feed_lock_and_unlock() {
        let feed = RegistryFeed::new(set(&["a"]));
        let mut rx = feed.subscribe();

        assert!(feed.lock_app(app("b")));
        assert!(!feed.lock_app(app("b")));
        assert!(rx.has_changed().unwrap());
        assert_eq!(**rx.borrow_and_update(), set(&["a", "b"]));

        assert!(feed.unlock_app(&app("a")));
        assert!(!feed.unlock_app(&app("zzz")));
        assert_eq!(*feed.locked_apps(), set(&["b"]));
    }

    #[test]
    fn test_reload_pushes_only_changed_sets() {
        let feed = RegistryFeed::new(set(&["telegram-desktop"]));
        let mut rx = feed.subscribe();

        let mut config = Config::default();
        config.registry.protected_apps = vec!["telegram-desktop".to_string()];
        assert!(!feed.reload(&config));
        assert!(!rx.has_changed().unwrap());

        config.registry.protected_apps = vec!["signal-desktop".to_string(), " ".to_string()];
        assert!(feed.reload(&config));
        assert!(rx.has_changed().unwrap());
        assert_eq!(**rx.borrow_and_update(), set(&["signal-desktop"]));
    }

    #[test]
    fn test_reload_from_config_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "lockgate.toml",
                r#"
                    [registry]
                    protected_apps = ["org.telegram.desktop", "signal-desktop"]
                "#,
            )?;

            let feed = RegistryFeed::new(HashSet::new());
            let config = Config::load("lockgate.toml").map_err(|e| e.to_string())?;
            assert!(feed.reload(&config));
            assert_eq!(*feed.locked_apps(), set(&["org.telegram.desktop", "signal-desktop"]));
            Ok(())
        });
    }
}
