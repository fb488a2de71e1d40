use super::{ForegroundState, LockEngine};
use crate::error::Result;
use crate::events::{ApplicationId, RawFocusEvent, TriggerChallenge, UnlockGrant};
use crate::services::focus_resolver::FocusResolver;
use crate::services::grant_bus::{GrantSubscription, UnlockGrantBus};
use crate::services::lock_registry::{LockRegistry, RegistrySnapshot};
use crate::{debug_if_enabled, trace_if_enabled};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Ёмкость очереди запросов проверки к экрану блокировки
const TRIGGER_QUEUE_CAPACITY: usize = 16;

/// Снимок состояния движка для диагностики
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStatus {
    pub foreground: ForegroundState,
    pub grant: Option<UnlockGrant>,
    /// Запросы, принятые очередью экрана проверки
    pub triggers_emitted: u64,
    /// Запросы, потерянные из-за переполненной или закрытой очереди
    pub triggers_dropped: u64,
}

/// Единственная точка оценки: владеет `LockEngine` и последовательно
/// обрабатывает события фокуса и допуски.
pub struct LockCoordinator {
    resolver: Arc<FocusResolver>,
    registry: Arc<LockRegistry>,
    engine: LockEngine,
    focus_rx: mpsc::Receiver<RawFocusEvent>,
    grants: GrantSubscription,
    triggers: mpsc::Sender<TriggerChallenge>,
    status: Arc<RwLock<EngineStatus>>,
}

/// Входные точки ядра для внешних производителей
#[derive(Clone)]
pub struct EngineHandle {
    focus_tx: mpsc::Sender<RawFocusEvent>,
    resolver: Arc<FocusResolver>,
    registry: Arc<LockRegistry>,
    bus: UnlockGrantBus,
    status: Arc<RwLock<EngineStatus>>,
    dropped_events: Arc<AtomicU64>,
}

impl LockCoordinator {
    pub fn new(
        resolver: Arc<FocusResolver>,
        registry: Arc<LockRegistry>,
        bus: UnlockGrantBus,
        focus_queue_capacity: usize,
    ) -> (Self, EngineHandle, mpsc::Receiver<TriggerChallenge>) {
        let (focus_tx, focus_rx) = mpsc::channel(focus_queue_capacity.max(1));
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE_CAPACITY);
        let status = Arc::new(RwLock::new(EngineStatus::default()));

        let coordinator = Self {
            resolver: Arc::clone(&resolver),
            registry: Arc::clone(&registry),
            engine: LockEngine::new(),
            focus_rx,
            // Подписка до выдачи handle: ни один допуск не потеряется
            grants: bus.subscribe(),
            triggers: trigger_tx,
            status: Arc::clone(&status),
        };

        let handle = EngineHandle {
            focus_tx,
            resolver,
            registry,
            bus,
            status,
            dropped_events: Arc::new(AtomicU64::new(0)),
        };

        (coordinator, handle, trigger_rx)
    }

    /// Цикл работает, пока жив хотя бы один `EngineHandle`
    pub async fn run(mut self) -> Result<()> {
        info!("LockCoordinator запущен");
        let mut grants_open = true;

        loop {
            tokio::select! {
                // Допуски применяются раньше событий фокуса, пришедших одновременно
                biased;

                grant = self.grants.recv(), if grants_open => match grant {
                    Some(app_id) => self.handle_grant(app_id),
                    None => {
                        debug!("Шина допусков закрыта");
                        grants_open = false;
                    }
                },

                event = self.focus_rx.recv() => match event {
                    Some(event) => self.handle_focus(event),
                    None => break,
                },
            }
        }

        info!("LockCoordinator завершил работу");
        Ok(())
    }

    fn handle_grant(&mut self, app_id: ApplicationId) {
        self.engine.on_grant(app_id, Instant::now());
        self.publish_status();
    }

    fn handle_focus(&mut self, event: RawFocusEvent) {
        trace_if_enabled!("Событие фокуса: {}", event);

        let Some(app_id) = self.resolver.resolve(&event) else {
            return;
        };

        // Реестр читается лениво - в момент оценки
        let locked = self.registry.snapshot();
        let trigger = self.engine.on_focus(app_id, &locked, event.observed_at);

        if let Some(trigger) = trigger {
            let delivered = match self.triggers.try_send(trigger) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(trigger)) => {
                    warn!("Очередь экрана блокировки переполнена, {} пропущен", trigger);
                    false
                }
                Err(mpsc::error::TrySendError::Closed(trigger)) => {
                    warn!("Экран блокировки не слушает запросы, {} пропущен", trigger);
                    false
                }
            };

            let mut status = self.status.write();
            if delivered {
                status.triggers_emitted += 1;
            } else {
                status.triggers_dropped += 1;
            }
        }

        self.publish_status();
    }

    fn publish_status(&self) {
        let mut status = self.status.write();
        status.foreground = self.engine.foreground().clone();
        status.grant = self.engine.grant().cloned();
    }
}

impl EngineHandle {
    /// Уведомление наблюдателя ОС о смене фокуса. Никогда не блокирует:
    /// при переполненной очереди событие отбрасывается.
    pub fn notify_focus_changed(&self, event: RawFocusEvent) -> bool {
        match self.focus_tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                // Логируем каждое десятое, чтобы не спамить
                if dropped % 10 == 1 {
                    warn!(dropped, "Очередь событий фокуса переполнена, пропуск: {}", event);
                }
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug_if_enabled!("LockCoordinator остановлен, событие фокуса отброшено");
                false
            }
        }
    }

    pub fn update_lock_registry(&self, apps: impl Into<RegistrySnapshot>) {
        self.registry.replace(apps);
    }

    /// Применять каждое значение ленты реестра, пока лента жива.
    /// Текущее значение ленты применяется сразу.
    pub fn follow_registry_feed(&self, mut updates: watch::Receiver<RegistrySnapshot>) -> JoinHandle<()> {
        let handle = self.clone();

        tokio::spawn(async move {
            let initial = updates.borrow_and_update().clone();
            handle.update_lock_registry(initial);

            while updates.changed().await.is_ok() {
                let apps = updates.borrow_and_update().clone();
                handle.update_lock_registry(apps);
            }

            debug!("Лента обновлений реестра закрыта");
        })
    }

    pub fn publish_unlock_grant(&self, app_id: ApplicationId) {
        self.bus.publish(app_id);
    }

    pub fn refresh_ignore_set(&self) {
        self.resolver.ignore_set().refresh();
    }

    pub fn grant_bus(&self) -> &UnlockGrantBus {
        &self.bus
    }

    pub fn status(&self) -> EngineStatus {
        self.status.read().clone()
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::focus_resolver::{IgnoreSet, PatternSet};
    use crate::services::input_methods::StaticInputMethodProvider;
    use crate::services::lock_registry::RegistryFeed;
    use std::collections::HashSet;
    use std::time::Duration;
    use tokio::time::timeout;

    fn app(id: &str) -> ApplicationId {
        ApplicationId::parse(id).unwrap()
    }

    fn focus(id: &str, at: Instant) -> RawFocusEvent {
        let mut event = RawFocusEvent::from_source(id);
        event.observed_at = at;
        event
    }

    fn setup(locked: &[&str]) -> (LockCoordinator, EngineHandle, mpsc::Receiver<TriggerChallenge>) {
        let provider = Arc::new(StaticInputMethodProvider::new(vec![app("onboard")]));
        let ignore_set = Arc::new(IgnoreSet::build(app("org.gnome.Shell"), Vec::new(), provider));
        let resolver = Arc::new(FocusResolver::new(
            ignore_set,
            PatternSet::new(&["InputMethod", "IME"]),
            PatternSet::new(&["lockscreen"]),
            app("lockgate"),
        ));
        let registry = Arc::new(LockRegistry::new(locked.iter().map(|id| app(id)).collect()));

        LockCoordinator::new(resolver, registry, UnlockGrantBus::default(), 32)
    }

    async fn next_trigger(rx: &mut mpsc::Receiver<TriggerChallenge>) -> Option<ApplicationId> {
        timeout(Duration::from_millis(500), rx.recv())
            .await
            .ok()
            .flatten()
            .map(|trigger| trigger.app_id)
    }

    async fn wait_for<F: Fn(&EngineStatus) -> bool>(handle: &EngineHandle, check: F) -> bool {
        for _ in 0..50 {
            if check(&handle.status()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_relock_loop_through_coordinator() {
        let (coordinator, handle, mut triggers) = setup(&["x"]);
        let task = tokio::spawn(coordinator.run());
        let t0 = Instant::now();

        assert!(handle.notify_focus_changed(focus("x", t0)));
        assert_eq!(next_trigger(&mut triggers).await, Some(app("x")));

        handle.publish_unlock_grant(app("x"));
        assert!(wait_for(&handle, |s| s.grant.is_some()).await);

        handle.notify_focus_changed(focus("y", t0 + Duration::from_secs(1)));
        assert!(wait_for(&handle, |s| s.grant.is_none()).await);

        handle.notify_focus_changed(focus("x", t0 + Duration::from_secs(2)));
        assert_eq!(next_trigger(&mut triggers).await, Some(app("x")));
        assert_eq!(handle.status().triggers_emitted, 2);

        drop(handle);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ignored_events_leave_foreground_untouched() {
        let (coordinator, handle, mut triggers) = setup(&["org.gnome.Shell", "onboard"]);
        let task = tokio::spawn(coordinator.run());
        let t0 = Instant::now();

        handle.notify_focus_changed(focus("a", t0));
        handle.notify_focus_changed(focus("org.gnome.Shell", t0));
        handle.notify_focus_changed(focus("onboard", t0));
        handle.notify_focus_changed(focus("b", t0).with_class_hint("InputMethodPopup"));
        handle.notify_focus_changed(focus("c", t0));

        assert!(wait_for(&handle, |s| s.foreground.current == Some(app("c"))).await);
        let status = handle.status();
        assert_eq!(status.foreground.previous, Some(app("a")));
        assert_eq!(status.triggers_emitted, 0);
        assert_eq!(next_trigger(&mut triggers).await, None);

        drop(handle);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_registry_update_applies_to_next_event() {
        let (coordinator, handle, mut triggers) = setup(&[]);
        let task = tokio::spawn(coordinator.run());
        let t0 = Instant::now();

        handle.notify_focus_changed(focus("x", t0));
        assert!(wait_for(&handle, |s| s.foreground.current == Some(app("x"))).await);

        handle.update_lock_registry([app("x")].into_iter().collect::<HashSet<_>>());
        handle.notify_focus_changed(focus("y", t0 + Duration::from_secs(1)));
        handle.notify_focus_changed(focus("x", t0 + Duration::from_secs(2)));
        assert_eq!(next_trigger(&mut triggers).await, Some(app("x")));

        drop(handle);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_registry_feed_drives_engine() {
        let (coordinator, handle, mut triggers) = setup(&[]);
        let task = tokio::spawn(coordinator.run());
        let feed = RegistryFeed::new(HashSet::new());
        let follower = handle.follow_registry_feed(feed.subscribe());
        let t0 = Instant::now();

        let mut config = crate::config::Config::default();
        config.registry.protected_apps = vec!["telegram-desktop".to_string()];
        assert!(feed.reload(&config));

        let mut applied = false;
        for _ in 0..50 {
            if handle.registry.contains(&app("telegram-desktop")) {
                applied = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(applied);

        handle.notify_focus_changed(focus("telegram-desktop", t0));
        assert_eq!(next_trigger(&mut triggers).await, Some(app("telegram-desktop")));

        drop(feed);
        follower.await.unwrap();
        drop(handle);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_undelivered_triggers_are_not_counted_as_emitted() {
        let (coordinator, handle, triggers) = setup(&["x"]);
        drop(triggers);
        let task = tokio::spawn(coordinator.run());

        handle.notify_focus_changed(focus("x", Instant::now()));
        assert!(wait_for(&handle, |s| s.triggers_dropped == 1).await);
        assert_eq!(handle.status().triggers_emitted, 0);

        drop(handle);
        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let provider = Arc::new(StaticInputMethodProvider::new(Vec::new()));
        let ignore_set = Arc::new(IgnoreSet::build(app("shell"), Vec::new(), provider));
        let resolver = Arc::new(FocusResolver::new(
            ignore_set,
            PatternSet::default(),
            PatternSet::default(),
            app("lockgate"),
        ));
        let (_coordinator, handle, _triggers) = LockCoordinator::new(
            resolver,
            Arc::new(LockRegistry::default()),
            UnlockGrantBus::default(),
            1,
        );

        assert!(handle.notify_focus_changed(RawFocusEvent::from_source("a")));
        assert!(!handle.notify_focus_changed(RawFocusEvent::from_source("b")));
        assert_eq!(handle.dropped_events(), 1);
    }
}
