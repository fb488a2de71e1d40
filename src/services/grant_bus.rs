use crate::events::ApplicationId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Ёмкость буфера шины по умолчанию: важен только последний допуск
pub const DEFAULT_GRANT_BUS_CAPACITY: usize = 4;

/// Многоадресная шина уведомлений "приложение временно разблокировано".
///
/// Публикация никогда не блокирует: при отставании подписчика самые старые
/// непрочитанные значения вытесняются.
#[derive(Clone)]
pub struct UnlockGrantBus {
    tx: broadcast::Sender<ApplicationId>,
    published: Arc<AtomicU64>,
}

impl Default for UnlockGrantBus {
    fn default() -> Self {
        Self::new(DEFAULT_GRANT_BUS_CAPACITY)
    }
}

impl UnlockGrantBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            published: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Опубликовать допуск. Возвращает число подписчиков, получивших значение
    pub fn publish(&self, app_id: ApplicationId) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        match self.tx.send(app_id) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(app_id)) => {
                // Нет подписчиков - не ошибка
                debug!("Допуск для {} опубликован без подписчиков", app_id);
                0
            }
        }
    }

    pub fn subscribe(&self) -> GrantSubscription {
        GrantSubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

pub struct GrantSubscription {
    rx: broadcast::Receiver<ApplicationId>,
}

impl GrantSubscription {
    /// Следующий допуск; `None`, когда шина закрыта.
    /// Пропущенные из-за переполнения значения отбрасываются молча.
    pub async fn recv(&mut self) -> Option<ApplicationId> {
        loop {
            match self.rx.recv().await {
                Ok(app_id) => return Some(app_id),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Шина допусков переполнена, пропущено {} значений", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Неблокирующий вариант для синхронного кода
    pub fn try_recv(&mut self) -> Option<ApplicationId> {
        loop {
            match self.rx.try_recv() {
                Ok(app_id) => return Some(app_id),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Шина допусков переполнена, пропущено {} значений", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str) -> ApplicationId {
        ApplicationId::parse(id).unwrap()
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = UnlockGrantBus::default();
        assert_eq!(bus.publish(app("a")), 0);
        assert_eq!(bus.published_count(), 1);
    }

    #[test]
    fn test_subscriber_receives_in_order() {
        let bus = UnlockGrantBus::default();
        let mut sub = bus.subscribe();

        bus.publish(app("a"));
        bus.publish(app("b"));

        assert_eq!(sub.try_recv(), Some(app("a")));
        assert_eq!(sub.try_recv(), Some(app("b")));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_no_replay_before_subscription() {
        let bus = UnlockGrantBus::default();
        bus.publish(app("early"));

        let mut sub = bus.subscribe();
        bus.publish(app("late"));

        assert_eq!(sub.try_recv(), Some(app("late")));
        assert_eq!(sub.try_recv(), None);
    }

    #[test]
    fn test_lagging_subscriber_drops_oldest() {
        let bus = UnlockGrantBus::new(4);
        let mut sub = bus.subscribe();

        for id in ["a", "b", "c", "d", "e", "f"] {
            bus.publish(app(id));
        }

        // Вытеснены самые старые, последние четыре сохранены
        let received: Vec<_> = std::iter::from_fn(|| sub.try_recv()).collect();
        assert_eq!(received, vec![app("c"), app("d"), app("e"), app("f")]);
    }

    #[tokio::test]
    async fn test_async_recv_and_close() {
        let bus = UnlockGrantBus::default();
        let mut sub = bus.subscribe();

        bus.publish(app("x"));
        assert_eq!(sub.recv().await, Some(app("x")));

        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
