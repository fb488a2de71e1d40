use crate::events::TriggerChallenge;
use crate::services::credential::CredentialStore;
use crate::services::grant_bus::UnlockGrantBus;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::r#trait::ChallengeGate;

/// Число попыток ввода PIN на один запрос
const MAX_ATTEMPTS: usize = 3;

/// Запрашивает PIN в терминале. Пустая строка - отмена: приложение остаётся заблокированным.
pub struct ConsoleChallengeGate<R = BufReader<Stdin>, W = Stdout> {
    credentials: Arc<CredentialStore>,
    bus: UnlockGrantBus,
    io: Mutex<(Lines<R>, W)>,
}

impl ConsoleChallengeGate {
    pub fn new(credentials: Arc<CredentialStore>, bus: UnlockGrantBus) -> Self {
        Self::with_io(
            credentials,
            bus,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

impl<R, W> ConsoleChallengeGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn with_io(credentials: Arc<CredentialStore>, bus: UnlockGrantBus, reader: R, writer: W) -> Self {
        Self {
            credentials,
            bus,
            io: Mutex::new((reader.lines(), writer)),
        }
    }

    /// true - PIN подтверждён
    async fn challenge(&self, trigger: &TriggerChallenge) -> std::io::Result<bool> {
        let mut io = self.io.lock().await;
        let (lines, writer) = &mut *io;

        for attempt in 1..=MAX_ATTEMPTS {
            let prompt = format!(
                "Приложение {} заблокировано. Введите PIN ({}/{}): ",
                trigger.app_id, attempt, MAX_ATTEMPTS
            );
            writer.write_all(prompt.as_bytes()).await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await? else {
                return Ok(false);
            };

            let pin = line.trim();
            if pin.is_empty() {
                info!("Проверка для {} отменена", trigger.app_id);
                return Ok(false);
            }

            if self.credentials.validate_pin(pin) {
                return Ok(true);
            }

            warn!("Неверный PIN для {} (попытка {})", trigger.app_id, attempt);
        }

        Ok(false)
    }
}

#[async_trait::async_trait]
impl<R, W> ChallengeGate for ConsoleChallengeGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn on_trigger(&self, trigger: TriggerChallenge) {
        if !self.credentials.is_configured() {
            warn!("PIN не настроен - {} остаётся заблокированным", trigger.app_id);
            return;
        }

        match self.challenge(&trigger).await {
            Ok(true) => {
                info!("PIN подтверждён, {} разблокировано", trigger.app_id);
                self.bus.publish(trigger.app_id);
            }
            Ok(false) => info!("{} остаётся заблокированным", trigger.app_id),
            Err(e) => error!("Ошибка ввода PIN: {}", e),
        }
    }
}
