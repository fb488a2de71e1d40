//! Focus Resolver: normalizes raw focus notifications into the current foreground
//! application identifier.
//!
//! The resolver is a pure function of the raw event, the pattern sets and the
//! ignore-set snapshot. It MUST NOT hold any state about previous events: debounce,
//! throttling and grants belong exclusively to the lock engine.

mod ignore_set;
mod patterns;

pub use ignore_set::IgnoreSet;
pub use patterns::PatternSet;

use crate::config::Config;
use crate::debug_if_enabled;
use crate::error::Result;
use crate::lock_error;
use crate::events::{ApplicationId, RawFocusEvent};
use std::sync::Arc;

pub struct FocusResolver {
    ignore_set: Arc<IgnoreSet>,
    input_method_patterns: PatternSet,
    challenge_screen_patterns: PatternSet,
    self_app_id: ApplicationId,
}

impl FocusResolver {
    pub fn new(
        ignore_set: Arc<IgnoreSet>,
        input_method_patterns: PatternSet,
        challenge_screen_patterns: PatternSet,
        self_app_id: ApplicationId,
    ) -> Self {
        Self {
            ignore_set,
            input_method_patterns,
            challenge_screen_patterns,
            self_app_id,
        }
    }

    pub fn from_config(config: &Config, ignore_set: Arc<IgnoreSet>) -> Result<Self> {
        let self_app_id = config
            .self_app_id()
            .ok_or_else(|| lock_error!(internal, "focus.self_app_id пуст"))?;

        Ok(Self::new(
            ignore_set,
            config.input_method_patterns().clone(),
            config.challenge_screen_patterns().clone(),
            self_app_id,
        ))
    }

    pub fn ignore_set(&self) -> &Arc<IgnoreSet> {
        &self.ignore_set
    }

    /// Определить приложение переднего плана по сырому событию.
    ///
    /// `None` означает "это событие не является сменой приложения".
    pub fn resolve(&self, event: &RawFocusEvent) -> Option<ApplicationId> {
        let class_hint = event.class_hint();

        // Клавиатуры и оверлеи отсекаем до всего остального
        if let Some(hint) = class_hint {
            if self.input_method_patterns.matches(hint) {
                debug_if_enabled!("Игнорируем событие от класса метода ввода: {}", hint);
                return None;
            }
        }

        let source = event.source_id();
        if let Some(source) = &source {
            if self.ignore_set.contains(source) {
                debug_if_enabled!("Игнорируем событие от игнорируемого приложения: {}", source);
                return None;
            }
        }

        // Владелец окна надёжнее источника события
        let resolved = event.owner_id().or(source)?;

        if self.ignore_set.contains(&resolved) {
            debug_if_enabled!("Владелец окна {} в списке игнорируемых", resolved);
            return None;
        }

        // Собственное приложение: гасим только экран проверки, чтобы не зациклиться
        if resolved == self.self_app_id {
            if let Some(hint) = class_hint {
                if self.challenge_screen_patterns.matches(hint) {
                    debug_if_enabled!("Игнорируем собственный экран проверки: {}", hint);
                    return None;
                }
            }
        }

        Some(resolved)
    }
}
