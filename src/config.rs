use crate::events::ApplicationId;
use crate::services::focus_resolver::PatternSet;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub focus: FocusConfig,
    pub source: SourceConfig,
    pub registry: RegistryConfig,
    pub engine: EngineConfig,
    pub grants: GrantsConfig,
    pub credential: CredentialConfig,
    // Оптимизационные индексы - не сериализуются, строятся после загрузки
    #[serde(skip)]
    input_method_patterns: PatternSet,
    #[serde(skip)]
    challenge_screen_patterns: PatternSet,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Уровень по умолчанию, если не задан `--log-level`
    pub level: String,
    /// `compact` или `full`
    pub format: String,
    /// Дополнительные директивы EnvFilter, например `lockgate::services::focus_source=debug`
    #[serde(default)]
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FocusConfig {
    /// Идентификатор самого lockgate
    pub self_app_id: String,
    /// Системная оболочка, события которой никогда не считаются сменой приложения
    pub system_shell_id: String,
    /// Подстроки класса UI, по которым распознаются клавиатуры и оверлеи
    pub input_method_hint_patterns: Vec<String>,
    /// Подстроки класса UI экрана проверки lockgate
    pub challenge_screen_patterns: Vec<String>,
    /// Имена процессов методов ввода для перечисления при старте
    pub input_method_processes: Vec<String>,
    #[serde(default)]
    pub extra_ignored_apps: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    pub detection_mode: String,
    pub polling_interval_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub protected_apps: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    pub focus_queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GrantsConfig {
    pub bus_capacity: usize,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CredentialConfig {
    /// SHA-256 от PIN в нижнем регистре hex
    #[serde(default)]
    pub pin_sha256: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
                filter: String::new(),
            },
            focus: FocusConfig {
                self_app_id: "lockgate".to_string(),
                system_shell_id: "gnome-shell".to_string(),
                input_method_hint_patterns: vec!["InputMethod".to_string(), "IME".to_string()],
                challenge_screen_patterns: vec!["lockscreen".to_string(), "challenge".to_string()],
                input_method_processes: vec![
                    "ibus-daemon".to_string(),
                    "fcitx5".to_string(),
                    "fcitx".to_string(),
                    "onboard".to_string(),
                    "squeekboard".to_string(),
                ],
                extra_ignored_apps: Vec::new(),
            },
            source: SourceConfig {
                detection_mode: "auto".to_string(),
                polling_interval_ms: 500,
            },
            registry: RegistryConfig::default(),
            engine: EngineConfig {
                focus_queue_capacity: 256,
            },
            grants: GrantsConfig { bus_capacity: 4 },
            credential: CredentialConfig::default(),
            input_method_patterns: PatternSet::default(),
            challenge_screen_patterns: PatternSet::default(),
        };
        config.build_optimization_indexes();
        config
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("LOCKGATE_").split("__"));

        let mut config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;
        config.build_optimization_indexes();

        Ok(config)
    }

    /// Строит нормализованные наборы паттернов для Focus Resolver
    pub fn build_optimization_indexes(&mut self) {
        self.input_method_patterns = PatternSet::new(&self.focus.input_method_hint_patterns);
        self.challenge_screen_patterns = PatternSet::new(&self.focus.challenge_screen_patterns);
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "full" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        if self.focus.self_app_id.trim().is_empty() {
            anyhow::bail!("focus.self_app_id не может быть пустым");
        }

        if self.focus.system_shell_id.trim().is_empty() {
            anyhow::bail!("focus.system_shell_id не может быть пустым");
        }

        match self.source.detection_mode.as_str() {
            "auto" | "xdotool" | "wmctrl" | "sway" => {}
            _ => anyhow::bail!(
                "Неверный режим детекции окон: {}",
                self.source.detection_mode
            ),
        }

        if self.source.polling_interval_ms < 100 {
            anyhow::bail!("polling_interval_ms должно быть минимум 100");
        }

        if self.engine.focus_queue_capacity == 0 {
            anyhow::bail!("focus_queue_capacity должно быть больше 0");
        }

        if self.grants.bus_capacity == 0 {
            anyhow::bail!("bus_capacity должно быть больше 0");
        }

        for (i, app) in self.registry.protected_apps.iter().enumerate() {
            if app.trim().is_empty() {
                anyhow::bail!("Пустой идентификатор приложения в protected_apps #{}", i + 1);
            }
        }

        if let Some(hash) = &self.credential.pin_sha256 {
            if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                anyhow::bail!("pin_sha256 должен быть SHA-256 в hex (64 символа)");
            }
        }

        Ok(())
    }

    /// Директива EnvFilter: уровень из CLI важнее уровня из конфигурации
    pub fn log_directive(&self, cli_level: Option<&str>) -> String {
        let level = cli_level.unwrap_or(&self.logging.level);
        let filter = self.logging.filter.trim();

        if filter.is_empty() {
            level.to_string()
        } else {
            format!("{},{}", level, filter)
        }
    }

    pub fn compact_logs(&self) -> bool {
        self.logging.format == "compact"
    }

    pub fn input_method_patterns(&self) -> &PatternSet {
        &self.input_method_patterns
    }

    pub fn challenge_screen_patterns(&self) -> &PatternSet {
        &self.challenge_screen_patterns
    }

    pub fn self_app_id(&self) -> Option<ApplicationId> {
        ApplicationId::parse(&self.focus.self_app_id)
    }

    /// Начальное содержимое реестра защищённых приложений
    pub fn protected_apps(&self) -> HashSet<ApplicationId> {
        self.registry
            .protected_apps
            .iter()
            .filter_map(|app| ApplicationId::parse(app))
            .collect()
    }
}
