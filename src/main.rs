use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use events::ApplicationId;
use services::credential::setup_pin;
use services::input_methods::{InputMethodProvider, ProcessInputMethodProvider, StaticInputMethodProvider};
use services::lock_engine::EngineHandle;
use services::{
    create_challenge_gate,
    create_focus_source,
    run_challenge_gate,
    CredentialStore,
    FocusResolver,
    IgnoreSet,
    LockCoordinator,
    LockRegistry,
    RegistryFeed,
    UnlockGrantBus,
};

#[derive(Parser, Debug)]
#[command(name = "lockgate")]
#[command(about = "Запрашивает PIN при переходе защищённого приложения на передний план")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "lockgate.toml")]
    config: String,

    /// Режим сухого запуска (эмуляция окон, допуск без PIN)
    #[arg(long)]
    dry_run: bool,

    /// Уровень логирования (по умолчанию - logging.level из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    /// Установить или сменить PIN и вывести хеш для credential.pin_sha256
    #[arg(long)]
    hash_pin: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Arc::new(Config::load(&args.config)?);

    if args.hash_pin {
        return hash_pin(&config);
    }

    // Инициализация системы логирования
    init_tracing(&config, args.log_level.as_deref())?;

    info!("Запуск lockgate v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - окна эмулируются, допуск выдаётся без PIN");
    }

    // Список игнорируемых приложений строится один раз при старте
    let input_methods: Arc<dyn InputMethodProvider> = if args.dry_run {
        Arc::new(StaticInputMethodProvider::new(
            config
                .focus
                .input_method_processes
                .iter()
                .filter_map(|name| ApplicationId::parse(name))
                .collect(),
        ))
    } else {
        Arc::new(ProcessInputMethodProvider::new(
            config.focus.input_method_processes.clone(),
        ))
    };
    let system_shell = ApplicationId::parse(&config.focus.system_shell_id)
        .ok_or_else(|| anyhow::anyhow!("focus.system_shell_id пуст"))?;
    let extra_ignored = config
        .focus
        .extra_ignored_apps
        .iter()
        .filter_map(|app| ApplicationId::parse(app))
        .collect();
    let ignore_set = Arc::new(IgnoreSet::build(system_shell, extra_ignored, input_methods));
    let resolver = Arc::new(FocusResolver::from_config(&config, ignore_set)?);

    let registry_feed = RegistryFeed::new(config.protected_apps());
    let registry = Arc::new(LockRegistry::new(config.protected_apps()));
    info!("Защищённых приложений: {}", registry_feed.locked_apps().len());

    let credentials = Arc::new(CredentialStore::from_hash(config.credential.pin_sha256.clone()));
    if !credentials.is_configured() && !args.dry_run {
        warn!("PIN не настроен (credential.pin_sha256) - защищённые приложения не смогут быть разблокированы");
    }

    let bus = UnlockGrantBus::new(config.grants.bus_capacity);
    let (coordinator, engine, triggers) = LockCoordinator::new(
        resolver,
        registry,
        bus.clone(),
        config.engine.focus_queue_capacity,
    );
    let gate = create_challenge_gate(credentials, bus, args.dry_run);
    let focus_source = create_focus_source(config.clone(), engine.clone(), args.dry_run)?;

    // Ядро следует за лентой реестра; лента живёт до конца main
    let registry_handle = engine.follow_registry_feed(registry_feed.subscribe());

    info!("Все компоненты инициализированы");

    let engine_handle = tokio::spawn(async move {
        if let Err(e) = coordinator.run().await {
            error!("Ошибка в LockCoordinator: {}", e);
        }
    });
    let gate_handle = tokio::spawn(run_challenge_gate(gate, triggers));
    let source_handle = tokio::spawn(async move {
        if let Err(e) = focus_source.run().await {
            error!("Ошибка в источнике фокуса: {}", e);
        }
    });

    info!("Все сервисы запущены");

    wait_for_shutdown(&engine, &registry_feed, &args.config).await;

    info!("Завершение работы...");
    let status = engine.status();
    info!(
        "Запросов проверки: {} (потеряно {}), потеряно событий фокуса: {}",
        status.triggers_emitted,
        status.triggers_dropped,
        engine.dropped_events()
    );

    source_handle.abort();
    gate_handle.abort();
    engine_handle.abort();
    registry_handle.abort();

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = source_handle.await;
        let _ = gate_handle.await;
        let _ = engine_handle.await;
        let _ = registry_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    drop(registry_feed);
    info!("lockgate завершил работу");
    Ok(())
}

/// Ctrl+C завершает работу, SIGHUP перечитывает защищённые приложения,
/// SIGUSR1 пересчитывает список игнорируемых приложений
#[cfg(unix)]
async fn wait_for_shutdown(engine: &EngineHandle, registry_feed: &RegistryFeed, config_path: &str) {
    use tokio::signal::unix::{signal as unix_signal, Signal, SignalKind};

    fn listen(kind: SignalKind, name: &str) -> Option<Signal> {
        match unix_signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("{} недоступен: {}", name, e);
                None
            }
        }
    }

    let mut reload = listen(SignalKind::hangup(), "SIGHUP");
    let mut refresh = listen(SignalKind::user_defined1(), "SIGUSR1");

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                    Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
                }
                return;
            }
            Some(()) = async { reload.as_mut()?.recv().await } => {
                info!("Получен SIGHUP - перечитываем защищённые приложения");
                // Ошибка в новой конфигурации не роняет работающий демон
                match Config::load(config_path) {
                    Ok(config) => {
                        registry_feed.reload(&config);
                    }
                    Err(e) => error!("Конфигурация не перечитана: {:#}", e),
                }
            }
            Some(()) = async { refresh.as_mut()?.recv().await } => {
                info!("Получен SIGUSR1 - пересчитываем игнорируемые приложения");
                engine.refresh_ignore_set();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_engine: &EngineHandle, _registry_feed: &RegistryFeed, _config_path: &str) {
    match signal::ctrl_c().await {
        Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
        Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
    }
}

/// `--hash-pin`: диалог установки PIN без запуска демона
fn hash_pin(config: &Config) -> Result<()> {
    let store = CredentialStore::from_hash(config.credential.pin_sha256.clone());
    let stdin = std::io::stdin();
    let hash = setup_pin(&store, stdin.lock(), std::io::stderr())?;

    eprintln!("Добавьте в конфигурацию:");
    println!("[credential]\npin_sha256 = \"{}\"", hash);
    Ok(())
}

fn init_tracing(config: &Config, cli_level: Option<&str>) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_directive(cli_level)))?;

    let compact = config.compact_logs();
    tracing_subscriber::registry()
        .with(filter)
        .with(compact.then(|| tracing_subscriber::fmt::layer().compact()))
        .with((!compact).then(|| tracing_subscriber::fmt::layer()))
        .init();

    Ok(())
}
