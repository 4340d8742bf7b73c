use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

mod config;
mod error;
mod events;
mod host;
mod services;
mod utils;

use config::Config;
use host::{MemoryHost, TabHost};
use services::shortcut_binder::{commands, DEFAULT_SHORTCUTS};
use services::{
    Background, ConfigStore, GroupPlacement, ShortcutBinder, TabTracker, TaskScheduler,
};

#[derive(Parser, Debug)]
#[command(name = "tabgroup-rust")]
#[command(about = "Автогруппировка новых вкладок: новая вкладка уходит в группу последней активной")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "tabgroup.toml")]
    config: String,

    /// Генерировать синтетические события браузера
    #[arg(long)]
    demo: bool,

    /// Уровень логирования
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Инициализация системы логирования
    init_tracing(&args.log_level)?;

    info!("Запуск tabgroup-rust v{}", env!("CARGO_PKG_VERSION"));

    // Загрузка конфигурации (отсутствующий файл — значения по умолчанию)
    let config = if std::path::Path::new(&args.config).exists() {
        let config = Config::load(&args.config)?;
        info!("Конфигурация загружена из: {}", args.config);
        config
    } else {
        info!("Файл {} не найден, конфигурация по умолчанию", args.config);
        Config::default()
    };

    // Хост в памяти: в этом процессе браузера нет, его изображает эмуляция
    let (host, host_events) = MemoryHost::new();
    host.seed_preferences(&config.preferences);
    for name in commands::MANAGED {
        host.register_command(name, DEFAULT_SHORTCUTS[name]);
    }
    let host_dyn: Arc<dyn TabHost> = host.clone();

    // Инициализация компонентов: все зависимости через конструктор
    let config_store = Arc::new(ConfigStore::init(&host_dyn).await);
    let tracker = Arc::new(TabTracker::new(
        host_dyn.clone(),
        Duration::from_millis(config.tracker.snapshot_refresh_ms),
    ));
    let shortcuts = Arc::new(ShortcutBinder::new(host_dyn.clone()));
    let placement = Arc::new(GroupPlacement::new(host_dyn.clone(), config_store.clone()));
    let scheduler = Arc::new(TaskScheduler::new(
        config_store.clone(),
        shortcuts.clone(),
        placement.clone(),
    ));
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let background = Arc::new(Background::new(
        host_dyn,
        config_store,
        tracker.clone(),
        placement,
        scheduler.clone(),
        outbound_tx,
    ));

    info!("Все компоненты инициализированы");

    // Запуск всех сервисов параллельно
    let background_handle = tokio::spawn(background.run(host_events));
    let tracker_handle = tokio::spawn(tracker.run());
    let outbound_handle = tokio::spawn(async move {
        // Боковой панели в этом процессе нет — её сообщения уходят в лог
        while let Some(message) = outbound_rx.recv().await {
            debug!("Исходящее сообщение панели: {:?}", message);
        }
    });
    let demo_handle = if args.demo {
        Some(tokio::spawn(host::demo::run(
            host.clone(),
            Duration::from_millis(config.demo.tab_interval_ms),
        )))
    } else {
        info!("Эмуляция выключена (--demo), событий хоста не будет");
        None
    };

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Получен сигнал завершения (Ctrl+C)");
        }
        Err(err) => {
            error!("Ошибка при ожидании сигнала завершения: {}", err);
        }
    }

    info!("Завершение работы...");

    // Снимаем отложенные задачи: это же отвязывает клавишу отмены
    scheduler.cancel_all().await;

    // Прерываем задачи сервисов
    if let Some(handle) = &demo_handle {
        handle.abort();
    }
    background_handle.abort();
    tracker_handle.abort();
    outbound_handle.abort();

    // Ожидаем завершения задач (с таймаутом)
    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        let _ = background_handle.await;
        let _ = tracker_handle.await;
        let _ = outbound_handle.await;
        if let Some(handle) = demo_handle {
            let _ = handle.await;
        }
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("tabgroup-rust завершил работу");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
