use crate::debug_if_enabled;
use crate::events::{Tab, TabId};
use crate::services::{ConfigStore, GroupPlacement, ShortcutBinder};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::info;

/// Отложенная задача группировки: отменяемая ручка таймера
struct PendingTask {
    handle: JoinHandle<()>,
}

/// Координатор задержки и отмены. Решает, группировать сразу или через
/// паузу; держит не более одного таймера на новую вкладку; включает
/// клавишу отмены, пока есть хоть одна ожидающая задача.
///
/// Инвариант: карта pending непуста ⟺ биндер включён. Каждый путь,
/// убирающий последнюю запись, обязан выключить биндер.
pub struct TaskScheduler {
    config: Arc<ConfigStore>,
    shortcuts: Arc<ShortcutBinder>,
    placement: Arc<GroupPlacement>,
    pending: Arc<DashMap<TabId, PendingTask>>,
}

impl TaskScheduler {
    pub fn new(
        config: Arc<ConfigStore>,
        shortcuts: Arc<ShortcutBinder>,
        placement: Arc<GroupPlacement>,
    ) -> Self {
        Self {
            config,
            shortcuts,
            placement,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Точка входа: новая вкладка и её источник.
    /// Настройки читаются один раз на задачу, снимком.
    pub async fn schedule(&self, new_tab: Tab, source: Tab) {
        let prefs = self.config.snapshot();

        if !prefs.delay_enabled {
            self.placement.join_group(&new_tab, &source).await;
            return;
        }

        if new_tab.id.is_none() {
            return;
        }

        self.shortcuts.enable().await;

        let tab_id = new_tab.id;
        let delay = Duration::from_millis(prefs.delay_ms);
        let pending = Arc::clone(&self.pending);
        let shortcuts = Arc::clone(&self.shortcuts);
        let placement = Arc::clone(&self.placement);

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            // Сначала снимаем свою запись, потом любые вызовы хоста:
            // отмена, пришедшая после этой точки, нас уже не касается
            pending.remove(&tab_id);
            if pending.is_empty() {
                shortcuts.disable().await;
            }
            placement.join_group(&new_tab, &source).await;
        });
        // Вставка до ближайшей точки прерывания: задача не начнёт
        // выполняться, пока текущий обработчик не уступит поток
        self.pending.insert(tab_id, PendingTask { handle });
        debug_if_enabled!("Задача группировки {} отложена на {}мс", tab_id, prefs.delay_ms);
    }

    /// Вкладку закрыли раньше срабатывания таймера: снять только её задачу
    pub async fn handle_tab_removed(&self, tab_id: TabId) {
        if let Some((_, task)) = self.pending.remove(&tab_id) {
            task.handle.abort();
            debug_if_enabled!("Задача группировки {} снята: вкладка закрыта", tab_id);
            if self.pending.is_empty() {
                self.shortcuts.disable().await;
            }
        }
    }

    /// Глобальная отмена по горячей клавише: все таймеры, целиком
    pub async fn cancel_all(&self) {
        let count = self.pending.len();
        if count > 0 {
            info!("Отмена {} отложенных задач группировки", count);
        }
        let keys: Vec<TabId> = self.pending.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            if let Some((_, task)) = self.pending.remove(&key) {
                task.handle.abort();
            }
        }
        self.shortcuts.disable().await;
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
