use crate::debug_if_enabled;
use crate::events::{Tab, TabId, WindowId};
use crate::host::{TabHost, TabQuery};
use dashmap::DashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

/// Глубина истории активаций на окно. Двух записей достаточно, чтобы
/// восстановить настоящего предшественника, когда новая вкладка успела
/// сама стать активной раньше, чем мы увидели событие её создания.
const HISTORY_DEPTH: usize = 2;

/// Следит за тем, какая вкладка была активна "только что": снимок
/// последней активной вкладки плюс короткая история активаций по окнам.
/// Снимок обновляется и по таймеру, и по событиям хоста; гонки между ними
/// допустимы (побеждает последняя запись) — алгоритм get_source_tab
/// переживает устаревший снимок за счёт отката к истории.
pub struct TabTracker {
    host: Arc<dyn TabHost>,
    refresh_interval: Duration,
    snapshot: RwLock<Option<Tab>>,
    history: DashMap<WindowId, SmallVec<[Tab; HISTORY_DEPTH]>>,
}

impl TabTracker {
    pub fn new(host: Arc<dyn TabHost>, refresh_interval: Duration) -> Self {
        Self {
            host,
            refresh_interval,
            snapshot: RwLock::new(None),
            history: DashMap::new(),
        }
    }

    /// Фоновый цикл периодического обновления снимка
    pub async fn run(self: Arc<Self>) {
        info!(
            "TabTracker запущен, период обновления снимка: {}мс",
            self.refresh_interval.as_millis()
        );
        let mut ticker = interval(self.refresh_interval);
        loop {
            ticker.tick().await;
            self.refresh_snapshot().await;
        }
    }

    /// Обновить снимок: активная вкладка последнего фокусного окна
    pub async fn refresh_snapshot(&self) {
        let query = TabQuery {
            active: Some(true),
            last_focused_window: true,
            ..Default::default()
        };
        match self.host.query_tabs(query).await {
            Ok(tabs) => {
                if let Some(tab) = tabs.into_iter().next() {
                    debug_if_enabled!("Снимок активной вкладки: {}", tab);
                    *self.snapshot.write() = Some(tab);
                }
            }
            Err(e) => warn!("Не удалось обновить снимок активной вкладки: {}", e),
        }
    }

    /// Обработка активации вкладки: пополняет историю окна и снимок.
    /// Повторная активация той же вкладки заменяет нулевую запись,
    /// история не растёт.
    pub async fn handle_activated(&self, tab_id: TabId, window_id: WindowId) {
        let tab = match self.host.get_tab(tab_id).await {
            Ok(tab) => tab,
            Err(e) => {
                // Вкладка могла закрыться между событием и запросом
                warn!("Не удалось обработать активацию {}: {}", tab_id, e);
                return;
            }
        };

        {
            let mut history = self.history.entry(window_id).or_default();
            let head_is_same = history.first().map(|head| head.id == tab.id).unwrap_or(false);
            if head_is_same {
                history[0] = tab.clone();
            } else {
                history.insert(0, tab.clone());
                history.truncate(HISTORY_DEPTH);
            }
        }

        debug_if_enabled!("Активация: {}", tab);
        *self.snapshot.write() = Some(tab);
    }

    pub async fn handle_focus_changed(&self) {
        self.refresh_snapshot().await;
    }

    /// Последняя известная активная вкладка (как есть, без защиты от гонок)
    pub fn last_active(&self) -> Option<Tab> {
        self.snapshot.read().clone()
    }

    /// Кто был активен перед появлением new_tab. None означает "не группировать".
    ///
    /// 1. Берём снимок.
    /// 2. Защита от самоссылки: хост мог сообщить об активации новой
    ///    вкладки раньше события создания, тогда снимок указывает на неё
    ///    саму — отбрасываем его.
    /// 3. Откат к истории окна: если новая вкладка активна, нулевая запись
    ///    уже загрязнена ей самой, берём первую; иначе нулевую.
    pub fn get_source_tab(&self, new_tab: &Tab) -> Option<Tab> {
        let mut source = self.snapshot.read().clone();

        if new_tab.active {
            if let Some(snapshot) = &source {
                if snapshot.id == new_tab.id {
                    debug_if_enabled!("Снимок указывает на саму {}, откат к истории", new_tab.id);
                    source = None;
                }
            }
        }

        if source.is_none() {
            if let Some(history) = self.history.get(&new_tab.window_id) {
                let slot = if new_tab.active { 1 } else { 0 };
                source = history.get(slot).cloned();
            }
        }

        source
    }
}
