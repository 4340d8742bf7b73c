use crate::debug_if_enabled;
use crate::events::{GroupId, GroupSpec, HostEvent, Message, Tab, WindowId};
use crate::host::TabHost;
use crate::services::shortcut_binder::commands;
use crate::services::{ConfigStore, GroupPlacement, TabTracker, TaskScheduler};
use crate::trace_if_enabled;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Одноразовый режим обработки следующей созданной вкладки
enum CaptureMode {
    /// Обычный путь: искать источник и планировать группировку
    None,
    /// Вкладка открыта "обычным способом" — группировку пропустить
    StandardTab,
    /// Вкладка создаётся для новой группы (спецификация — из боковой панели)
    NewGroup { spec: Option<GroupSpec> },
}

/// Оркестратор: единственный потребитель потока событий хоста.
/// Все компоненты внедряются конструктором, события обрабатываются
/// строго по одному.
pub struct Background {
    host: Arc<dyn TabHost>,
    config: Arc<ConfigStore>,
    tracker: Arc<TabTracker>,
    placement: Arc<GroupPlacement>,
    scheduler: Arc<TaskScheduler>,
    /// Канал к исключённому из ядра UI (боковая панель)
    outbound: mpsc::UnboundedSender<Message>,
    capture: Mutex<CaptureMode>,
}

impl Background {
    pub fn new(
        host: Arc<dyn TabHost>,
        config: Arc<ConfigStore>,
        tracker: Arc<TabTracker>,
        placement: Arc<GroupPlacement>,
        scheduler: Arc<TaskScheduler>,
        outbound: mpsc::UnboundedSender<Message>,
    ) -> Self {
        Self {
            host,
            config,
            tracker,
            placement,
            scheduler,
            outbound,
            capture: Mutex::new(CaptureMode::None),
        }
    }

    /// Цикл обработки событий хоста
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<HostEvent>) {
        info!("Background запущен, ждём события хоста");
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("Поток событий хоста закрыт");
    }

    pub async fn handle_event(&self, event: HostEvent) {
        match event {
            HostEvent::TabCreated(tab) => self.handle_tab_created(tab).await,
            HostEvent::TabRemoved(tab_id) => self.scheduler.handle_tab_removed(tab_id).await,
            HostEvent::TabActivated { tab_id, window_id } => {
                self.tracker.handle_activated(tab_id, window_id).await
            }
            HostEvent::WindowFocusChanged => self.tracker.handle_focus_changed().await,
            HostEvent::CommandFired(cmd) => self.handle_command(&cmd).await,
            HostEvent::PreferencesChanged(changes) => self.config.apply(&changes),
            HostEvent::Message(message) => self.handle_message(message).await,
            HostEvent::GroupCreated(_)
            | HostEvent::GroupUpdated(_)
            | HostEvent::GroupRemoved(_)
            | HostEvent::GroupMoved(_) => {
                trace_if_enabled!("Событие жизненного цикла группы проигнорировано");
            }
        }
    }

    async fn handle_tab_created(&self, tab: Tab) {
        if !self.config.snapshot().grouping_enabled {
            // Функция выключена: ни одного вызова хоста
            trace_if_enabled!("Группировка выключена, {} не трогаем", tab.id);
            return;
        }

        let capture = {
            let mut capture = self.capture.lock();
            std::mem::replace(&mut *capture, CaptureMode::None)
        };

        match capture {
            CaptureMode::StandardTab => {
                debug!("Вкладка {} открыта обычным способом", tab.id);
            }
            CaptureMode::NewGroup { spec } => {
                debug_if_enabled!("Вкладка {} уходит в новую группу", tab.id);
                self.placement.create_group(&tab, spec.as_ref()).await;
            }
            CaptureMode::None => match self.tracker.get_source_tab(&tab) {
                Some(source) => self.scheduler.schedule(tab, source).await,
                None => trace_if_enabled!("Для {} нет вкладки-источника", tab.id),
            },
        }
    }

    async fn handle_command(&self, cmd: &str) {
        debug_if_enabled!("Команда: {}", cmd);
        match cmd {
            commands::CANCEL_PENDING_GROUPING => self.scheduler.cancel_all().await,
            commands::OPEN_STANDARD_NEW_TAB => {
                *self.capture.lock() = CaptureMode::StandardTab;
                self.create_host_tab().await;
            }
            commands::OPEN_STANDARD_TAB_IN_NEW_GROUP => {
                *self.capture.lock() = CaptureMode::NewGroup { spec: None };
                self.create_host_tab().await;
            }
            commands::OPEN_SIDEBAR => {
                // Саму панель открывает хост, ядру здесь делать нечего
                debug!("Открытие боковой панели обрабатывается снаружи");
            }
            other => debug!("Неизвестная команда: {}", other),
        }
    }

    /// Маршрутизатор сообщений боковой панели, разбор исчерпывающий
    async fn handle_message(&self, message: Message) {
        match message {
            Message::SidebarOpen => {
                // Панель открыта: следующая вкладка пойдёт в новую группу,
                // панели отвечаем группой текущего источника для контекста
                *self.capture.lock() = CaptureMode::NewGroup { spec: None };
                let group_id = self
                    .tracker
                    .last_active()
                    .map(|tab| tab.group_id)
                    .unwrap_or(GroupId::UNGROUPED);
                let _ = self.outbound.send(Message::SidebarOpenAck { group_id });
            }
            Message::BuildGroup(spec) => {
                *self.capture.lock() = CaptureMode::NewGroup { spec: Some(spec) };
                self.create_host_tab().await;
            }
            // Форма нашего же ответа: входящей быть не должна
            Message::SidebarOpenAck { .. } => {
                trace_if_enabled!("Входящий sidebar-open-ack проигнорирован");
            }
        }
    }

    async fn create_host_tab(&self) {
        // NONE — в текущем фокусном окне
        if let Err(e) = self.host.create_tab(WindowId::NONE).await {
            warn!("Не удалось создать вкладку: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PlacementMode, PrefChanges, Preferences};
    use crate::events::{GroupColor, RelativePosition};
    use crate::host::MemoryHost;
    use crate::services::shortcut_binder::{ShortcutBinder, DEFAULT_SHORTCUTS};
    use std::time::Duration;
    use tokio::time::sleep;

    struct Fixture {
        host: Arc<MemoryHost>,
        background: Arc<Background>,
        scheduler: Arc<TaskScheduler>,
        shortcuts: Arc<ShortcutBinder>,
        outbound: mpsc::UnboundedReceiver<Message>,
        events: mpsc::UnboundedReceiver<HostEvent>,
    }

    fn fixture(prefs: Preferences) -> Fixture {
        let (host, events) = MemoryHost::new();
        for name in commands::MANAGED {
            host.register_command(name, DEFAULT_SHORTCUTS[name]);
        }
        let host_dyn: Arc<dyn TabHost> = host.clone();
        let config = Arc::new(ConfigStore::with_preferences(prefs));
        let tracker = Arc::new(TabTracker::new(host_dyn.clone(), Duration::from_secs(5)));
        let shortcuts = Arc::new(ShortcutBinder::new(host_dyn.clone()));
        let placement = Arc::new(GroupPlacement::new(host_dyn.clone(), config.clone()));
        let scheduler = Arc::new(TaskScheduler::new(
            config.clone(),
            shortcuts.clone(),
            placement.clone(),
        ));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let background = Arc::new(Background::new(
            host_dyn,
            config,
            tracker,
            placement,
            scheduler.clone(),
            outbound_tx,
        ));
        Fixture {
            host,
            background,
            scheduler,
            shortcuts,
            outbound: outbound_rx,
            events,
        }
    }

    /// Прогнать все уже накопленные события хоста через оркестратор
    async fn drain(fx: &mut Fixture) {
        while let Ok(event) = fx.events.try_recv() {
            fx.background.handle_event(event).await;
        }
    }

    /// Окно: вкладка-источник в группе, активирована
    async fn seeded(fx: &mut Fixture) -> Tab {
        let window = fx.host.create_window();
        let source = fx.host.create_tab(window).await.unwrap();
        fx.host.group_tabs(None, &[source.id]).await.unwrap();
        fx.host.activate_tab(source.id).unwrap();
        drain(fx).await;
        fx.host.tab(source.id).unwrap()
    }

    #[tokio::test]
    async fn test_created_tab_joins_source_group_immediately() {
        let mut fx = fixture(Preferences::default());
        let source = seeded(&mut fx).await;

        let new_tab = fx.host.create_tab(source.window_id).await.unwrap();
        drain(&mut fx).await;

        let placed = fx.host.tab(new_tab.id).unwrap();
        assert_eq!(placed.group_id, source.group_id);
        assert_eq!(placed.index, source.index + 1);
    }

    #[tokio::test]
    async fn test_disabled_grouping_issues_no_host_calls() {
        let mut fx = fixture(Preferences {
            grouping_enabled: false,
            ..Default::default()
        });
        let source = seeded(&mut fx).await;
        let joins = fx.host.group_join_calls();
        let moves = fx.host.tab_move_calls();

        fx.host.create_tab(source.window_id).await.unwrap();
        drain(&mut fx).await;

        assert_eq!(fx.host.group_join_calls(), joins);
        assert_eq!(fx.host.tab_move_calls(), moves);
    }

    #[tokio::test]
    async fn test_delayed_scenario_with_cancel_hotkey() {
        let mut fx = fixture(Preferences {
            delay_enabled: true,
            delay_ms: 60,
            ..Default::default()
        });
        let source = seeded(&mut fx).await;

        let first = fx.host.create_tab(source.window_id).await.unwrap();
        let second = fx.host.create_tab(source.window_id).await.unwrap();
        drain(&mut fx).await;
        assert_eq!(fx.scheduler.pending_count(), 2);
        assert!(fx.shortcuts.is_enabled().await);

        // Горячая клавиша отмены: обе задачи снимаются, клавиша отвязывается
        fx.host.fire_command(commands::CANCEL_PENDING_GROUPING);
        drain(&mut fx).await;

        assert_eq!(fx.scheduler.pending_count(), 0);
        assert!(!fx.shortcuts.is_enabled().await);
        sleep(Duration::from_millis(100)).await;
        assert!(fx.host.tab(first.id).unwrap().group_id.is_ungrouped());
        assert!(fx.host.tab(second.id).unwrap().group_id.is_ungrouped());
    }

    #[tokio::test]
    async fn test_standard_new_tab_command_bypasses_grouping() {
        let mut fx = fixture(Preferences::default());
        let source = seeded(&mut fx).await;
        fx.host.focus_window(source.window_id);
        drain(&mut fx).await;

        fx.host.fire_command(commands::OPEN_STANDARD_NEW_TAB);
        drain(&mut fx).await; // команда создаёт вкладку
        drain(&mut fx).await; // и её событие создания

        let tabs = fx
            .host
            .query_tabs(crate::host::TabQuery {
                window_id: Some(source.window_id),
                ..Default::default()
            })
            .await
            .unwrap();
        let standard = tabs.last().unwrap();
        assert_ne!(standard.id, source.id);
        assert!(standard.group_id.is_ungrouped());
    }

    #[tokio::test]
    async fn test_new_group_command_creates_group() {
        let mut fx = fixture(Preferences::default());
        let source = seeded(&mut fx).await;
        fx.host.focus_window(source.window_id);
        drain(&mut fx).await;

        fx.host.fire_command(commands::OPEN_STANDARD_TAB_IN_NEW_GROUP);
        drain(&mut fx).await;
        drain(&mut fx).await;

        let tabs = fx
            .host
            .query_tabs(crate::host::TabQuery {
                window_id: Some(source.window_id),
                ..Default::default()
            })
            .await
            .unwrap();
        let created = tabs.iter().find(|t| t.id != source.id).unwrap();
        assert!(!created.group_id.is_ungrouped());
        // Именно новая группа, не группа источника
        assert_ne!(created.group_id, source.group_id);
    }

    #[tokio::test]
    async fn test_sidebar_open_acks_with_source_group() {
        let mut fx = fixture(Preferences::default());
        let source = seeded(&mut fx).await;

        fx.host.push_message(Message::SidebarOpen);
        drain(&mut fx).await;

        let ack = fx.outbound.try_recv().unwrap();
        assert_eq!(
            ack,
            Message::SidebarOpenAck {
                group_id: source.group_id
            }
        );
    }

    #[tokio::test]
    async fn test_build_group_message_flow() {
        let mut fx = fixture(Preferences::default());
        let source = seeded(&mut fx).await;
        fx.host.focus_window(source.window_id);
        drain(&mut fx).await;

        let spec = GroupSpec {
            title: "исследование".to_string(),
            color: GroupColor::Purple,
            position: RelativePosition::After,
            relative_group_id: source.group_id,
        };
        fx.host.push_message(Message::BuildGroup(spec));
        drain(&mut fx).await; // сообщение → создание вкладки
        drain(&mut fx).await; // событие создания → новая группа

        let tabs = fx
            .host
            .query_tabs(crate::host::TabQuery {
                window_id: Some(source.window_id),
                ..Default::default()
            })
            .await
            .unwrap();
        let created = tabs.iter().find(|t| t.id != source.id).unwrap();
        let group = fx.host.group(created.group_id).unwrap();
        assert_eq!(group.title, "исследование");
        assert_eq!(group.color, GroupColor::Purple);
        // Сразу за группой источника
        assert_eq!(created.index, source.index + 1);
    }

    #[tokio::test]
    async fn test_preference_change_applies_live() {
        let mut fx = fixture(Preferences::default());
        let source = seeded(&mut fx).await;

        fx.host.apply_pref_changes(PrefChanges {
            placement_mode: Some(PlacementMode::First),
            ..Default::default()
        });
        drain(&mut fx).await;

        // Второй участник группы, чтобы режим first был отличим от after
        let second = fx.host.create_tab(source.window_id).await.unwrap();
        drain(&mut fx).await;
        let third = fx.host.create_tab(source.window_id).await.unwrap();
        drain(&mut fx).await;

        let _ = second;
        let placed = fx.host.tab(third.id).unwrap();
        // Режим first: минимальный индекс среди остальных участников
        assert_eq!(placed.index, 0);
    }

    #[tokio::test]
    async fn test_no_source_means_no_grouping() {
        let mut fx = fixture(Preferences::default());
        let window = fx.host.create_window();
        // Ни активаций, ни снимка: источника нет
        let new_tab = fx.host.create_tab(window).await.unwrap();
        drain(&mut fx).await;

        assert!(fx.host.tab(new_tab.id).unwrap().group_id.is_ungrouped());
        assert_eq!(fx.host.group_join_calls(), 0);
    }

    #[tokio::test]
    async fn test_removed_pending_tab_cleans_up() {
        let mut fx = fixture(Preferences {
            delay_enabled: true,
            delay_ms: 100,
            ..Default::default()
        });
        let source = seeded(&mut fx).await;

        let new_tab = fx.host.create_tab(source.window_id).await.unwrap();
        drain(&mut fx).await;
        assert_eq!(fx.scheduler.pending_count(), 1);

        fx.host.remove_tab(new_tab.id).unwrap();
        drain(&mut fx).await;

        assert_eq!(fx.scheduler.pending_count(), 0);
        assert!(!fx.shortcuts.is_enabled().await);
    }
}
