use crate::config::{PrefChanges, Preferences};
use crate::error::{GroupTabError, Result};
use crate::events::{GroupId, HostEvent, Message, Tab, TabGroup, TabId, WindowId};
use crate::host::{CommandInfo, GroupUpdate, TabHost, TabQuery};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Хост в памяти: эмулирует браузер для режима dry-run и для тестов.
/// Поддерживает порядок вкладок в окне так же, как это делает хост:
/// вступление в группу ставит вкладку в конец непрерывного блока группы,
/// перенос группы двигает весь блок целиком.
pub struct MemoryHost {
    state: Mutex<HostState>,
    events: mpsc::UnboundedSender<HostEvent>,
}

struct HostState {
    windows: BTreeMap<WindowId, Vec<TabId>>,
    tabs: HashMap<TabId, Tab>,
    groups: HashMap<GroupId, TabGroup>,
    focused_window: WindowId,
    commands: BTreeMap<String, String>,
    pref_overrides: PrefChanges,
    next_tab_id: i64,
    next_group_id: i64,
    next_window_id: i64,
    // Счётчики вызовов для проверок "хост не трогали"
    group_join_calls: usize,
    tab_move_calls: usize,
    group_move_calls: usize,
}

impl Default for HostState {
    fn default() -> Self {
        Self {
            windows: BTreeMap::new(),
            tabs: HashMap::new(),
            groups: HashMap::new(),
            focused_window: WindowId::NONE,
            commands: BTreeMap::new(),
            pref_overrides: PrefChanges::default(),
            next_tab_id: 1,
            next_group_id: 1,
            next_window_id: 1,
            group_join_calls: 0,
            tab_move_calls: 0,
            group_move_calls: 0,
        }
    }
}

impl HostState {
    /// Пересчитать поле index у всех вкладок окна по фактическому порядку
    fn reindex(&mut self, window_id: WindowId) {
        if let Some(order) = self.windows.get(&window_id) {
            for (index, tab_id) in order.clone().into_iter().enumerate() {
                if let Some(tab) = self.tabs.get_mut(&tab_id) {
                    tab.index = index;
                }
            }
        }
    }

    /// Переставить вкладку в конец блока её группы (поведение хоста при group-join)
    fn snap_to_group_block(&mut self, tab_id: TabId, group_id: GroupId, window_id: WindowId) {
        let Some(order) = self.windows.get(&window_id) else {
            return;
        };
        let mut order = order.clone();
        order.retain(|id| *id != tab_id);

        let block_end = order
            .iter()
            .rposition(|id| {
                self.tabs
                    .get(id)
                    .map(|t| t.group_id == group_id)
                    .unwrap_or(false)
            })
            .map(|pos| pos + 1)
            .unwrap_or(order.len());

        order.insert(block_end, tab_id);
        self.windows.insert(window_id, order);
        self.reindex(window_id);
    }
}

impl MemoryHost {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            state: Mutex::new(HostState::default()),
            events: tx,
        });
        (host, rx)
    }

    fn emit(&self, event: HostEvent) {
        // Получатель мог завершиться — для хоста это не ошибка
        let _ = self.events.send(event);
    }

    // --- сторона хоста: то, что в браузере делает пользователь ---

    pub fn create_window(&self) -> WindowId {
        let mut state = self.state.lock();
        let window_id = WindowId(state.next_window_id);
        state.next_window_id += 1;
        state.windows.insert(window_id, Vec::new());
        if state.focused_window.is_none() {
            state.focused_window = window_id;
        }
        window_id
    }

    pub fn focus_window(&self, window_id: WindowId) {
        self.state.lock().focused_window = window_id;
        self.emit(HostEvent::WindowFocusChanged);
    }

    pub fn activate_tab(&self, tab_id: TabId) -> Result<()> {
        let window_id = {
            let mut state = self.state.lock();
            let window_id = state
                .tabs
                .get(&tab_id)
                .map(|t| t.window_id)
                .ok_or(GroupTabError::TabNotFound(tab_id))?;
            if let Some(order) = state.windows.get(&window_id) {
                for id in order.clone() {
                    if let Some(tab) = state.tabs.get_mut(&id) {
                        tab.active = id == tab_id;
                    }
                }
            }
            window_id
        };
        self.emit(HostEvent::TabActivated { tab_id, window_id });
        Ok(())
    }

    pub fn remove_tab(&self, tab_id: TabId) -> Result<()> {
        {
            let mut state = self.state.lock();
            let tab = state
                .tabs
                .remove(&tab_id)
                .ok_or(GroupTabError::TabNotFound(tab_id))?;
            if let Some(order) = state.windows.get_mut(&tab.window_id) {
                order.retain(|id| *id != tab_id);
            }
            state.reindex(tab.window_id);
        }
        self.emit(HostEvent::TabRemoved(tab_id));
        Ok(())
    }

    pub fn fire_command(&self, name: &str) {
        self.emit(HostEvent::CommandFired(name.to_string()));
    }

    pub fn register_command(&self, name: &str, shortcut: &str) {
        self.state
            .lock()
            .commands
            .insert(name.to_string(), shortcut.to_string());
    }

    pub fn apply_pref_changes(&self, changes: PrefChanges) {
        {
            let mut state = self.state.lock();
            let mut merged = state.pref_overrides;
            if changes.grouping_enabled.is_some() {
                merged.grouping_enabled = changes.grouping_enabled;
            }
            if changes.placement_mode.is_some() {
                merged.placement_mode = changes.placement_mode;
            }
            if changes.delay_enabled.is_some() {
                merged.delay_enabled = changes.delay_enabled;
            }
            if changes.delay_ms.is_some() {
                merged.delay_ms = changes.delay_ms;
            }
            state.pref_overrides = merged;
        }
        self.emit(HostEvent::PreferencesChanged(changes));
    }

    pub fn seed_preferences(&self, prefs: &Preferences) {
        self.state.lock().pref_overrides = PrefChanges {
            grouping_enabled: Some(prefs.grouping_enabled),
            placement_mode: Some(prefs.placement_mode),
            delay_enabled: Some(prefs.delay_enabled),
            delay_ms: Some(prefs.delay_ms),
        };
    }

    pub fn push_message(&self, message: Message) {
        self.emit(HostEvent::Message(message));
    }

    // --- инспекция для тестов и демо-логов ---

    pub fn tab(&self, tab_id: TabId) -> Option<Tab> {
        self.state.lock().tabs.get(&tab_id).cloned()
    }

    pub fn group(&self, group_id: GroupId) -> Option<TabGroup> {
        self.state.lock().groups.get(&group_id).cloned()
    }

    pub fn command_shortcut(&self, name: &str) -> Option<String> {
        self.state.lock().commands.get(name).cloned()
    }

    pub fn group_join_calls(&self) -> usize {
        self.state.lock().group_join_calls
    }

    pub fn tab_move_calls(&self) -> usize {
        self.state.lock().tab_move_calls
    }

    pub fn group_move_calls(&self) -> usize {
        self.state.lock().group_move_calls
    }

    /// Текстовая раскладка окна: вкладки по порядку, блоки групп в скобках
    pub fn layout(&self, window_id: WindowId) -> String {
        let state = self.state.lock();
        let Some(order) = state.windows.get(&window_id) else {
            return String::new();
        };
        let mut out = String::new();
        let mut open_group = GroupId::UNGROUPED;
        for tab_id in order {
            let Some(tab) = state.tabs.get(tab_id) else {
                continue;
            };
            if tab.group_id != open_group {
                if !open_group.is_ungrouped() {
                    out.push(']');
                }
                if !tab.group_id.is_ungrouped() {
                    let _ = write!(out, " [{}:", tab.group_id);
                }
                open_group = tab.group_id;
            }
            let _ = write!(out, " {}", tab.id);
        }
        if !open_group.is_ungrouped() {
            out.push(']');
        }
        out.trim_start().to_string()
    }
}

#[async_trait::async_trait]
impl TabHost for MemoryHost {
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<Tab>> {
        let state = self.state.lock();
        let mut result = Vec::new();
        for (window_id, order) in &state.windows {
            if let Some(wanted) = query.window_id {
                if *window_id != wanted {
                    continue;
                }
            }
            if query.last_focused_window && *window_id != state.focused_window {
                continue;
            }
            for tab_id in order {
                let Some(tab) = state.tabs.get(tab_id) else {
                    continue;
                };
                if let Some(active) = query.active {
                    if tab.active != active {
                        continue;
                    }
                }
                if let Some(group_id) = query.group_id {
                    if tab.group_id != group_id {
                        continue;
                    }
                }
                result.push(tab.clone());
            }
        }
        Ok(result)
    }

    async fn get_tab(&self, tab_id: TabId) -> Result<Tab> {
        self.state
            .lock()
            .tabs
            .get(&tab_id)
            .cloned()
            .ok_or(GroupTabError::TabNotFound(tab_id))
    }

    async fn create_tab(&self, window_id: WindowId) -> Result<Tab> {
        let tab = {
            let mut state = self.state.lock();
            let window_id = if window_id.is_none() {
                state.focused_window
            } else {
                window_id
            };
            if !state.windows.contains_key(&window_id) {
                return Err(GroupTabError::WindowNotFound(window_id));
            }
            let tab_id = TabId(state.next_tab_id);
            state.next_tab_id += 1;
            let index = state.windows.get(&window_id).map(Vec::len).unwrap_or(0);
            let tab = Tab::new(tab_id, window_id)
                .with_index(index)
                .with_title(format!("Вкладка {}", tab_id.value()));
            state.tabs.insert(tab_id, tab.clone());
            if let Some(order) = state.windows.get_mut(&window_id) {
                order.push(tab_id);
            }
            tab
        };
        self.emit(HostEvent::TabCreated(tab.clone()));
        Ok(tab)
    }

    async fn move_tab(&self, tab_id: TabId, index: usize) -> Result<()> {
        let mut state = self.state.lock();
        state.tab_move_calls += 1;
        let window_id = state
            .tabs
            .get(&tab_id)
            .map(|t| t.window_id)
            .ok_or(GroupTabError::TabNotFound(tab_id))?;
        if let Some(order) = state.windows.get_mut(&window_id) {
            order.retain(|id| *id != tab_id);
            let target = index.min(order.len());
            order.insert(target, tab_id);
        }
        state.reindex(window_id);
        Ok(())
    }

    async fn group_tabs(&self, group_id: Option<GroupId>, tab_ids: &[TabId]) -> Result<GroupId> {
        let (group_id, created) = {
            let mut state = self.state.lock();
            state.group_join_calls += 1;
            match group_id {
                Some(group_id) => {
                    if !state.groups.contains_key(&group_id) {
                        return Err(GroupTabError::GroupNotFound(group_id));
                    }
                    for tab_id in tab_ids {
                        let window_id = state
                            .tabs
                            .get(tab_id)
                            .map(|t| t.window_id)
                            .ok_or(GroupTabError::TabNotFound(*tab_id))?;
                        if let Some(tab) = state.tabs.get_mut(tab_id) {
                            tab.group_id = group_id;
                        }
                        state.snap_to_group_block(*tab_id, group_id, window_id);
                    }
                    (group_id, None)
                }
                None => {
                    let first = tab_ids
                        .first()
                        .ok_or_else(|| GroupTabError::Internal("пустой список вкладок".into()))?;
                    let window_id = state
                        .tabs
                        .get(first)
                        .map(|t| t.window_id)
                        .ok_or(GroupTabError::TabNotFound(*first))?;
                    let group_id = GroupId(state.next_group_id);
                    state.next_group_id += 1;
                    let group = TabGroup::new(group_id, window_id);
                    state.groups.insert(group_id, group.clone());
                    for tab_id in tab_ids {
                        if let Some(tab) = state.tabs.get_mut(tab_id) {
                            tab.group_id = group_id;
                        }
                        state.snap_to_group_block(*tab_id, group_id, window_id);
                    }
                    (group_id, Some(group))
                }
            }
        };
        if let Some(group) = created {
            self.emit(HostEvent::GroupCreated(group));
        }
        Ok(group_id)
    }

    async fn query_groups(&self, window_id: Option<WindowId>) -> Result<Vec<TabGroup>> {
        let state = self.state.lock();
        let mut groups: Vec<TabGroup> = state
            .groups
            .values()
            .filter(|g| window_id.map(|w| g.window_id == w).unwrap_or(true))
            .cloned()
            .collect();
        groups.sort_by_key(|g| g.id);
        Ok(groups)
    }

    async fn update_group(&self, group_id: GroupId, update: GroupUpdate) -> Result<()> {
        let group = {
            let mut state = self.state.lock();
            let group = state
                .groups
                .get_mut(&group_id)
                .ok_or(GroupTabError::GroupNotFound(group_id))?;
            if let Some(title) = update.title {
                group.title = title;
            }
            if let Some(color) = update.color {
                group.color = color;
            }
            if let Some(collapsed) = update.collapsed {
                group.collapsed = collapsed;
            }
            group.clone()
        };
        self.emit(HostEvent::GroupUpdated(group));
        Ok(())
    }

    async fn move_group(&self, group_id: GroupId, index: usize) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.group_move_calls += 1;
            let window_id = state
                .groups
                .get(&group_id)
                .map(|g| g.window_id)
                .ok_or(GroupTabError::GroupNotFound(group_id))?;
            let members: Vec<TabId> = state
                .windows
                .get(&window_id)
                .ok_or(GroupTabError::WindowNotFound(window_id))?
                .iter()
                .copied()
                .filter(|id| {
                    state
                        .tabs
                        .get(id)
                        .map(|t| t.group_id == group_id)
                        .unwrap_or(false)
                })
                .collect();
            let Some(order) = state.windows.get_mut(&window_id) else {
                return Err(GroupTabError::WindowNotFound(window_id));
            };
            order.retain(|id| !members.contains(id));
            let target = index.min(order.len());
            for (offset, tab_id) in members.into_iter().enumerate() {
                order.insert(target + offset, tab_id);
            }
            state.reindex(window_id);
        }
        self.emit(HostEvent::GroupMoved(group_id));
        Ok(())
    }

    async fn all_commands(&self) -> Result<Vec<CommandInfo>> {
        Ok(self
            .state
            .lock()
            .commands
            .iter()
            .map(|(name, shortcut)| CommandInfo {
                name: name.clone(),
                shortcut: shortcut.clone(),
            })
            .collect())
    }

    async fn update_command(&self, name: &str, shortcut: &str) -> Result<()> {
        let mut state = self.state.lock();
        match state.commands.get_mut(name) {
            Some(bound) => {
                *bound = shortcut.to_string();
                Ok(())
            }
            None => Err(GroupTabError::CommandNotFound(name.to_string())),
        }
    }

    async fn get_preferences(&self, defaults: Preferences) -> Result<Preferences> {
        let state = self.state.lock();
        let mut prefs = defaults;
        let overrides = state.pref_overrides;
        if let Some(enabled) = overrides.grouping_enabled {
            prefs.grouping_enabled = enabled;
        }
        if let Some(mode) = overrides.placement_mode {
            prefs.placement_mode = mode;
        }
        if let Some(enabled) = overrides.delay_enabled {
            prefs.delay_enabled = enabled;
        }
        if let Some(ms) = overrides.delay_ms {
            prefs.delay_ms = ms;
        }
        Ok(prefs)
    }
}
