//! Host surface: responsibility and boundaries
//!
//! Этот модуль отвечает ТОЛЬКО за границу с хостом (браузером): запросы и
//! мутации вкладок/групп/команд/настроек плюс поток уведомлений HostEvent.
//! Никакой бизнес-логики группировки здесь быть не должно — все решения
//! принимают сервисы поверх трейта TabHost.

pub mod demo;
mod memory;

pub use memory::MemoryHost;

use crate::config::Preferences;
use crate::error::Result;
use crate::events::{GroupColor, GroupId, Tab, TabGroup, TabId, WindowId};

/// Фильтр запроса вкладок (зеркало query-by-filter у хоста)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabQuery {
    pub active: Option<bool>,
    pub last_focused_window: bool,
    pub window_id: Option<WindowId>,
    pub group_id: Option<GroupId>,
}

/// Частичное обновление группы
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub title: Option<String>,
    pub color: Option<GroupColor>,
    pub collapsed: Option<bool>,
}

/// Команда (горячая клавиша) в реестре хоста
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub shortcut: String,
}

/// Абстракция хоста. Все вызовы асинхронные: каждый `await` —
/// потенциальная точка чередования обработчиков.
#[async_trait::async_trait]
pub trait TabHost: Send + Sync {
    // --- вкладки ---
    async fn query_tabs(&self, query: TabQuery) -> Result<Vec<Tab>>;
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab>;
    /// window_id == NONE означает "в текущем фокусном окне"
    async fn create_tab(&self, window_id: WindowId) -> Result<Tab>;
    async fn move_tab(&self, tab_id: TabId, index: usize) -> Result<()>;
    /// group_id == None создаёт новую группу из перечисленных вкладок
    async fn group_tabs(&self, group_id: Option<GroupId>, tab_ids: &[TabId]) -> Result<GroupId>;

    // --- группы ---
    async fn query_groups(&self, window_id: Option<WindowId>) -> Result<Vec<TabGroup>>;
    async fn update_group(&self, group_id: GroupId, update: GroupUpdate) -> Result<()>;
    async fn move_group(&self, group_id: GroupId, index: usize) -> Result<()>;

    // --- реестр команд ---
    async fn all_commands(&self) -> Result<Vec<CommandInfo>>;
    /// Пустая строка shortcut снимает привязку
    async fn update_command(&self, name: &str, shortcut: &str) -> Result<()>;

    // --- хранилище настроек ---
    async fn get_preferences(&self, defaults: Preferences) -> Result<Preferences>;
}
