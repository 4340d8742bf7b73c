use serde::{Deserialize, Serialize};
use std::fmt;

/// Идентификатор вкладки (непрозрачный id хоста)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub i64);

impl TabId {
    /// Сентинел хоста "вкладки нет"
    pub const NONE: TabId = TabId(-1);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/// Идентификатор окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub i64);

impl WindowId {
    pub const NONE: WindowId = WindowId(-1);

    #[allow(dead_code)]
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// Идентификатор группы вкладок
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl GroupId {
    /// Сентинел "вкладка не состоит ни в одной группе"
    pub const UNGROUPED: GroupId = GroupId(-1);

    #[allow(dead_code)]
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_ungrouped(&self) -> bool {
        *self == Self::UNGROUPED
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Палитра цветов групп у хоста
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Blue,
    Cyan,
    Grey,
    Green,
    Orange,
    Pink,
    Purple,
    Red,
    Yellow,
}

impl Default for GroupColor {
    fn default() -> Self {
        GroupColor::Grey
    }
}

/// Вкладка: принадлежит хосту, мы только читаем и просим перемещения
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    pub group_id: GroupId,
    pub index: usize,
    pub active: bool,
    pub title: String,
}

impl Tab {
    pub fn new(id: TabId, window_id: WindowId) -> Self {
        Self {
            id,
            window_id,
            group_id: GroupId::UNGROUPED,
            index: 0,
            active: false,
            title: String::new(),
        }
    }

    pub fn with_group(mut self, group_id: GroupId) -> Self {
        self.group_id = group_id;
        self
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group_id.is_ungrouped() {
            write!(f, "{}@{}[{}]", self.id, self.window_id, self.index)
        } else {
            write!(f, "{}@{}[{}] в {}", self.id, self.window_id, self.index, self.group_id)
        }
    }
}

/// Группа вкладок: создаётся и изменяется только через запросы к хосту
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabGroup {
    pub id: GroupId,
    pub window_id: WindowId,
    pub title: String,
    pub color: GroupColor,
    pub collapsed: bool,
}

impl TabGroup {
    pub fn new(id: GroupId, window_id: WindowId) -> Self {
        Self {
            id,
            window_id,
            title: String::new(),
            color: GroupColor::default(),
            collapsed: false,
        }
    }
}

impl fmt::Display for TabGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.title.is_empty() {
            write!(f, "{}@{}", self.id, self.window_id)
        } else {
            write!(f, "{} \"{}\"@{}", self.id, self.title, self.window_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        assert!(TabId::NONE.is_none());
        assert!(!TabId(7).is_none());
        assert!(GroupId::UNGROUPED.is_ungrouped());
        assert!(!GroupId(0).is_ungrouped());
    }

    #[test]
    fn test_tab_builder() {
        let tab = Tab::new(TabId(3), WindowId(1))
            .with_group(GroupId(5))
            .with_index(2)
            .with_active(true)
            .with_title("docs");

        assert_eq!(tab.id, TabId(3));
        assert_eq!(tab.group_id, GroupId(5));
        assert_eq!(tab.index, 2);
        assert!(tab.active);
        assert_eq!(tab.title, "docs");
    }
}
