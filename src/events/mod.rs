pub mod message;
pub mod tab;

pub use message::{GroupSpec, Message, RelativePosition};
pub use tab::{GroupColor, GroupId, Tab, TabGroup, TabId, WindowId};

use crate::config::PrefChanges;

/// Уведомление хоста: единственный вход в ядро.
/// Порядок доставки create/activate хост не гарантирует.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    TabCreated(Tab),
    TabRemoved(TabId),
    TabActivated { tab_id: TabId, window_id: WindowId },
    WindowFocusChanged,
    CommandFired(String),
    PreferencesChanged(PrefChanges),
    Message(Message),
    // Жизненный цикл групп: ядру не нужен, получаем и игнорируем
    GroupCreated(TabGroup),
    GroupUpdated(TabGroup),
    GroupRemoved(GroupId),
    GroupMoved(GroupId),
}
