use crate::debug_if_enabled;
use crate::error::Result;
use crate::host::TabHost;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Логические команды, которыми управляет биндер
pub mod commands {
    pub const OPEN_STANDARD_NEW_TAB: &str = "open-standard-new-tab";
    pub const OPEN_STANDARD_TAB_IN_NEW_GROUP: &str = "open-standard-tab-in-new-group";
    pub const OPEN_SIDEBAR: &str = "open-sidebar";
    pub const CANCEL_PENDING_GROUPING: &str = "cancel-pending-grouping";

    /// Фиксированный порядок перепривязки
    pub const MANAGED: [&str; 4] = [
        CANCEL_PENDING_GROUPING,
        OPEN_SIDEBAR,
        OPEN_STANDARD_NEW_TAB,
        OPEN_STANDARD_TAB_IN_NEW_GROUP,
    ];
}

/// Сочетания по умолчанию, если пользователь ничего не настраивал
pub static DEFAULT_SHORTCUTS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (commands::CANCEL_PENDING_GROUPING, "Ctrl+`"),
        (commands::OPEN_SIDEBAR, "Alt+Shift+`"),
        (commands::OPEN_STANDARD_NEW_TAB, "Alt+`"),
        (commands::OPEN_STANDARD_TAB_IN_NEW_GROUP, "Ctrl+Shift+`"),
    ])
});

struct BinderState {
    /// Команда → сочетание, настроенное пользователем (читается один раз)
    key_map: BTreeMap<String, String>,
    is_set: bool,
    is_enabled: bool,
}

/// Управляет привязкой глобальных горячих клавиш: пока ни одна задача
/// группировки не ожидает, клавиша отмены не должна занимать сочетание.
///
/// Состояние за tokio-мьютексом: enable()/disable() выполняют серию
/// вызовов хоста, и две пересекающиеся серии не должны чередоваться.
pub struct ShortcutBinder {
    host: Arc<dyn TabHost>,
    state: tokio::sync::Mutex<BinderState>,
}

impl ShortcutBinder {
    pub fn new(host: Arc<dyn TabHost>) -> Self {
        Self {
            host,
            state: tokio::sync::Mutex::new(BinderState {
                key_map: BTreeMap::new(),
                is_set: false,
                is_enabled: false,
            }),
        }
    }

    /// Привязать все управляемые команды. Идемпотентно.
    /// Ошибки хоста гасятся на этой границе — вызывающий может повторить.
    pub async fn enable(&self) {
        if let Err(e) = self.try_enable().await {
            warn!("Не удалось включить горячие клавиши: {}", e);
        }
    }

    /// Снять привязку со всех управляемых команд. Идемпотентно.
    pub async fn disable(&self) {
        if let Err(e) = self.try_disable().await {
            warn!("Не удалось выключить горячие клавиши: {}", e);
        }
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.is_enabled
    }

    async fn try_enable(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.is_enabled {
            return Ok(());
        }
        if !state.is_set {
            self.read_user_shortcuts(&mut state).await?;
        }

        // Последовательно: каждая перепривязка должна завершиться до
        // следующей, иначе хост может их переупорядочить. Сбой обрывает
        // серию, достигнутое частичное состояние остаётся как есть.
        for name in commands::MANAGED {
            if let Some(shortcut) = state.key_map.get(name) {
                self.host.update_command(name, shortcut).await?;
                debug_if_enabled!("Привязано {} → {}", name, shortcut);
            }
        }
        state.is_enabled = true;
        info!("Горячие клавиши включены");
        Ok(())
    }

    async fn try_disable(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.is_enabled {
            return Ok(());
        }

        for name in commands::MANAGED {
            if state.key_map.contains_key(name) {
                self.host.update_command(name, "").await?;
                debug_if_enabled!("Отвязано {}", name);
            }
        }
        state.is_enabled = false;
        info!("Горячие клавиши выключены");
        Ok(())
    }

    /// Однократное ленивое чтение пользовательских сочетаний из реестра хоста
    async fn read_user_shortcuts(&self, state: &mut BinderState) -> Result<()> {
        let all = self.host.all_commands().await?;
        for name in commands::MANAGED {
            let user_shortcut = all
                .iter()
                .find(|cmd| cmd.name == name)
                .filter(|cmd| !cmd.shortcut.is_empty())
                .map(|cmd| cmd.shortcut.clone());
            let shortcut = user_shortcut.or_else(|| {
                DEFAULT_SHORTCUTS.get(name).map(|s| (*s).to_string())
            });
            if let Some(shortcut) = shortcut {
                state.key_map.insert(name.to_string(), shortcut);
            }
        }
        state.is_set = true;
        debug_if_enabled!("Сочетания пользователя прочитаны: {:?}", state.key_map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn binder_with_host() -> (Arc<MemoryHost>, ShortcutBinder) {
        let (host, _events) = MemoryHost::new();
        for name in commands::MANAGED {
            host.register_command(name, DEFAULT_SHORTCUTS[name]);
        }
        let binder = ShortcutBinder::new(host.clone());
        (host, binder)
    }

    #[tokio::test]
    async fn test_enable_binds_all_managed() {
        let (host, binder) = binder_with_host();
        // Эмулируем исходное состояние: привязок нет
        for name in commands::MANAGED {
            host.register_command(name, "");
        }

        binder.enable().await;
        assert!(binder.is_enabled().await);
        for name in commands::MANAGED {
            assert_eq!(
                host.command_shortcut(name).unwrap(),
                DEFAULT_SHORTCUTS[name]
            );
        }
    }

    #[tokio::test]
    async fn test_disable_clears_bindings() {
        let (host, binder) = binder_with_host();
        binder.enable().await;
        binder.disable().await;

        assert!(!binder.is_enabled().await);
        for name in commands::MANAGED {
            assert_eq!(host.command_shortcut(name).unwrap(), "");
        }
    }

    #[tokio::test]
    async fn test_enable_and_disable_idempotent() {
        let (host, binder) = binder_with_host();

        binder.enable().await;
        binder.enable().await;
        assert!(binder.is_enabled().await);
        let bound = host.command_shortcut(commands::CANCEL_PENDING_GROUPING);

        binder.disable().await;
        binder.disable().await;
        assert!(!binder.is_enabled().await);
        assert_eq!(
            host.command_shortcut(commands::CANCEL_PENDING_GROUPING).unwrap(),
            ""
        );

        // Повторное включение возвращает то же состояние
        binder.enable().await;
        assert_eq!(host.command_shortcut(commands::CANCEL_PENDING_GROUPING), bound);
    }

    #[tokio::test]
    async fn test_user_shortcut_wins_over_default() {
        let (host, _events) = MemoryHost::new();
        for name in commands::MANAGED {
            host.register_command(name, "");
        }
        host.register_command(commands::CANCEL_PENDING_GROUPING, "Ctrl+Shift+C");
        let binder = ShortcutBinder::new(host.clone());

        binder.enable().await;
        assert_eq!(
            host.command_shortcut(commands::CANCEL_PENDING_GROUPING).unwrap(),
            "Ctrl+Shift+C"
        );
    }

    #[tokio::test]
    async fn test_failed_rebind_leaves_partial_state_and_retries() {
        // Реестр пуст: первая же перепривязка падает, серия обрывается,
        // флаг enabled не взводится — вызывающий вправе повторить
        let (host, _events) = MemoryHost::new();
        let binder = ShortcutBinder::new(host.clone());

        binder.enable().await;
        assert!(!binder.is_enabled().await);

        // После появления команд в реестре повтор проходит
        for name in commands::MANAGED {
            host.register_command(name, "");
        }
        binder.enable().await;
        assert!(binder.is_enabled().await);
    }
}
