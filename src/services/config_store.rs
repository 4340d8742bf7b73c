use crate::config::{PrefChanges, Preferences};
use crate::debug_if_enabled;
use crate::host::TabHost;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Живые пользовательские настройки: читаются при старте из хранилища хоста,
/// дальше обновляются только уведомлениями on-changed. Остальные компоненты
/// видят их исключительно через snapshot().
pub struct ConfigStore {
    prefs: RwLock<Preferences>,
}

impl ConfigStore {
    pub async fn init(host: &Arc<dyn TabHost>) -> Self {
        let prefs = match host.get_preferences(Preferences::default()).await {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("Не удалось прочитать настройки, используем значения по умолчанию: {}", e);
                Preferences::default()
            }
        };
        info!("Настройки загружены: {:?}", prefs);
        Self {
            prefs: RwLock::new(prefs),
        }
    }

    #[cfg(test)]
    pub fn with_preferences(prefs: Preferences) -> Self {
        Self {
            prefs: RwLock::new(prefs),
        }
    }

    pub fn apply(&self, changes: &PrefChanges) {
        if changes.is_empty() {
            return;
        }
        let mut prefs = self.prefs.write();
        prefs.apply(changes);
        debug_if_enabled!("Настройки обновлены: {:?}", *prefs);
    }

    pub fn snapshot(&self) -> Preferences {
        *self.prefs.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementMode;
    use crate::host::MemoryHost;

    #[tokio::test]
    async fn test_init_reads_host_preferences() {
        let (host, _events) = MemoryHost::new();
        host.apply_pref_changes(PrefChanges {
            delay_enabled: Some(true),
            delay_ms: Some(250),
            ..Default::default()
        });

        let host: Arc<dyn TabHost> = host;
        let store = ConfigStore::init(&host).await;
        let prefs = store.snapshot();
        assert!(prefs.delay_enabled);
        assert_eq!(prefs.delay_ms, 250);
        assert!(prefs.grouping_enabled);
    }

    #[test]
    fn test_apply_merges_delta() {
        let store = ConfigStore::with_preferences(Preferences::default());
        store.apply(&PrefChanges {
            grouping_enabled: Some(false),
            placement_mode: Some(PlacementMode::Last),
            ..Default::default()
        });

        let prefs = store.snapshot();
        assert!(!prefs.grouping_enabled);
        assert_eq!(prefs.placement_mode, PlacementMode::Last);
        assert_eq!(prefs.delay_ms, 1000);
    }
}
