use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Режим размещения новой вкладки внутри группы
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlacementMode {
    /// Сразу после вкладки-источника
    After,
    /// Первой в группе
    First,
    /// Последней (хост сам добавляет в конец)
    Last,
}

impl Default for PlacementMode {
    fn default() -> Self {
        PlacementMode::After
    }
}

/// Живые пользовательские настройки (хранилище настроек хоста).
/// Все компоненты читают их только через снимок.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub grouping_enabled: bool,
    pub placement_mode: PlacementMode,
    pub delay_enabled: bool,
    pub delay_ms: u64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            grouping_enabled: true,
            placement_mode: PlacementMode::After,
            delay_enabled: false,
            delay_ms: 1000,
        }
    }
}

impl Preferences {
    /// Применить дельту из уведомления хоста об изменении настроек
    pub fn apply(&mut self, changes: &PrefChanges) {
        if let Some(enabled) = changes.grouping_enabled {
            self.grouping_enabled = enabled;
        }
        if let Some(mode) = changes.placement_mode {
            self.placement_mode = mode;
        }
        if let Some(enabled) = changes.delay_enabled {
            self.delay_enabled = enabled;
        }
        if let Some(ms) = changes.delay_ms {
            self.delay_ms = ms;
        }
    }
}

/// Дельта настроек: зеркало payload'а уведомления on-changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefChanges {
    pub grouping_enabled: Option<bool>,
    pub placement_mode: Option<PlacementMode>,
    pub delay_enabled: Option<bool>,
    pub delay_ms: Option<u64>,
}

impl PrefChanges {
    pub fn is_empty(&self) -> bool {
        self.grouping_enabled.is_none()
            && self.placement_mode.is_none()
            && self.delay_enabled.is_none()
            && self.delay_ms.is_none()
    }
}

/// Конфигурация процесса (не путать с Preferences — те живут у хоста)
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub tracker: TrackerConfig,
    pub demo: DemoConfig,
    /// Начальные значения настроек для эмулируемого хоста
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Период фонового обновления снимка активной вкладки
    pub snapshot_refresh_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            snapshot_refresh_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Интервал между созданием вкладок в режиме эмуляции
    pub tab_interval_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            tab_interval_ms: 4000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            tracker: TrackerConfig::default(),
            demo: DemoConfig::default(),
            preferences: Preferences::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::new()
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TABGROUP_"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация трекера
        if self.tracker.snapshot_refresh_ms < 100 {
            anyhow::bail!("snapshot_refresh_ms должно быть минимум 100");
        }

        // Валидация эмуляции
        if self.demo.tab_interval_ms < 100 {
            anyhow::bail!("demo.tab_interval_ms должно быть минимум 100");
        }

        Ok(())
    }
}
