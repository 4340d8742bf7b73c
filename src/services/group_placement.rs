use crate::config::PlacementMode;
use crate::events::{GroupSpec, RelativePosition, Tab};
use crate::host::{GroupUpdate, TabHost, TabQuery};
use crate::services::ConfigStore;
use crate::trace_if_enabled;
use std::sync::Arc;
use tracing::warn;

/// Выполняет сами действия группировки: вступление новой вкладки в группу
/// источника с размещением по политике, либо создание новой группы.
///
/// Все пути сюда best-effort: группировка — удобство, она не имеет права
/// уронить обработчик событий. Ошибки хоста гасятся и логируются здесь.
pub struct GroupPlacement {
    host: Arc<dyn TabHost>,
    config: Arc<ConfigStore>,
}

impl GroupPlacement {
    pub fn new(host: Arc<dyn TabHost>, config: Arc<ConfigStore>) -> Self {
        Self { host, config }
    }

    /// Добавить new_tab в группу вкладки-источника и разместить по политике
    pub async fn join_group(&self, new_tab: &Tab, source: &Tab) {
        if let Err(e) = self.try_join_group(new_tab, source).await {
            warn!("Не удалось сгруппировать {}: {}", new_tab.id, e);
        }
    }

    /// Создать новую группу из new_tab; spec задаёт оформление и позицию
    pub async fn create_group(&self, new_tab: &Tab, spec: Option<&GroupSpec>) {
        if let Err(e) = self.try_create_group(new_tab, spec).await {
            warn!("Не удалось создать группу для {}: {}", new_tab.id, e);
        }
    }

    async fn try_join_group(&self, new_tab: &Tab, source: &Tab) -> crate::error::Result<()> {
        let placement_mode = self.config.snapshot().placement_mode;

        // Предусловия-пропуски: это не ошибки, просто нечего делать
        if new_tab.window_id.is_none() || source.window_id.is_none() {
            trace_if_enabled!("Пропуск: у вкладки нет окна");
            return Ok(());
        }
        if source.group_id.is_ungrouped() {
            trace_if_enabled!("Пропуск: источник {} вне группы", source.id);
            return Ok(());
        }
        if new_tab.window_id != source.window_id {
            trace_if_enabled!("Пропуск: {} и {} в разных окнах", new_tab.id, source.id);
            return Ok(());
        }
        if new_tab.id.is_none() {
            return Ok(());
        }

        trace_if_enabled!(
            "{} вступает в группу {} источника {}, режим {:?}",
            new_tab.id,
            source.group_id,
            source.id,
            placement_mode
        );
        self.host
            .group_tabs(Some(source.group_id), &[new_tab.id])
            .await?;

        self.apply_placement(new_tab, source, placement_mode).await
    }

    async fn apply_placement(
        &self,
        new_tab: &Tab,
        source: &Tab,
        placement_mode: PlacementMode,
    ) -> crate::error::Result<()> {
        match placement_mode {
            PlacementMode::First => {
                let group_tabs = self
                    .host
                    .query_tabs(TabQuery {
                        group_id: Some(source.group_id),
                        window_id: Some(source.window_id),
                        ..Default::default()
                    })
                    .await?;
                let target = group_tabs
                    .iter()
                    .filter(|t| t.id != new_tab.id)
                    .map(|t| t.index)
                    .min()
                    .unwrap_or(0);
                self.move_clamped(new_tab, target).await
            }
            PlacementMode::After => self.move_clamped(new_tab, source.index + 1).await,
            // Хост сам добавляет в конец группы
            PlacementMode::Last => Ok(()),
        }
    }

    /// Перенос с зажимом индекса в границы окна
    async fn move_clamped(&self, new_tab: &Tab, index: usize) -> crate::error::Result<()> {
        let window_tabs = self
            .host
            .query_tabs(TabQuery {
                window_id: Some(new_tab.window_id),
                ..Default::default()
            })
            .await?;
        let target = index.min(window_tabs.len());
        self.host.move_tab(new_tab.id, target).await
    }

    async fn try_create_group(
        &self,
        new_tab: &Tab,
        spec: Option<&GroupSpec>,
    ) -> crate::error::Result<()> {
        if new_tab.id.is_none() {
            return Ok(());
        }
        let group_id = self.host.group_tabs(None, &[new_tab.id]).await?;

        let Some(spec) = spec else {
            // Без спецификации группа остаётся на месте с оформлением по умолчанию
            return Ok(());
        };

        self.host
            .update_group(
                group_id,
                GroupUpdate {
                    title: Some(spec.title.clone()),
                    color: Some(spec.color),
                    collapsed: None,
                },
            )
            .await?;

        match spec.position {
            RelativePosition::Top => {}
            RelativePosition::After => {
                let members = self.relative_group_tabs(spec).await?;
                if let Some(max_index) = members.iter().map(|t| t.index).max() {
                    self.host.move_group(group_id, max_index + 1).await?;
                }
            }
            RelativePosition::Before => {
                let members = self.relative_group_tabs(spec).await?;
                if let Some(min_index) = members.iter().map(|t| t.index).min() {
                    self.host.move_group(group_id, min_index).await?;
                }
            }
        }
        Ok(())
    }

    async fn relative_group_tabs(&self, spec: &GroupSpec) -> crate::error::Result<Vec<Tab>> {
        self.host
            .query_tabs(TabQuery {
                group_id: Some(spec.relative_group_id),
                ..Default::default()
            })
            .await
    }
}
