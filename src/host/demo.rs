use crate::events::TabId;
use crate::host::{MemoryHost, TabHost};
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

/// Режим эмуляции: MemoryHost изображает браузер, а этот цикл — пользователя.
/// Стартовая сцена — окно с группой из двух вкладок; дальше по таймеру
/// активируем вкладку из группы и открываем новую, чтобы конвейер
/// группировки прогонялся целиком и был виден в логах.
pub async fn run(host: Arc<MemoryHost>, tab_interval: Duration) {
    info!("Режим эмуляции - события браузера генерируются синтетически");

    let window = host.create_window();
    host.focus_window(window);

    let first = match host.create_tab(window).await {
        Ok(tab) => tab,
        Err(e) => {
            warn!("Эмуляция не смогла создать стартовую вкладку: {}", e);
            return;
        }
    };
    let mut anchors: Vec<TabId> = vec![first.id];
    if let Ok(second) = host.create_tab(window).await {
        anchors.push(second.id);
    }
    match host.group_tabs(None, &[first.id]).await {
        Ok(group) => {
            for anchor in anchors.iter().skip(1) {
                if let Err(e) = host.group_tabs(Some(group), &[*anchor]).await {
                    warn!("Эмуляция: не удалось добавить вкладку в группу: {}", e);
                }
            }
            info!("Стартовая сцена готова: {}", host.layout(window));
        }
        Err(e) => warn!("Эмуляция: не удалось создать стартовую группу: {}", e),
    }

    let mut anchor_index = 0;
    let mut ticker = interval(tab_interval);
    ticker.tick().await; // первый тик мгновенный

    loop {
        ticker.tick().await;

        // Пользователь смотрит на одну из вкладок группы...
        let anchor = anchors[anchor_index % anchors.len()];
        anchor_index += 1;
        if let Err(e) = host.activate_tab(anchor) {
            warn!("Эмуляция: не удалось активировать {}: {}", anchor, e);
            continue;
        }

        // ...и открывает новую: ядро должно подтянуть её в группу
        match host.create_tab(window).await {
            Ok(tab) => info!("Эмуляция: открыта {}", tab),
            Err(e) => warn!("Эмуляция: не удалось создать вкладку: {}", e),
        }

        info!("Раскладка окна: {}", host.layout(window));
    }
}
