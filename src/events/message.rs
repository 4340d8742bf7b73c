use super::tab::{GroupColor, GroupId};
use serde::{Deserialize, Serialize};

/// Позиция новой группы относительно уже существующей
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativePosition {
    Top,
    Before,
    After,
}

/// Спецификация создаваемой группы (приходит из боковой панели)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub title: String,
    pub color: GroupColor,
    pub position: RelativePosition,
    pub relative_group_id: GroupId,
}

/// Сообщение межкомпонентного протокола: на проводе это {header, payload}
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "header", content = "payload", rename_all = "kebab-case")]
pub enum Message {
    BuildGroup(GroupSpec),
    SidebarOpen,
    SidebarOpenAck {
        #[serde(rename = "groupId")]
        group_id: GroupId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_format() {
        let msg = Message::SidebarOpen;
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["header"], "sidebar-open");

        let msg = Message::BuildGroup(GroupSpec {
            title: "work".to_string(),
            color: GroupColor::Blue,
            position: RelativePosition::After,
            relative_group_id: GroupId(4),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["header"], "build-group");
        assert_eq!(json["payload"]["position"], "after");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }
}
