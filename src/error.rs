use crate::events::{GroupId, TabId, WindowId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GroupTabError {
    #[error("Ошибка конфигурации: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Ошибка ввода-вывода: {0}")]
    Io(#[from] std::io::Error),

    #[error("Вкладка не найдена: {0}")]
    TabNotFound(TabId),

    #[error("Окно не найдено: {0}")]
    WindowNotFound(WindowId),

    #[error("Группа не найдена: {0}")]
    GroupNotFound(GroupId),

    #[error("Команда не найдена: {0}")]
    CommandNotFound(String),

    #[error("Внутренняя ошибка: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GroupTabError>;
