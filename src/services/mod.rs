pub mod background;
pub mod config_store;
pub mod group_placement;
pub mod shortcut_binder;
pub mod tab_tracker;
pub mod task_scheduler;

pub use background::Background;
pub use config_store::ConfigStore;
pub use group_placement::GroupPlacement;
pub use shortcut_binder::ShortcutBinder;
pub use tab_tracker::TabTracker;
pub use task_scheduler::TaskScheduler;
