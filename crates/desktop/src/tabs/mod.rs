pub mod preview_tab;
pub mod settings_tab;
