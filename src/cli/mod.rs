pub mod commands;
pub mod ui;

pub use commands::load_settings;
pub use ui::Output;
