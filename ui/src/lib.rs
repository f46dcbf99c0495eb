pub mod app;
mod executor;
pub mod logging;

use iced::Application;

pub use app::{FarmPlotApp, Flags};
pub use logging::{
    LogEntry, LogField, LogLevel, LogStore, ReloadHandle, apply_log_level, init_logging,
};

pub type UiResult = iced::Result;

pub fn run(flags: Flags) -> UiResult {
    FarmPlotApp::run(iced::Settings::with_flags(flags))
}
