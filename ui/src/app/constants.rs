pub(crate) const LOG_TICK_MS: u64 = 250;
pub(crate) const SESSION_CHECK_SECS: u64 = 30;
pub(crate) const SESSION_REFRESH_SKEW_SECS: u64 = 300;
pub(crate) const MAX_LOG_LINES_SHOWN: usize = 400;
pub(crate) const DIAGNOSTIC_LOG_LINES: usize = 50;
pub(crate) const WINDOW_TITLE: &str = "Farm Plot Pricing";
