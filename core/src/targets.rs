//! Log targets shared by every crate in the workspace.

pub const CATALOG: &str = "catalog";
pub const PRICING: &str = "pricing";
pub const API: &str = "api";
pub const SESSION: &str = "session";
pub const UI: &str = "ui";
pub const STORAGE: &str = "storage";

pub const ALL: [&str; 6] = [CATALOG, PRICING, API, SESSION, UI, STORAGE];
