//! Process exit codes reported to the supervising parent.

pub const SUCCESS: i32 = 0;
/// Configuration line missing, unreadable or malformed.
pub const CONFIG_ERROR: i32 = 2;
/// Session backend or outlet backend cannot be loaded.
pub const BACKEND_UNAVAILABLE: i32 = 3;
/// Session could not be created or started.
pub const SESSION_ERROR: i32 = 4;
pub const OUTLET_ERROR: i32 = 5;
