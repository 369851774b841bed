// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod activity;
pub mod app;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod ui;

pub use activity::{ActivityFeed, ActivityKind};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::IdleSettings;
pub use error::MonitorError;
pub use monitor::{IdleSessionMonitor, MonitorEvent, MonitorState, Phase, SessionMonitorConfig};
