pub mod config;
pub mod control;
pub mod host;
pub mod lifecycle;
pub mod stats;
pub mod table;

pub use config::{load_conf, LogLevel, MissPolicy, PdrRule, UpfConf};
pub use control::UpfXdp;
pub use host::AyaHost;
pub use lifecycle::{AttachState, AttachmentManager, LifecycleError, PortRole, XdpHost};
pub use stats::{Counters, StatsLogger};
pub use table::{BpfPdrTable, MemoryPdrTable, PdrTable, TableError};
