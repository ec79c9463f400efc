pub mod config;
pub mod config_loader;
pub mod error;
pub mod fs;
pub mod state_machine;
pub mod traits;

pub use config::{AuditLevel, Config, ConfigWarning, DEFAULT_REGISTRY};
pub use config_loader::{ConfigFlags, ConfigLoader, LogSettings};
pub use error::*;
pub use fs::{MemoryFileSystem, OsEnvironment, OsFileSystem, StaticEnvironment};
pub use state_machine::{PhaseTransition, RunPhase, RunStateMachine};
pub use traits::*;
