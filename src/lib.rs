pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::simulator::SimulatedSession;
pub use adapters::storage::LocalStorage;
pub use config::toml_config::ProtocolConfig;
pub use core::engine::{ProtocolEngine, RunSummary};
pub use utils::error::{ProtocolError, Result};
