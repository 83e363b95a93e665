//! gatepath-store: persistence and configuration.
//!
//! Provides `MemoryStore`, a single backend implementing every store trait
//! from `gatepath-core` with optional JSON file persistence, plus question
//! bank loading and the layered TOML configuration.

pub mod bank;
pub mod config;
pub mod memory;

pub use bank::{load_bank, parse_bank_str, validate_bank, QuestionBank};
pub use config::{load_config, load_config_from, GatepathConfig};
pub use memory::{MemoryStore, StoreData};
