// src/core/mod.rs
//! Configuration, persistence and the error taxonomy shared by every layer

pub mod config_manager;
pub mod database;
pub mod errors;

pub use config_manager::ConfigManager;
pub use database::Database;
pub use errors::AgentError;
