// src/lib.rs
pub mod agent;
pub mod browser;
pub mod cli;
pub mod core;
pub mod linkedin_analysis;
pub mod types;
pub mod utils;
