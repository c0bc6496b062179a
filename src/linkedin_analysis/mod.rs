// src/linkedin_analysis/mod.rs
pub mod llm_client;
pub mod profile_analyzer;
pub(crate) mod types;

pub use llm_client::LlmClient;
pub use profile_analyzer::{build_prompt, parse_analysis, LlmProfileAnalyzer};
