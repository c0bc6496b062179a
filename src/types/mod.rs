// src/types/mod.rs
pub mod job;
pub mod profile;

pub use job::{JobSchedule, MissionParameters, RunStatus};
pub use profile::{
    Analysis, FewShotExample, PersistedRecord, Recommendation, ScrapedProfile,
};
