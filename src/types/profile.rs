// src/types/profile.rs
//! Scraped profiles, LLM analyses and stored results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::types::Json;

use super::job::MissionParameters;

pub const MIN_ALIGNMENT_SCORE: u8 = 1;
pub const MAX_ALIGNMENT_SCORE: u8 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedProfile {
    pub url: String,
    pub raw_text: String,
}

/// Binary hiring decision returned by the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Recommend,
    DoNotRecommend,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Recommend => "Recommend",
            Recommendation::DoNotRecommend => "Do Not Recommend",
        }
    }

    /// Accepts the phrasings models actually return
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "recommend" | "recommended" | "yes" | "true" => Some(Recommendation::Recommend),
            "do not recommend" | "dont recommend" | "don't recommend" | "not recommended"
            | "no" | "false" => Some(Recommendation::DoNotRecommend),
            _ => None,
        }
    }
}

impl Serialize for Recommendation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Bool(true) => Ok(Recommendation::Recommend),
            serde_json::Value::Bool(false) => Ok(Recommendation::DoNotRecommend),
            serde_json::Value::String(s) => Recommendation::parse(s).ok_or_else(|| {
                serde::de::Error::custom(format!("unrecognized recommendation: {}", s))
            }),
            other => Err(serde::de::Error::custom(format!(
                "unrecognized recommendation: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    pub alignment_score: u8,
    pub justification: String,
    pub recommendation: Recommendation,
}

impl Analysis {
    pub fn is_recommended(&self) -> bool {
        self.recommendation == Recommendation::Recommend
    }
}

/// Previously scored record used to steer new scoring
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FewShotExample {
    pub profile_text: String,
    #[sqlx(rename = "analysis_data")]
    pub analysis: Json<Analysis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersistedRecord {
    pub profile_url: String,
    pub profile_text: String,
    #[sqlx(rename = "mission_data")]
    pub mission_parameters: Json<MissionParameters>,
    #[sqlx(rename = "analysis_data")]
    pub analysis: Json<Analysis>,
    pub alignment_score: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_phrasings() {
        assert_eq!(
            Recommendation::parse("Recommend"),
            Some(Recommendation::Recommend)
        );
        assert_eq!(
            Recommendation::parse("Do Not Recommend"),
            Some(Recommendation::DoNotRecommend)
        );
        assert_eq!(
            Recommendation::parse("do_not_recommend"),
            Some(Recommendation::DoNotRecommend)
        );
        assert_eq!(Recommendation::parse("maybe"), None);
    }

    #[test]
    fn test_recommendation_wire_format() {
        let analysis: Analysis = serde_json::from_str(
            r#"{"summary":"s","alignment_score":7,"justification":"j","recommendation":true}"#,
        )
        .unwrap();
        assert!(analysis.is_recommended());

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["recommendation"], "Recommend");
    }

    #[test]
    fn test_recommendation_rejects_numbers() {
        let parsed = serde_json::from_str::<Recommendation>("3");
        assert!(parsed.is_err());
    }
}
