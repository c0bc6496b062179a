use serde::{Deserialize, Serialize};

use crate::core::errors::AgentError;
use crate::types::profile::{MAX_ALIGNMENT_SCORE, MIN_ALIGNMENT_SCORE};
use crate::types::{Analysis, Recommendation};

// Request format for OpenAI-compatible chat completions
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub temperature: f32,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatMessage,
}

/// Analysis as the model returns it, before validation.
/// The score stays loose because models emit `8`, `8.0` or `"8"`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnalysisPayload {
    pub summary: String,
    pub alignment_score: serde_json::Value,
    pub justification: String,
    pub recommendation: Recommendation,
}

impl TryFrom<AnalysisPayload> for Analysis {
    type Error = AgentError;

    fn try_from(payload: AnalysisPayload) -> Result<Self, Self::Error> {
        let score = match &payload.alignment_score {
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            AgentError::Analysis(format!(
                "alignment_score is not an integer: {}",
                payload.alignment_score
            ))
        })?;

        if score < MIN_ALIGNMENT_SCORE as i64 || score > MAX_ALIGNMENT_SCORE as i64 {
            return Err(AgentError::Analysis(format!(
                "alignment_score {} outside {}..={}",
                score, MIN_ALIGNMENT_SCORE, MAX_ALIGNMENT_SCORE
            )));
        }

        if payload.summary.trim().is_empty() {
            return Err(AgentError::Analysis("summary is empty".to_string()));
        }

        Ok(Analysis {
            summary: payload.summary.trim().to_string(),
            alignment_score: score as u8,
            justification: payload.justification.trim().to_string(),
            recommendation: payload.recommendation,
        })
    }
}
