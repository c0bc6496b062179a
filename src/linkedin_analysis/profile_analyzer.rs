// src/linkedin_analysis/profile_analyzer.rs
use super::llm_client::LlmClient;
use super::types::AnalysisPayload;
use crate::agent::ProfileAnalyzer;
use crate::core::errors::AgentError;
use crate::types::{Analysis, FewShotExample, MissionParameters};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use tracing::{info, warn};

const SYSTEM_PROMPT: &str = "You are an expert technical recruiter. You analyze LinkedIn profile text \
and decide whether the candidate fits a specific role. Reply with a single JSON object and nothing else.";

const FORMAT_INSTRUCTIONS: &str = r#"Return a JSON object with exactly these fields:
{
  "summary": "<one-paragraph summary of the candidate's professional background>",
  "alignment_score": <integer from 1 (poor fit) to 10 (perfect fit)>,
  "justification": "<brief explanation of the score, referencing the criteria>",
  "recommendation": "<either 'Recommend' or 'Do Not Recommend'>"
}"#;

/// Scores scraped profiles against the mission criteria with an LLM
pub struct LlmProfileAnalyzer {
    client: LlmClient,
    max_profile_chars: usize,
}

impl LlmProfileAnalyzer {
    pub fn new(client: LlmClient, max_profile_chars: usize) -> Self {
        Self {
            client,
            max_profile_chars,
        }
    }

    async fn perform_analysis(
        &self,
        profile_text: &str,
        mission: &MissionParameters,
        examples: &[FewShotExample],
    ) -> anyhow::Result<Analysis> {
        let prompt = build_prompt(profile_text, mission, examples, self.max_profile_chars);
        let reply = self.client.complete_json(SYSTEM_PROMPT, &prompt).await?;
        Ok(parse_analysis(&reply)?)
    }
}

#[async_trait]
impl ProfileAnalyzer for LlmProfileAnalyzer {
    async fn analyze(
        &self,
        profile_text: &str,
        mission: &MissionParameters,
        examples: &[FewShotExample],
    ) -> Option<Analysis> {
        info!("Analyzing profile ({} chars)", profile_text.len());
        match self.perform_analysis(profile_text, mission, examples).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("Profile analysis failed: {:#}", e);
                None
            }
        }
    }
}

fn render_examples(examples: &[FewShotExample]) -> String {
    if examples.is_empty() {
        return String::new();
    }

    let mut section = String::from("**Here are some examples of high-quality analyses:**\n");
    for (i, example) in examples.iter().enumerate() {
        let analysis = &example.analysis.0;
        let analysis_json = serde_json::to_string_pretty(analysis)
            .unwrap_or_else(|_| "{}".to_string());
        section.push_str(&format!(
            "\n--- Example {} (Score: {}) ---\n**Profile Text:**\n{}\n**Expected Analysis:**\n{}\n",
            i + 1,
            analysis.alignment_score,
            example.profile_text.trim(),
            analysis_json
        ));
    }
    section.push_str("\n--- End of Examples ---\n");
    section
}

fn render_extra_criteria(mission: &MissionParameters) -> String {
    mission
        .extra
        .iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("- {}: {}\n", key, value)
        })
        .collect()
}

/// Deterministic prompt: same inputs always produce the same text
pub fn build_prompt(
    profile_text: &str,
    mission: &MissionParameters,
    examples: &[FewShotExample],
    max_profile_chars: usize,
) -> String {
    format!(
        r#"Analyze the provided LinkedIn profile text and determine if the candidate is a good fit for a specific role.

**Evaluation Criteria:**
- Search Query: {query}
- Location: {location}
{extra}
{examples}
**Now, analyze the following new candidate based on the same criteria.**

**Candidate's Profile Text:**
{profile}

**Your Task:**
1. Carefully read the new profile text.
2. Compare the candidate's experience against the evaluation criteria, using the examples for guidance on quality and format.
3. Provide a concise summary of the candidate's background.
4. Give an alignment score from 1 (poor fit) to 10 (perfect fit).
5. Justify the score with a brief explanation.
6. Make a clear 'Recommend' or 'Do Not Recommend' decision.

**Output Format:**
{format}
"#,
        query = mission.search_query,
        location = mission.location,
        extra = render_extra_criteria(mission),
        examples = render_examples(examples),
        profile = truncate_chars(profile_text.trim(), max_profile_chars),
        format = FORMAT_INSTRUCTIONS,
    )
}

/// Validate the model reply, tolerating a Markdown code fence around the JSON
pub fn parse_analysis(reply: &str) -> Result<Analysis, AgentError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => {
            return Err(AgentError::Analysis(
                "reply does not contain a JSON object".to_string(),
            ))
        }
    };

    let payload: AnalysisPayload = serde_json::from_str(json)
        .map_err(|e| AgentError::Analysis(format!("malformed analysis JSON: {}", e)))?;

    Analysis::try_from(payload)
}
