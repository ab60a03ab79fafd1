//! Review result contract and decoding of the model's reply.
//!
//! The JSON field names (`apto`, `puntuacion`, ...) are a fixed external
//! contract shared with existing clients and with the prompt.

use serde::{Deserialize, Serialize};

/// Appended to the summary of a decoded result when input was shortened.
pub const TRUNCATION_NOTE: &str =
    " (Note: The CV or job description has been truncated due to character limits.)";

const UNPARSEABLE_SUMMARY: &str = "The response from the model could not be parsed.";
const MISSING_SUMMARY: &str = "The model did not provide a summary.";
const UNREADABLE_DOCUMENT_SUMMARY: &str = "Text cannot be extracted from the selected file.";

pub const MAX_SCORE: u8 = 100;

/// Verdict token the model is asked to emit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eligibility {
    Yes,
    #[default]
    No,
}

/// Structured verdict returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewResult {
    #[serde(rename = "apto")]
    pub eligible: Eligibility,
    #[serde(rename = "puntuacion")]
    pub score: u8,
    #[serde(rename = "competenciasFaltantes")]
    pub missing_skills: Vec<String>,
    #[serde(rename = "cursosRecomendados")]
    pub recommended_courses: Vec<String>,
    #[serde(rename = "resumen")]
    pub summary: String,
    /// Exact text received from the LLM backend, kept for audit.
    #[serde(rename = "rawOpenAiResponse")]
    pub raw_model_response: String,
}

impl ReviewResult {
    /// Result used when the model's reply could not be decoded.
    /// `truncated_to` carries the character limit when input was shortened.
    pub fn fallback(raw_model_response: String, truncated_to: Option<usize>) -> Self {
        let mut summary = UNPARSEABLE_SUMMARY.to_string();
        if let Some(limit) = truncated_to {
            summary.push_str(&format!(
                " In addition, the text was truncated to {limit} characters."
            ));
        }
        Self::rejected(summary, raw_model_response)
    }

    /// Result returned when no text could be read from the uploaded document.
    pub fn unreadable_document() -> Self {
        Self::rejected(UNREADABLE_DOCUMENT_SUMMARY.to_string(), String::new())
    }

    fn rejected(summary: String, raw_model_response: String) -> Self {
        Self {
            eligible: Eligibility::No,
            score: 0,
            missing_skills: Vec::new(),
            recommended_courses: Vec::new(),
            summary,
            raw_model_response,
        }
    }
}

/// What the model is asked to produce. Every field may be missing or null;
/// extra fields the model adds are ignored.
#[derive(Debug, Deserialize)]
struct ModelVerdict {
    #[serde(rename = "apto", default)]
    eligible: Option<Eligibility>,
    #[serde(rename = "puntuacion", default)]
    score: Option<u8>,
    #[serde(rename = "competenciasFaltantes", default)]
    missing_skills: Option<Vec<String>>,
    #[serde(rename = "cursosRecomendados", default)]
    recommended_courses: Option<Vec<String>>,
    #[serde(rename = "resumen", default)]
    summary: Option<String>,
}

/// Outcome of decoding one model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Decoded(ReviewResult),
    RawFallback(String),
}

impl ReplyOutcome {
    /// Decodes `raw` into a result. Any mismatch yields `RawFallback`;
    /// partially valid replies are not salvaged.
    pub fn from_reply(raw: &str) -> Self {
        let body = strip_json_fences(raw);

        let verdict = match serde_json::from_str::<ModelVerdict>(body) {
            Ok(verdict) => verdict,
            Err(_) => return ReplyOutcome::RawFallback(raw.to_string()),
        };

        let score = verdict.score.unwrap_or(0);
        if score > MAX_SCORE {
            return ReplyOutcome::RawFallback(raw.to_string());
        }

        ReplyOutcome::Decoded(ReviewResult {
            eligible: verdict.eligible.unwrap_or_default(),
            score,
            missing_skills: verdict.missing_skills.unwrap_or_default(),
            recommended_courses: verdict.recommended_courses.unwrap_or_default(),
            summary: verdict
                .summary
                .unwrap_or_else(|| MISSING_SUMMARY.to_string()),
            raw_model_response: raw.to_string(),
        })
    }

    pub fn is_decoded(&self) -> bool {
        matches!(self, ReplyOutcome::Decoded(_))
    }

    /// Collapses the outcome into the final result. `truncated_to` is the
    /// character limit, present only when some input was shortened.
    pub fn into_result(self, truncated_to: Option<usize>) -> ReviewResult {
        match self {
            ReplyOutcome::Decoded(mut result) => {
                if truncated_to.is_some() {
                    result.summary.push_str(TRUNCATION_NOTE);
                }
                result
            }
            ReplyOutcome::RawFallback(raw) => ReviewResult::fallback(raw, truncated_to),
        }
    }
}

/// Removes a Markdown code fence (optionally tagged `json`) around a reply.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
