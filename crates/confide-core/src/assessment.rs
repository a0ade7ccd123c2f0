use crate::error::{ConfideError, ConfideResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The agent's current structured evaluation of a conversation.
///
/// Every field is an opaque payload produced by the agent. The store never
/// interprets them beyond [`AssessmentRecord::validate`] and the numeric
/// reading used for statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRecord {
    /// Score as emitted by the agent, e.g. `"7"` or `"7/10"`.
    pub score: String,
    /// Reasoning behind the score.
    pub rationale: String,
    /// Overall summary of the participant's situation.
    pub summary: String,
    /// When the agent produced this assessment.
    pub recorded_at: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Creates an assessment stamped with the current time.
    pub fn new(
        score: impl Into<String>,
        rationale: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self::recorded_at(score, rationale, summary, Utc::now())
    }

    /// Creates an assessment with an explicit timestamp.
    pub fn recorded_at(
        score: impl Into<String>,
        rationale: impl Into<String>,
        summary: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            score: score.into(),
            rationale: rationale.into(),
            summary: summary.into(),
            recorded_at,
        }
    }

    /// Structural check applied before an assessment may replace another.
    pub fn validate(&self) -> ConfideResult<()> {
        if self.score.trim().is_empty() {
            return Err(ConfideError::InvalidAssessment(
                "score must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Numeric reading of the score, if it has one.
    ///
    /// Accepts a plain number (`"6.5"`) or a fraction, in which case the
    /// numerator is used (`"7/10"` reads as `7`).
    pub fn numeric_score(&self) -> Option<f64> {
        parse_score(&self.score)
    }

    /// Builds an assessment from the JSON arguments of an agent tool call.
    ///
    /// Field names follow the assessment tool: `score`, `rationale` (or
    /// `content`) and `summary` (or `total_guess`). The score may be a string
    /// or a number; the narrative fields default to empty.
    pub fn from_tool_arguments(
        arguments: &serde_json::Value,
        recorded_at: DateTime<Utc>,
    ) -> ConfideResult<Self> {
        let obj = arguments.as_object().ok_or_else(|| {
            ConfideError::InvalidAssessment("tool arguments must be a JSON object".to_string())
        })?;

        let score = match obj.get("score") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(ConfideError::InvalidAssessment(format!(
                    "score must be a string or number, got {other}"
                )))
            }
            None => {
                return Err(ConfideError::InvalidAssessment(
                    "missing field `score`".to_string(),
                ))
            }
        };
        let rationale = text_field(obj, &["rationale", "content"])?;
        let summary = text_field(obj, &["summary", "total_guess"])?;

        let assessment = Self::recorded_at(score, rationale, summary, recorded_at);
        assessment.validate()?;
        Ok(assessment)
    }
}

fn text_field(
    obj: &serde_json::Map<String, serde_json::Value>,
    names: &[&str],
) -> ConfideResult<String> {
    for name in names {
        match obj.get(*name) {
            Some(serde_json::Value::String(s)) => return Ok(s.clone()),
            Some(serde_json::Value::Null) | None => continue,
            Some(other) => {
                return Err(ConfideError::InvalidAssessment(format!(
                    "field `{name}` must be a string, got {other}"
                )))
            }
        }
    }
    Ok(String::new())
}

fn parse_score(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let value = match raw.split_once('/') {
        Some((num, den)) => {
            den.trim().parse::<f64>().ok().filter(|d| d.is_finite())?;
            num.trim().parse::<f64>().ok()?
        }
        None => raw.parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}
