//! Durable representation of a [`ConversationRecord`].
//!
//! The on-disk schema lives in private DTOs so the domain types can change
//! without touching stored files. Files written by the earlier chat-history
//! writer (`user_id`/`thread_id`/`messages`/`diagnosis`, naive timestamps)
//! are still readable.

use crate::record::ConversationRecord;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use confide_core::{AssessmentRecord, ConfideResult, DecodeError, Role, SessionKey, Turn};
use serde::{Deserialize, Serialize};

/// Schema version written by [`RecordCodec::encode`].
pub const SCHEMA_VERSION: u32 = 1;

/// Encodes and decodes conversation records.
pub struct RecordCodec;

impl RecordCodec {
    /// Serializes a record as pretty-printed UTF-8 JSON.
    pub fn encode(record: &ConversationRecord) -> ConfideResult<Vec<u8>> {
        let stored = StoredRecord::from(record);
        let mut bytes = serde_json::to_vec_pretty(&stored)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parses bytes produced by [`RecordCodec::encode`] (or a legacy writer).
    ///
    /// Never panics on arbitrary input.
    pub fn decode(bytes: &[u8]) -> Result<ConversationRecord, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        if let Some(version) = value.get("version") {
            let version = version
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(u32::MAX);
            if version != SCHEMA_VERSION {
                return Err(DecodeError::UnsupportedVersion(version));
            }
        }
        let stored: StoredRecord = serde_json::from_value(value)?;
        stored.into_record()
    }
}

#[derive(Serialize, Deserialize)]
struct StoredRecord {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(alias = "user_id")]
    participant_id: String,
    #[serde(alias = "thread_id")]
    conversation_id: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(alias = "timestamp")]
    updated_at: String,
    #[serde(default, alias = "messages")]
    turns: Vec<StoredTurn>,
    #[serde(default, alias = "diagnosis")]
    assessment: Option<StoredAssessment>,
}

#[derive(Serialize, Deserialize)]
struct StoredTurn {
    role: Role,
    #[serde(alias = "content")]
    text: String,
}

#[derive(Serialize, Deserialize)]
struct StoredAssessment {
    #[serde(default)]
    score: String,
    #[serde(default, alias = "content")]
    rationale: String,
    #[serde(default, alias = "total_guess")]
    summary: String,
    #[serde(default, alias = "timestamp")]
    recorded_at: Option<String>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

impl From<&ConversationRecord> for StoredRecord {
    fn from(record: &ConversationRecord) -> Self {
        Self {
            version: SCHEMA_VERSION,
            participant_id: record.key.participant_id().to_string(),
            conversation_id: record.key.conversation_id().to_string(),
            created_at: Some(format_timestamp(record.created_at)),
            updated_at: format_timestamp(record.updated_at),
            turns: record
                .transcript
                .iter()
                .map(|t| StoredTurn {
                    role: t.role,
                    text: t.text.clone(),
                })
                .collect(),
            assessment: record.assessment.as_ref().map(|a| StoredAssessment {
                score: a.score.clone(),
                rationale: a.rationale.clone(),
                summary: a.summary.clone(),
                recorded_at: Some(format_timestamp(a.recorded_at)),
            }),
        }
    }
}

impl StoredRecord {
    fn into_record(self) -> Result<ConversationRecord, DecodeError> {
        let key = SessionKey::new(self.participant_id, self.conversation_id)
            .map_err(|e| DecodeError::InvalidKey(e.to_string()))?;
        let updated_at = parse_timestamp("updated_at", &self.updated_at)?;
        let created_at = match self.created_at {
            Some(raw) => parse_timestamp("created_at", &raw)?,
            None => updated_at,
        };

        let assessment = match self.assessment {
            Some(a) if !a.is_blank() => {
                let recorded_at = match a.recorded_at {
                    Some(raw) => parse_timestamp("assessment.recorded_at", &raw)?,
                    None => updated_at,
                };
                Some(AssessmentRecord::recorded_at(
                    a.score,
                    a.rationale,
                    a.summary,
                    recorded_at,
                ))
            }
            _ => None,
        };

        Ok(ConversationRecord {
            key,
            created_at,
            updated_at,
            transcript: self
                .turns
                .into_iter()
                .map(|t| Turn::new(t.role, t.text))
                .collect(),
            assessment,
        })
    }
}

impl StoredAssessment {
    // Legacy files store a missing assessment as `{}`.
    fn is_blank(&self) -> bool {
        self.score.is_empty()
            && self.rationale.is_empty()
            && self.summary.is_empty()
            && self.recorded_at.is_none()
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Naive local timestamps from the legacy writer are taken as UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| DecodeError::InvalidTimestamp {
            field,
            value: raw.to_string(),
        })
}
