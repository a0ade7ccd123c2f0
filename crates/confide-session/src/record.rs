use chrono::{DateTime, Utc};
use confide_core::{AssessmentRecord, ConfideError, ConfideResult, SessionKey, Turn};

/// The persisted state of one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRecord {
    /// Which conversation this is.
    pub key: SessionKey,
    /// When the conversation was first created.
    pub created_at: DateTime<Utc>,
    /// Never moves backwards across saves of the same key.
    pub updated_at: DateTime<Utc>,
    /// Append-only.
    pub transcript: Vec<Turn>,
    /// Single slot, latest wins. See [`crate::AssessmentMerger`].
    pub assessment: Option<AssessmentRecord>,
}

impl ConversationRecord {
    /// A fresh, empty record. Nothing is persisted until it is saved.
    pub fn new(key: SessionKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            created_at: now,
            updated_at: now,
            transcript: Vec::new(),
            assessment: None,
        }
    }

    /// Appends a turn and advances `updated_at`.
    pub fn push_turn(&mut self, turn: Turn) {
        self.touch(Utc::now());
        self.transcript.push(turn);
    }

    /// Appends a participant turn.
    pub fn push_participant(&mut self, text: impl Into<String>) {
        self.push_turn(Turn::participant(text));
    }

    /// Appends an agent turn.
    pub fn push_agent(&mut self, text: impl Into<String>) {
        self.push_turn(Turn::agent(text));
    }

    /// Replaces the transcript with `turns`, which must begin with every turn
    /// already recorded. Returns the number of turns appended.
    pub fn extend_transcript(&mut self, turns: &[Turn]) -> ConfideResult<usize> {
        if !turns.starts_with(&self.transcript) {
            return Err(ConfideError::TranscriptRewrite {
                existing: self.transcript.len(),
                incoming: turns.len(),
            });
        }
        let appended = turns.len() - self.transcript.len();
        if appended > 0 {
            self.touch(Utc::now());
            self.transcript
                .extend_from_slice(&turns[self.transcript.len()..]);
        }
        Ok(appended)
    }

    /// Number of recorded turns.
    pub fn turn_count(&self) -> usize {
        self.transcript.len()
    }

    /// Whether an assessment has been recorded.
    pub fn has_assessment(&self) -> bool {
        self.assessment.is_some()
    }

    /// Advances `updated_at` to `at` unless it is already later.
    pub(crate) fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key() -> SessionKey {
        SessionKey::new("p1", "c1").unwrap()
    }

    #[test]
    fn test_new_record_is_empty() {
        let record = ConversationRecord::new(key());
        assert_eq!(record.turn_count(), 0);
        assert!(!record.has_assessment());
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_push_turn_advances_updated_at() {
        let mut record = ConversationRecord::new(key());
        let before = record.updated_at;
        record.push_participant("hello");
        record.push_agent("hi, how are you feeling today?");
        assert_eq!(record.turn_count(), 2);
        assert!(record.updated_at >= before);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut record = ConversationRecord::new(key());
        let now = record.updated_at;
        record.touch(now - Duration::hours(1));
        assert_eq!(record.updated_at, now);
        record.touch(now + Duration::hours(1));
        assert_eq!(record.updated_at, now + Duration::hours(1));
    }

    #[test]
    fn test_extend_transcript_appends_suffix() {
        let mut record = ConversationRecord::new(key());
        record.push_participant("q1");

        let incoming = vec![Turn::participant("q1"), Turn::agent("a1"), Turn::participant("q2")];
        assert_eq!(record.extend_transcript(&incoming).unwrap(), 2);
        assert_eq!(record.transcript, incoming);

        // Same transcript again is a no-op.
        assert_eq!(record.extend_transcript(&incoming).unwrap(), 0);
    }

    #[test]
    fn test_extend_transcript_rejects_rewrite() {
        let mut record = ConversationRecord::new(key());
        record.push_participant("q1");
        record.push_agent("a1");
        let snapshot = record.clone();

        let edited = vec![Turn::participant("q1"), Turn::agent("something else")];
        let err = record.extend_transcript(&edited).unwrap_err();
        assert!(matches!(
            err,
            ConfideError::TranscriptRewrite {
                existing: 2,
                incoming: 2
            }
        ));

        let shorter = vec![Turn::participant("q1")];
        assert!(record.extend_transcript(&shorter).is_err());
        assert_eq!(record, snapshot);
    }
}
