use crate::error::{ConfideError, ConfideResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest token accepted for either half of a [`SessionKey`].
pub const MAX_TOKEN_LEN: usize = 128;

/// Identifies one conversation: who is talking, and which thread.
///
/// Both halves are opaque tokens over `[A-Za-z0-9_-]`. The `.` character is
/// deliberately excluded so it can separate the halves in a unit name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "KeyParts")]
pub struct SessionKey {
    participant_id: String,
    conversation_id: String,
}

#[derive(Deserialize)]
struct KeyParts {
    participant_id: String,
    conversation_id: String,
}

impl TryFrom<KeyParts> for SessionKey {
    type Error = ConfideError;

    fn try_from(parts: KeyParts) -> ConfideResult<Self> {
        Self::new(parts.participant_id, parts.conversation_id)
    }
}

impl SessionKey {
    /// Creates a key, validating both tokens.
    pub fn new(
        participant_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> ConfideResult<Self> {
        let participant_id = participant_id.into();
        let conversation_id = conversation_id.into();
        validate_token("participant_id", &participant_id)?;
        validate_token("conversation_id", &conversation_id)?;
        Ok(Self {
            participant_id,
            conversation_id,
        })
    }

    /// The participant half of the key.
    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// The conversation half of the key.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Deterministic durable unit name: `{participant_id}.{conversation_id}.json`.
    pub fn unit_name(&self) -> String {
        format!("{}.{}.json", self.participant_id, self.conversation_id)
    }

    /// Inverse of [`SessionKey::unit_name`]. Returns `None` for any other file name.
    pub fn from_unit_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".json")?;
        let (participant, conversation) = stem.split_once('.')?;
        Self::new(participant, conversation).ok()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.participant_id, self.conversation_id)
    }
}

/// Returns `true` if `token` is usable as either half of a [`SessionKey`].
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

fn validate_token(field: &str, token: &str) -> ConfideResult<()> {
    if is_valid_token(token) {
        Ok(())
    } else {
        Err(ConfideError::InvalidKey(format!(
            "{field} {token:?} must be 1-{MAX_TOKEN_LEN} characters of [A-Za-z0-9_-]"
        )))
    }
}
