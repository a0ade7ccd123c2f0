use serde::{Deserialize, Serialize};

/// Who authored a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human taking part in the conversation.
    #[serde(alias = "user")]
    Participant,
    /// The conversational agent.
    #[serde(alias = "assistant")]
    Agent,
}

impl Role {
    /// Lowercase name as written to durable storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Participant => "participant",
            Role::Agent => "agent",
        }
    }
}

/// A single message in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Author of the message.
    pub role: Role,
    /// Message text.
    pub text: String,
}

impl Turn {
    /// Creates a turn with the given role and text.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    /// Creates a turn with [`Role::Participant`].
    pub fn participant(text: impl Into<String>) -> Self {
        Self::new(Role::Participant, text)
    }

    /// Creates a turn with [`Role::Agent`].
    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(Role::Agent, text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&Turn::agent("hi")).unwrap();
        assert_eq!(json, r#"{"role":"agent","text":"hi"}"#);
        assert_eq!(Role::Participant.as_str(), "participant");
    }

    #[test]
    fn test_role_accepts_legacy_names() {
        let role: Role = serde_json::from_str(r#""user""#).unwrap();
        assert_eq!(role, Role::Participant);
        let role: Role = serde_json::from_str(r#""assistant""#).unwrap();
        assert_eq!(role, Role::Agent);
        assert!(serde_json::from_str::<Role>(r#""system""#).is_err());
    }
}
