use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What `load_or_create` does with a unit that fails to decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptionPolicy {
    /// Log the anomaly and start the conversation over with an empty record.
    #[default]
    Recover,
    /// Surface the decode error to the caller.
    Fail,
}

/// Settings for [`crate::FileConversationStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one JSON unit per conversation.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// What `load` does with a unit it cannot decode.
    #[serde(default)]
    pub on_corrupt: CorruptionPolicy,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/chats")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            on_corrupt: CorruptionPolicy::default(),
        }
    }
}
