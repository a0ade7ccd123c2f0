use crate::merger::AssessmentMerger;
use crate::record::ConversationRecord;
use crate::store::ConversationStateStore;
use confide_core::{AssessmentRecord, ConfideResult, SessionKey, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Entry point for the agent runtime.
///
/// Holds the record of every open conversation and persists a full snapshot
/// after each completed turn. A snapshot only replaces the held record once it
/// has been saved, so a failed save can be retried with the same arguments.
pub struct SessionBridge<S: ConversationStateStore + ?Sized> {
    store: Arc<S>,
    open: RwLock<HashMap<SessionKey, ConversationRecord>>,
}

impl<S: ConversationStateStore + ?Sized> SessionBridge<S> {
    /// A bridge with no open conversations.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            open: RwLock::new(HashMap::new()),
        }
    }

    /// Loads (or starts) the conversation and returns its prior state.
    pub async fn on_conversation_start(
        &self,
        key: &SessionKey,
    ) -> ConfideResult<(Vec<Turn>, Option<AssessmentRecord>)> {
        let record = self.store.load_or_create(key).await?;
        if record.transcript.is_empty() {
            info!(key = %key, "starting new conversation");
        } else {
            info!(key = %key, turns = record.turn_count(), "resuming conversation");
        }
        let state = (record.transcript.clone(), record.assessment.clone());
        self.open.write().await.insert(key.clone(), record);
        Ok(state)
    }

    /// Records a completed turn.
    ///
    /// `transcript` is the full transcript so far and must extend the one
    /// already held. `assessment`, when present, replaces the current one.
    /// An invalid assessment is reported as an error after the transcript has
    /// been saved; the previous assessment stays in place.
    pub async fn on_turn_completed(
        &self,
        key: &SessionKey,
        transcript: &[Turn],
        assessment: Option<AssessmentRecord>,
    ) -> ConfideResult<()> {
        let held = self.open.read().await.get(key).cloned();
        let mut next = match held {
            Some(record) => record,
            None => self.store.load_or_create(key).await?,
        };

        let appended = next.extend_transcript(transcript)?;
        let rejected = match assessment.map(|incoming| AssessmentMerger::merge(&next, incoming)) {
            Some(Ok(merged)) => {
                next = merged;
                None
            }
            Some(Err(e)) => {
                warn!(key = %key, error = %e, "assessment rejected, saving transcript only");
                Some(e)
            }
            None => None,
        };

        self.store.save(&next).await?;
        debug!(key = %key, appended, turns = next.turn_count(), "turn persisted");
        self.open.write().await.insert(key.clone(), next);
        match rejected {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Forgets the held record. Durable state is unaffected.
    pub async fn on_conversation_end(&self, key: &SessionKey) {
        self.open.write().await.remove(key);
    }

    /// Copy of the held record, if the conversation is open.
    pub async fn snapshot(&self, key: &SessionKey) -> Option<ConversationRecord> {
        self.open.read().await.get(key).cloned()
    }
}
