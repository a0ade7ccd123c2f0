//! Read-side reporting over every stored conversation.
//!
//! All operations are full-corpus scans; there is no index.

use crate::record::ConversationRecord;
use crate::store::{Anomaly, ConversationStateStore, LoadOutcome};
use chrono::{DateTime, Utc};
use confide_core::{ConfideResult, SessionKey};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// One line of the session listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSummary {
    /// Conversation key.
    pub key: SessionKey,
    /// Number of recorded turns.
    pub turn_count: usize,
    /// Last activity.
    pub updated_at: DateTime<Utc>,
    /// Score of the current assessment, if any.
    pub assessment_score: Option<String>,
}

impl From<&ConversationRecord> for RecordSummary {
    fn from(record: &ConversationRecord) -> Self {
        Self {
            key: record.key.clone(),
            turn_count: record.turn_count(),
            updated_at: record.updated_at,
            assessment_score: record.assessment.as_ref().map(|a| a.score.clone()),
        }
    }
}

/// Result of [`ReportingAggregator::list_all`].
#[derive(Debug, Default)]
pub struct SessionListing {
    /// Most recently active first.
    pub sessions: Vec<RecordSummary>,
    /// Units that were skipped.
    pub anomalies: Vec<Anomaly>,
}

/// Corpus-wide statistics. Means and range are `None` when there is nothing to average.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    /// Readable conversations.
    pub session_count: usize,
    /// Distinct participant identifiers.
    pub participant_count: usize,
    /// Turns across all conversations.
    pub total_turns: usize,
    /// `total_turns / session_count`.
    pub mean_turns_per_session: Option<f64>,
    /// Conversations holding an assessment.
    pub sessions_with_assessment: usize,
    /// Mean over scores that read as numbers; others are ignored.
    pub mean_assessment_score: Option<f64>,
    /// Lowest and highest numeric score.
    pub assessment_score_range: Option<(f64, f64)>,
    /// Units skipped by the scan.
    pub anomaly_count: usize,
}

/// Lists, filters and summarizes the stored corpus.
pub struct ReportingAggregator<S: ConversationStateStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ConversationStateStore + ?Sized> ReportingAggregator<S> {
    /// Reports over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Summaries of every readable session, plus the units that were not.
    pub async fn list_all(&self) -> ConfideResult<SessionListing> {
        let scan = self.store.scan().await?;
        for anomaly in &scan.anomalies {
            warn!(
                unit = %anomaly.unit.display(),
                reason = %anomaly.reason,
                "skipping unreadable conversation unit"
            );
        }

        let mut records = scan.records;
        sort_by_activity(&mut records);
        Ok(SessionListing {
            sessions: records.iter().map(RecordSummary::from).collect(),
            anomalies: scan.anomalies,
        })
    }

    /// Full records belonging to one participant.
    pub async fn list_by_participant(
        &self,
        participant_id: &str,
    ) -> ConfideResult<Vec<ConversationRecord>> {
        let scan = self.store.scan().await?;
        let mut records: Vec<ConversationRecord> = scan
            .records
            .into_iter()
            .filter(|r| r.key.participant_id() == participant_id)
            .collect();
        sort_by_activity(&mut records);
        Ok(records)
    }

    /// A single stored conversation, if it exists and is readable.
    ///
    /// Unlike `load_or_create` this never fabricates an empty record.
    pub async fn find(&self, key: &SessionKey) -> ConfideResult<Option<ConversationRecord>> {
        match self.store.load(key).await? {
            LoadOutcome::Restored(record) => Ok(Some(record)),
            LoadOutcome::Fresh(_) | LoadOutcome::Recovered { .. } => Ok(None),
        }
    }

    /// Statistics over every readable session.
    pub async fn aggregate_statistics(&self) -> ConfideResult<Stats> {
        let scan = self.store.scan().await?;
        let mut stats = compute_stats(&scan.records);
        stats.anomaly_count = scan.anomalies.len();
        Ok(stats)
    }
}

/// `updated_at` descending, ties by key.
fn sort_by_activity(records: &mut [ConversationRecord]) {
    records.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.key.cmp(&b.key))
    });
}

fn compute_stats(records: &[ConversationRecord]) -> Stats {
    let participants: HashSet<&str> = records.iter().map(|r| r.key.participant_id()).collect();
    let total_turns: usize = records.iter().map(ConversationRecord::turn_count).sum();
    let scores: Vec<f64> = records
        .iter()
        .filter_map(|r| r.assessment.as_ref())
        .filter_map(confide_core::AssessmentRecord::numeric_score)
        .collect();

    let range = scores.iter().copied().fold(None, |acc: Option<(f64, f64)>, s| {
        Some(match acc {
            Some((lo, hi)) => (lo.min(s), hi.max(s)),
            None => (s, s),
        })
    });

    Stats {
        session_count: records.len(),
        participant_count: participants.len(),
        total_turns,
        mean_turns_per_session: mean(total_turns as f64, records.len()),
        sessions_with_assessment: records.iter().filter(|r| r.has_assessment()).count(),
        mean_assessment_score: mean(scores.iter().sum(), scores.len()),
        assessment_score_range: range,
        anomaly_count: 0,
    }
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use confide_core::AssessmentRecord;

    fn record(p: &str, c: &str, turns: usize, score: Option<&str>) -> ConversationRecord {
        let mut r = ConversationRecord::new(SessionKey::new(p, c).unwrap());
        for i in 0..turns {
            r.push_participant(format!("turn {i}"));
        }
        r.assessment = score.map(|s| AssessmentRecord::new(s, "", ""));
        r
    }

    #[test]
    fn test_stats_empty_corpus() {
        let stats = compute_stats(&[]);
        assert_eq!(stats.session_count, 0);
        assert_eq!(stats.total_turns, 0);
        assert_eq!(stats.mean_turns_per_session, None);
        assert_eq!(stats.mean_assessment_score, None);
        assert_eq!(stats.assessment_score_range, None);
    }

    #[test]
    fn test_stats_ignore_non_numeric_scores() {
        let records = vec![
            record("p1", "c1", 1, Some("severe")),
            record("p1", "c2", 3, Some("4/10")),
        ];
        let stats = compute_stats(&records);
        assert_eq!(stats.participant_count, 1);
        assert_eq!(stats.sessions_with_assessment, 2);
        assert_eq!(stats.mean_assessment_score, Some(4.0));
        assert_eq!(stats.assessment_score_range, Some((4.0, 4.0)));
    }

    #[test]
    fn test_sort_by_activity_breaks_ties_by_key() {
        let mut a = record("p2", "c1", 0, None);
        let mut b = record("p1", "c1", 0, None);
        let mut c = record("p1", "c2", 0, None);
        let t = a.updated_at;
        a.updated_at = t;
        b.updated_at = t;
        c.updated_at = t + Duration::seconds(10);

        let mut records = vec![a, b, c];
        sort_by_activity(&mut records);
        let keys: Vec<String> = records.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["p1/c2", "p1/c1", "p2/c1"]);
    }
}
