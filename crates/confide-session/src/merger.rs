use crate::record::ConversationRecord;
use confide_core::{AssessmentRecord, ConfideResult};

/// Applies assessment updates under latest-wins, single-slot semantics.
pub struct AssessmentMerger;

impl AssessmentMerger {
    /// Returns a copy of `record` whose assessment is `incoming`.
    ///
    /// `updated_at` moves forward to `incoming.recorded_at` when that is later.
    /// A malformed `incoming` is rejected and `record` is left as it was.
    pub fn merge(
        record: &ConversationRecord,
        incoming: AssessmentRecord,
    ) -> ConfideResult<ConversationRecord> {
        incoming.validate()?;
        let mut merged = record.clone();
        merged.touch(incoming.recorded_at);
        merged.assessment = Some(incoming);
        Ok(merged)
    }
}
