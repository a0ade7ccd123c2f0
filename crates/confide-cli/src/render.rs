use chrono::SecondsFormat;
use confide_core::Role;
use confide_session::{ConversationRecord, SessionListing, Stats};
use std::fmt::Write;

const RULE: usize = 72;

pub fn listing(listing: &SessionListing) -> String {
    let mut out = String::new();
    if listing.sessions.is_empty() {
        out.push_str("No conversations stored.\n");
    } else {
        let _ = writeln!(
            out,
            "{:<40} {:>6}  {:<20}  {}",
            "SESSION", "TURNS", "UPDATED", "SCORE"
        );
        for s in &listing.sessions {
            let _ = writeln!(
                out,
                "{:<40} {:>6}  {:<20}  {}",
                s.key.to_string(),
                s.turn_count,
                s.updated_at.format("%Y-%m-%d %H:%M:%S"),
                s.assessment_score.as_deref().unwrap_or("-"),
            );
        }
        let _ = writeln!(out, "\nTotal: {} conversation(s)", listing.sessions.len());
    }
    if !listing.anomalies.is_empty() {
        let _ = writeln!(
            out,
            "Skipped {} unit(s):",
            listing.anomalies.len()
        );
        for anomaly in &listing.anomalies {
            let _ = writeln!(out, "  {}: {}", anomaly.unit.display(), anomaly.reason);
        }
    }
    out
}

pub fn conversation(record: &ConversationRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "=".repeat(RULE));
    let _ = writeln!(out, "Participant:  {}", record.key.participant_id());
    let _ = writeln!(out, "Conversation: {}", record.key.conversation_id());
    let _ = writeln!(
        out,
        "Created:      {}",
        record.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(
        out,
        "Updated:      {}",
        record.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "Turns:        {}", record.turn_count());
    let _ = writeln!(out, "{}\n", "=".repeat(RULE));

    for (i, turn) in record.transcript.iter().enumerate() {
        let who = match turn.role {
            Role::Participant => "PARTICIPANT",
            Role::Agent => "AGENT",
        };
        let _ = writeln!(out, "{}. {who}", i + 1);
        let _ = writeln!(out, "   {}\n", turn.text);
    }

    match &record.assessment {
        Some(a) => {
            let _ = writeln!(
                out,
                "Assessment (recorded {}):",
                a.recorded_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            );
            let _ = writeln!(out, "  Score:     {}", a.score);
            let _ = writeln!(out, "  Rationale: {}", a.rationale);
            let _ = writeln!(out, "  Summary:   {}", a.summary);
        }
        None => out.push_str("No assessment recorded.\n"),
    }
    out
}

pub fn stats(stats: &Stats) -> String {
    let mut out = String::new();
    let rule = "=".repeat(40);
    let _ = writeln!(out, "Conversation statistics\n{rule}");
    let _ = writeln!(out, "Sessions:                 {}", stats.session_count);
    let _ = writeln!(out, "Unique participants:      {}", stats.participant_count);
    let _ = writeln!(out, "Total turns:              {}", stats.total_turns);
    let _ = writeln!(
        out,
        "Avg turns per session:    {}",
        optional(stats.mean_turns_per_session)
    );
    let _ = writeln!(
        out,
        "Sessions with assessment: {}",
        stats.sessions_with_assessment
    );
    let _ = writeln!(
        out,
        "Avg assessment score:     {}",
        optional(stats.mean_assessment_score)
    );
    let range = stats
        .assessment_score_range
        .map_or_else(|| "-".to_string(), |(lo, hi)| format!("{lo} .. {hi}"));
    let _ = writeln!(out, "Score range:              {range}");
    if stats.anomaly_count > 0 {
        let _ = writeln!(out, "Skipped units:            {}", stats.anomaly_count);
    }
    let _ = writeln!(out, "{rule}");
    out
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}
