//! Line classification: turns one line of unstructured miner output into
//! zero or more metric events.
//!
//! The upstream log format is unstructured, so matching is heuristic by
//! necessity: case-insensitive substring checks, first match wins per
//! category, and a malformed line never fails the pipeline - it just
//! yields nothing.

use plotwatch_types::{HealthSeverity, MetricEvent};

/// Classify a single line of miner output.
///
/// A line can match several independent categories and yield one event
/// per category (an error line mentioning both the network and a disk
/// read contributes to both counters).
pub fn classify(line: &str) -> Vec<MetricEvent> {
    let lower = line.to_ascii_lowercase();
    let mut events = Vec::new();

    if lower.contains("height") {
        if let Some(height) = value_after(line, &lower, "height") {
            events.push(MetricEvent::RoundObserved(height.to_string()));
        }
    }

    if lower.contains("deadline") && lower.contains("best") {
        if let Some(deadline) = value_after(line, &lower, "deadline") {
            events.push(MetricEvent::DeadlineObserved(deadline.to_string()));
        }
    }

    if (lower.contains("submitted") || lower.contains("submission"))
        && (lower.contains("success") || lower.contains("accepted"))
    {
        events.push(MetricEvent::SubmissionAccepted);
    }

    if lower.contains("error")
        && (lower.contains("network") || lower.contains("connection") || lower.contains("timeout"))
    {
        events.push(MetricEvent::NetworkErrorObserved);
    }

    if lower.contains("finished") && lower.contains("speed") {
        events.push(MetricEvent::ReadCompleted);
    }

    if lower.contains("failed")
        && (lower.contains("read") || lower.contains("disk") || lower.contains("i/o"))
    {
        events.push(MetricEvent::ReadFailed);
    }

    if lower.contains("health") {
        if let Some(severity) = health_severity(line, &lower) {
            events.push(MetricEvent::HealthLineObserved {
                line: line.to_string(),
                severity,
            });
        }
    }

    events
}

/// The token immediately following `keyword`, with separators between the
/// keyword and the token skipped and trailing `:`/`,` stripped.
///
/// `lower` must be the ASCII-lowercased copy of `line`; byte offsets are
/// shared between the two.
fn value_after<'a>(line: &'a str, lower: &str, keyword: &str) -> Option<&'a str> {
    let at = lower.find(keyword)?;
    let rest = line[at + keyword.len()..]
        .trim_start_matches(|c: char| c.is_whitespace() || c == ':' || c == ',');
    let token = rest.split_whitespace().next()?.trim_end_matches([':', ',']);
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn health_severity(line: &str, lower: &str) -> Option<HealthSeverity> {
    if lower.contains("healthy") || line.contains('✓') {
        Some(HealthSeverity::Ok)
    } else if lower.contains("warning") || line.contains('⚠') {
        Some(HealthSeverity::Warning)
    } else if lower.contains("critical") || line.contains('✗') {
        Some(HealthSeverity::Critical)
    } else {
        None
    }
}
