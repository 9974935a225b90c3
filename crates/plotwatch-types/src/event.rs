use serde::{Deserialize, Serialize};

/// Severity of a disk-health report line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum HealthSeverity {
    Ok,
    Warning,
    Critical,
}

impl HealthSeverity {
    /// Lowercase label for logs and status lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthSeverity::Ok => "healthy",
            HealthSeverity::Warning => "warning",
            HealthSeverity::Critical => "critical",
        }
    }
}

/// One fact observed in a single line of miner output.
///
/// Produced by the classifier, consumed exactly once by the aggregator.
/// Round and deadline values are opaque strings; whether a deadline is
/// "better" than the previous one is the consumer's concern.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MetricEvent {
    RoundObserved(String),
    DeadlineObserved(String),
    SubmissionAccepted,
    NetworkErrorObserved,
    ReadCompleted,
    ReadFailed,
    HealthLineObserved {
        line: String,
        severity: HealthSeverity,
    },
}
