//! Failure classification for partner-facing dispatches.
//!
//! Every transport-level failure is mapped into one member of a closed
//! taxonomy before it is allowed to touch lane state. The kind alone decides
//! severity, retryability and the recommended retry delay; no other code
//! path re-derives those independently.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::transport::FailureSignal;

/// Closed failure taxonomy driving retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connection,
    Authentication,
    Validation,
    ProtocolEncoding,
    BusinessLogic,
    RateLimit,
    Timeout,
    Configuration,
    DataMapping,
    Unknown,
}

/// Severity attached to a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Validation => "validation",
            ErrorKind::ProtocolEncoding => "protocol_encoding",
            ErrorKind::BusinessLogic => "business_logic",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Configuration => "configuration",
            ErrorKind::DataMapping => "data_mapping",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Only transient network-ish failures are worth retrying without a
    /// human or a data fix.
    pub fn can_retry(&self) -> bool {
        matches!(
            self,
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::RateLimit | ErrorKind::Unknown
        )
    }

    /// Recommended delay before the next attempt, in seconds.
    pub fn recommended_retry_delay_seconds(&self) -> u64 {
        match self {
            ErrorKind::Connection => 30,
            ErrorKind::Timeout => 60,
            ErrorKind::RateLimit => 300,
            ErrorKind::Unknown => 120,
            _ => 0,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorKind::Authentication | ErrorKind::Configuration => Severity::Critical,
            ErrorKind::Connection | ErrorKind::BusinessLogic => Severity::High,
            ErrorKind::ProtocolEncoding | ErrorKind::Validation | ErrorKind::DataMapping => {
                Severity::Medium
            }
            ErrorKind::Timeout | ErrorKind::RateLimit => Severity::Low,
            ErrorKind::Unknown => Severity::Medium,
        }
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

/// Result of classifying a raw failure signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Classification {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub can_retry: bool,
    pub retry_delay_seconds: u64,
    pub requires_manual_intervention: bool,
    /// Human-readable message carried through to the error record.
    pub message: String,
}

/// Ordered substring rules applied to the failure message when the transport
/// did not supply a structured category. First match wins, so the more
/// specific patterns sit above the generic ones.
const MESSAGE_RULES: &[(&str, ErrorKind)] = &[
    ("unauthorized", ErrorKind::Authentication),
    ("authentication", ErrorKind::Authentication),
    ("credential", ErrorKind::Authentication),
    ("rate limit", ErrorKind::RateLimit),
    ("too many requests", ErrorKind::RateLimit),
    ("throttl", ErrorKind::RateLimit),
    ("timed out", ErrorKind::Timeout),
    ("timeout", ErrorKind::Timeout),
    ("connection refused", ErrorKind::Connection),
    ("connection reset", ErrorKind::Connection),
    ("network", ErrorKind::Connection),
    ("dns", ErrorKind::Connection),
    ("unreachable", ErrorKind::Connection),
    ("soap fault", ErrorKind::ProtocolEncoding),
    ("malformed xml", ErrorKind::ProtocolEncoding),
    ("parse error", ErrorKind::ProtocolEncoding),
    ("encoding", ErrorKind::ProtocolEncoding),
    ("validation", ErrorKind::Validation),
    ("invalid value", ErrorKind::Validation),
    ("schema", ErrorKind::Validation),
    ("business rule", ErrorKind::BusinessLogic),
    ("not bookable", ErrorKind::BusinessLogic),
    ("inventory closed", ErrorKind::BusinessLogic),
    ("missing mapping", ErrorKind::DataMapping),
    ("unknown room type", ErrorKind::DataMapping),
    ("unknown rate plan", ErrorKind::DataMapping),
    ("misconfigured", ErrorKind::Configuration),
    ("configuration", ErrorKind::Configuration),
];

/// Classify a failure signal into the closed taxonomy.
///
/// An explicit category from the transport layer wins outright; otherwise
/// the free-text message is matched case-insensitively against the ordered
/// rule table, defaulting to [`ErrorKind::Unknown`]. Pure function, no side
/// effects.
pub fn classify(signal: &FailureSignal) -> Classification {
    let kind = signal
        .category
        .unwrap_or_else(|| classify_message(&signal.message));

    let severity = kind.severity();
    Classification {
        kind,
        severity,
        can_retry: kind.can_retry(),
        retry_delay_seconds: kind.recommended_retry_delay_seconds(),
        requires_manual_intervention: severity == Severity::Critical,
        message: signal.message.clone(),
    }
}

fn classify_message(message: &str) -> ErrorKind {
    let haystack = message.to_lowercase();
    MESSAGE_RULES
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map(|(_, kind)| *kind)
        .unwrap_or(ErrorKind::Unknown)
}
