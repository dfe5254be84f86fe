//! Gate verdicts

use serde::Serialize;

/// Which rule denied the attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DenyReason {
    /// Per-IP minute or hour window exhausted
    Ip,
    /// Per-identifier soft limit reached, backoff in effect
    Identifier,
    /// Identifier is hard-locked after consecutive failures
    Lockout,
}

impl DenyReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Ip => "ip",
            DenyReason::Identifier => "identifier",
            DenyReason::Lockout => "lockout",
        }
    }
}

/// Outcome of one gate check
///
/// A denial always carries a positive retry hint in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied {
        reason: DenyReason,
        retry_after_secs: u64,
    },
}

impl Verdict {
    /// Build a denial; the retry hint is clamped to at least one second
    pub fn denied(reason: DenyReason, retry_after_secs: u64) -> Self {
        Verdict::Denied {
            reason,
            retry_after_secs: retry_after_secs.max(1),
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    pub fn reason(&self) -> Option<DenyReason> {
        match self {
            Verdict::Allowed => None,
            Verdict::Denied { reason, .. } => Some(*reason),
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Verdict::Allowed => None,
            Verdict::Denied {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
        }
    }
}
