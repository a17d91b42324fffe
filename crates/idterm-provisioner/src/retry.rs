use std::time::Duration;

use idterm_client::ClientError;
use idterm_config::RetrySettings;

/// How the role assignment retry loop should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The new principal is not resolvable by the authorization service yet.
    TransientVisibility,
    /// Throttling, a server-side failure, or no response at all.
    Transient,
    /// Invalid scope, missing permissions, conflicts. Retrying cannot help.
    Permanent,
}

impl Disposition {
    pub fn is_retryable(self) -> bool {
        !matches!(self, Disposition::Permanent)
    }
}

pub fn classify(err: &ClientError) -> Disposition {
    match err {
        ClientError::Api { code, .. } if code == "PrincipalNotFound" => Disposition::TransientVisibility,
        ClientError::Api { status, .. } if *status == 429 || *status >= 500 => Disposition::Transient,
        ClientError::Transport { .. } => Disposition::Transient,
        _ => Disposition::Permanent,
    }
}

/// Bounded exponential backoff with an overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub deadline: Duration,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based):
    /// `initial_delay * 2^(attempt - 1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            initial_delay: s.initial_delay,
            max_delay:     s.max_delay,
            max_attempts:  s.max_attempts,
            deadline:      s.deadline,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}
