//! Readiness conditions applied between navigation and snapshot.

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Default settle delay after navigation (10 seconds).
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(10);

/// Default interval between readiness checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How the renderer decides a navigated page is ready to snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// Unconditional pause, long enough for challenge scripts to finish.
    Fixed(Duration),
    /// Poll until `document.readyState == "complete"`, at most `max`.
    DocumentComplete {
        /// Check interval.
        poll: Duration,
        /// Upper bound on the wait.
        max: Duration,
    },
    /// Poll until `selector` matches an element, at most `max`.
    Selector {
        /// CSS selector to wait for.
        selector: String,
        /// Check interval.
        poll: Duration,
        /// Upper bound on the wait.
        max: Duration,
    },
}

impl Default for WaitCondition {
    fn default() -> Self {
        Self::Fixed(DEFAULT_SETTLE_DELAY)
    }
}

impl WaitCondition {
    /// Longest time this condition can hold up a render.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::DocumentComplete { max, .. } | Self::Selector { max, .. } => *max,
        }
    }

    /// Same kind of condition with a different bound (the pause, for `Fixed`).
    #[must_use]
    pub fn with_max(self, bound: Duration) -> Self {
        match self {
            Self::Fixed(_) => Self::Fixed(bound),
            Self::DocumentComplete { poll, .. } => Self::DocumentComplete { poll, max: bound },
            Self::Selector { selector, poll, .. } => Self::Selector {
                selector,
                poll,
                max: bound,
            },
        }
    }
}

/// Result of a bounded poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The check returned `true` after this many attempts.
    Satisfied {
        /// Number of checks run.
        attempts: u32,
    },
    /// `max` elapsed first.
    TimedOut {
        /// Number of checks run.
        attempts: u32,
    },
}

/// Runs `check` every `poll` until it returns `true` or `max` has elapsed.
///
/// The check runs at least once, even with a zero `max`. Check errors are the
/// caller's concern: fold them into `false` to keep polling.
pub async fn poll_until<F, Fut>(poll: Duration, max: Duration, mut check: F) -> PollResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + max;
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        if check().await {
            return PollResult::Satisfied { attempts };
        }
        let now = Instant::now();
        if now >= deadline {
            return PollResult::TimedOut { attempts };
        }
        sleep(poll.min(deadline - now)).await;
    }
}
