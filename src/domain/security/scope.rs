//! Deadline isolation for a single analysis

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::context::{CancelHandle, RequestContext};

/// Budget used when no model timeout is configured
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_millis(300);

/// Caller deadlines closer than this are ignored in favour of a fresh budget
pub const DETACH_THRESHOLD: Duration = Duration::from_millis(5);

/// Why a guarded call did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    DeadlineExceeded,
    Cancelled,
}

/// Deadline and cancellation scope governing every collaborator call of one
/// analysis.
///
/// The scope owns its own cancellation signal and fires it when dropped, so
/// downstream work tied to the scope is released on every exit path.
#[derive(Debug)]
pub struct AnalysisScope {
    context: RequestContext,
    deadline: Instant,
    budget: Duration,
    window: Duration,
    detached: bool,
    _release: CancelHandle,
}

impl AnalysisScope {
    /// Derive a scope from the caller's context.
    ///
    /// A caller deadline less than [`DETACH_THRESHOLD`] away is replaced by a
    /// fresh budget with no inherited cancellation. Otherwise the scope ends at
    /// the earlier of the caller deadline and `now + budget`.
    pub fn isolate(parent: &RequestContext, model_timeout: Option<Duration>) -> Self {
        let budget = model_timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(DEFAULT_MODEL_TIMEOUT);

        let now = Instant::now();
        let fresh_deadline = now + budget;

        let (deadline, signals, detached) = match parent.deadline() {
            Some(parent_deadline)
                if parent_deadline.saturating_duration_since(now) < DETACH_THRESHOLD =>
            {
                (fresh_deadline, Vec::new(), true)
            }
            Some(parent_deadline) => (
                parent_deadline.min(fresh_deadline),
                parent.signals().to_vec(),
                false,
            ),
            None => (fresh_deadline, parent.signals().to_vec(), false),
        };

        let (context, release) = RequestContext::from_parts(Some(deadline), signals).cancellable();

        Self {
            context,
            deadline,
            budget,
            window: deadline.saturating_duration_since(now),
            detached,
            _release: release,
        }
    }

    /// Context handed to collaborators
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Effective timeout this scope was created with
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Time between scope creation and its deadline. Shorter than the
    /// budget when the caller deadline was earlier.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// True when the caller deadline was too close and got replaced
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Run `fut` until it completes, the deadline passes, or the scope is
    /// cancelled, whichever happens first. An already expired or cancelled
    /// scope never polls `fut`.
    pub async fn guard<F, T>(&self, fut: F) -> Result<T, Interruption>
    where
        F: Future<Output = T>,
    {
        if self.context.is_cancelled() {
            return Err(Interruption::Cancelled);
        }

        if Instant::now() >= self.deadline {
            return Err(Interruption::DeadlineExceeded);
        }

        tokio::select! {
            biased;
            _ = self.context.cancelled() => Err(Interruption::Cancelled),
            output = tokio::time::timeout_at(self.deadline, fut) => {
                output.map_err(|_| Interruption::DeadlineExceeded)
            }
        }
    }
}
