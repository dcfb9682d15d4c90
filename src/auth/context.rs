//! Per-call cancellation, deadline and correlation id.

use crate::error::{AuthError, ErrorKind, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Caller-supplied context for one service call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Context with a fresh request id, no deadline and its own cancellation token.
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Tie this call to an external cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancel the call and everything sharing its token.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fail if the call has already been cancelled or run out of time.
    pub fn check(&self, op: &'static str) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AuthError::new(ErrorKind::Cancelled, op));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AuthError::new(ErrorKind::DeadlineExceeded, op));
        }
        Ok(())
    }

    /// Drive `work` until it finishes, the call is cancelled, or the deadline
    /// passes, whichever comes first. Cancellation wins ties.
    pub async fn run<F: Future>(&self, op: &'static str, work: F) -> Result<F::Output> {
        self.check(op)?;

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(AuthError::new(ErrorKind::Cancelled, op)),
            () = deadline => Err(AuthError::new(ErrorKind::DeadlineExceeded, op)),
            out = work => Ok(out),
        }
    }
}
