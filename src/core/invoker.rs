//! Single stage call with timeout and cooperative cancellation.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapters::Stage;
use crate::domain::StageRole;

use super::error::InvokeError;

/// Wraps calls to stage backends.
///
/// The call is awaited to completion before returning; a timeout or a
/// backend error surfaces as `StageInvocation`, a cancellation request as
/// `Cancelled`. Dropping the in-flight future is how cancellation reaches
/// the backend.
#[derive(Debug, Clone, Default)]
pub struct StageInvoker {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl StageInvoker {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels calls made through this invoker
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Call the stage and return its raw output unchanged
    pub async fn invoke(
        &self,
        role: StageRole,
        stage: &dyn Stage,
        input: &str,
    ) -> Result<String, InvokeError> {
        if self.cancel.is_cancelled() {
            return Err(InvokeError::Cancelled { stage: role });
        }

        debug!(stage = %role, backend = stage.name(), "Invoking stage");

        let call = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, stage.generate(input)).await {
                    Ok(result) => result.map_err(|e| format!("{:#}", e)),
                    Err(_) => Err(format!("timed out after {:?}", limit)),
                },
                None => stage.generate(input).await.map_err(|e| format!("{:#}", e)),
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(InvokeError::Cancelled { stage: role }),
            result = call => result.map_err(|message| InvokeError::StageInvocation {
                stage: role,
                message,
            }),
        }
    }
}
