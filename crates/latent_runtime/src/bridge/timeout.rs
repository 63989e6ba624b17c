// Timeout - An internal timer task racing a latent operation
//
// The timer is a normal registered task with no resume point. Whichever of
// the pair settles first wins: the operation cancels the timer when it
// settles, and the timer fails the operation when it fires.

use std::time::Duration;

use latent_types::TaskToken;

use super::{AsyncBridge, LatentRequest};
use crate::error::BridgeResult;
use crate::handle::TaskLink;
use crate::platform::PlatformRequest;

impl AsyncBridge {
    pub(crate) fn launch_with_timeout(
        &self,
        request: LatentRequest,
        limit: Duration,
    ) -> BridgeResult<TaskToken> {
        let owner = request.owner;
        let operation = request.operation;
        let timer = self.registry.next_token();

        let token = self.launch(request.with_link(TaskLink::CancelOnSettle(timer)))?;
        if !self.is_pending(token) {
            // Settled inside `start`; nothing left to race.
            return Ok(token);
        }

        let race = LatentRequest::internal(
            super::TIMEOUT,
            owner,
            PlatformRequest::Delay { duration: limit },
        )
        .with_token(timer)
        .with_link(TaskLink::FailOnComplete {
            target: token,
            reason: format!("{operation} timed out after {:.3}s", limit.as_secs_f64()),
        });

        if let Err(e) = self.launch(race) {
            tracing::debug!(token = %token, error = %e, "Timeout timer not started");
            self.cancel(token);
            return Err(e);
        }

        // The operation may have settled before the timer was registered, in
        // which case its link found nothing to cancel.
        if !self.is_pending(token) {
            self.cancel(timer);
        }

        tracing::trace!(token = %token, timer = %timer, limit = ?limit, "Timeout armed");
        Ok(token)
    }
}
