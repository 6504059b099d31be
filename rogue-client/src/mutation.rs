/// Insert, update and remove sessions
///
/// A session is bound to one [`MutationKind`] and one token when it opens.
/// Frames go to the transport as soon as they are sent; the server never
/// acknowledges individual frames, only the session as a whole. Success
/// means every frame was applied and failure means none were.
///
/// # Abandonment
///
/// [`MutationSession::abandon`] (or dropping the session) stops the local
/// flows and marks the session failed. It does not tell the server to roll
/// back: frames already on the wire may or may not take effect. Re-query if
/// the outcome matters.
use crate::error::SessionError;
use crate::request::{MutationKind, MutationRequest};
use crate::session::{SessionCore, SessionStatus};
use crate::transport::{Exchange, Inbound};
use rogue_core::{AuthToken, Operand, OperandCodec, TypedOperand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What a completed session submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationSummary {
    pub kind: MutationKind,
    pub frames: usize,
    pub messages: usize,
}

pub struct MutationSession {
    kind: MutationKind,
    token: AuthToken,
    codec: Arc<OperandCodec>,
    core: SessionCore<MutationRequest, ()>,
    frames: usize,
    messages: usize,
}

impl MutationSession {
    pub(crate) fn start(
        kind: MutationKind,
        token: AuthToken,
        codec: Arc<OperandCodec>,
        exchange: Exchange<MutationRequest>,
    ) -> Self {
        info!(kind = %kind, "Mutation session opened");
        let core = SessionCore::start(kind.as_str(), exchange, move |inbound| drain(kind, inbound));
        Self {
            kind,
            token,
            codec,
            core,
            frames: 0,
            messages: 0,
        }
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn status(&self) -> SessionStatus {
        self.core.status().clone()
    }

    /// Send one frame of operands
    ///
    /// Every operand is checked against the codec first; an invalid operand
    /// rejects the whole frame before anything reaches the transport.
    pub async fn send(&mut self, messages: Vec<TypedOperand>) -> Result<(), SessionError> {
        for message in &messages {
            self.codec.validate(message)?;
        }

        let count = messages.len();
        let frame = MutationRequest {
            kind: self.kind,
            token: self.token.clone(),
            messages,
        };
        self.core.send(frame).await?;

        self.frames += 1;
        self.messages += count;
        debug!(kind = %self.kind, frame = self.frames, messages = count, "Sent mutation frame");
        Ok(())
    }

    /// Encode domain values and send them as one frame
    pub async fn send_values<T: Operand>(&mut self, values: &[T]) -> Result<(), SessionError> {
        let messages = values
            .iter()
            .map(|value| self.codec.encode(value))
            .collect::<Result<Vec<_>, _>>()?;
        self.send(messages).await
    }

    /// Signal that no more frames follow and wait for the terminal signal
    pub async fn complete(mut self, timeout: Duration) -> Result<MutationSummary, SessionError> {
        let summary = MutationSummary {
            kind: self.kind,
            frames: self.frames,
            messages: self.messages,
        };

        match self.core.finish(timeout).await {
            Ok(()) => {
                info!(kind = %self.kind, frames = summary.frames, messages = summary.messages, "Mutation session completed");
                Ok(summary)
            }
            Err(err) => {
                warn!(kind = %self.kind, frames = summary.frames, error = %err, "Mutation session failed; no frames applied");
                Err(err)
            }
        }
    }

    /// Give up on the session without waiting for the server
    pub fn abandon(mut self) {
        if self.core.abandon() {
            warn!(
                kind = %self.kind,
                frames = self.frames,
                "Mutation session abandoned; server-side effects are unknown"
            );
        }
    }
}

async fn drain(kind: MutationKind, mut inbound: mpsc::Receiver<Inbound>) -> Result<(), SessionError> {
    while let Some(item) = inbound.recv().await {
        match item {
            Ok(frame) if frame.is_empty() => {}
            Ok(frame) => {
                debug!(kind = %kind, buckets = frame.results.len(), "Ignoring result payload on mutation stream");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
