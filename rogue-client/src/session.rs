/// Session state machine shared by mutation and search sessions
///
/// ```text
/// Open -> Streaming -> Completing -> Completed
///   \________\______________\-----> Failed
/// ```
///
/// Transitions only move forward and the first terminal state wins, so a
/// session reports exactly one terminal outcome.
use crate::error::SessionError;
use crate::transport::{Exchange, Inbound};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Bound to a kind and token; nothing sent yet
    Open,
    /// At least one frame submitted
    Streaming,
    /// Writes done; waiting for the terminal signal
    Completing,
    /// Terminal success
    Completed,
    /// Terminal error, timeout or abandonment
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            SessionState::Open => 0,
            SessionState::Streaming => 1,
            SessionState::Completing => 2,
            SessionState::Completed | SessionState::Failed => 3,
        }
    }
}

/// Shared, synchronized view of a session's state
///
/// Clones observe the same session and stay valid after it is consumed.
#[derive(Debug, Clone)]
pub struct SessionStatus {
    state: Arc<Mutex<SessionState>>,
}

impl SessionStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Open)),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Move to `next` if that is a forward step; returns whether it moved
    pub(crate) fn advance(&self, next: SessionState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() || next.rank() < state.rank() {
            return false;
        }
        let moved = *state != next;
        *state = next;
        moved
    }
}

/// Producer/consumer plumbing behind a session
///
/// The caller pushes frames through `outbound`; a spawned consumer task
/// drains the inbound channel and resolves `terminal` exactly once.
pub(crate) struct SessionCore<F, T> {
    label: &'static str,
    outbound: Option<mpsc::Sender<F>>,
    terminal: oneshot::Receiver<Result<T, SessionError>>,
    consumer: JoinHandle<()>,
    abort: Option<AbortHandle>,
    status: SessionStatus,
}

impl<F, T> SessionCore<F, T>
where
    F: Send + 'static,
    T: Send + 'static,
{
    /// Spawn the consumer flow over the exchange's inbound side
    pub(crate) fn start<C, Fut>(label: &'static str, exchange: Exchange<F>, consume: C) -> Self
    where
        C: FnOnce(mpsc::Receiver<Inbound>) -> Fut,
        Fut: Future<Output = Result<T, SessionError>> + Send + 'static,
    {
        let (outbound, inbound, abort) = exchange.into_parts();
        let status = SessionStatus::new();
        let (tx, terminal) = oneshot::channel();

        let watcher = status.clone();
        let flow = consume(inbound);
        let consumer = tokio::spawn(async move {
            let outcome = flow.await;
            let next = if outcome.is_ok() {
                SessionState::Completed
            } else {
                SessionState::Failed
            };
            // a terminal status always has its outcome waiting in `terminal`
            let _ = tx.send(outcome);
            watcher.advance(next);
        });

        Self {
            label,
            outbound: Some(outbound),
            terminal,
            consumer,
            abort,
            status,
        }
    }

    pub(crate) fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Push one frame, preserving submission order
    pub(crate) async fn send(&mut self, frame: F) -> Result<(), SessionError> {
        if self.status.is_terminal() {
            return Err(SessionError::Closed);
        }
        let outbound = self.outbound.as_ref().ok_or(SessionError::Closed)?;
        self.status.advance(SessionState::Streaming);
        outbound.send(frame).await.map_err(|_| SessionError::Closed)
    }

    /// Signal writes-done and wait for the terminal signal
    pub(crate) async fn finish(&mut self, timeout: Duration) -> Result<T, SessionError> {
        self.status.advance(SessionState::Completing);
        self.outbound.take();
        debug!(session = self.label, ?timeout, "Waiting for terminal signal");

        let outcome = match tokio::time::timeout(timeout, &mut self.terminal).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(SessionError::Transport(
                "session consumer stopped without a terminal signal".to_string(),
            )),
            // the consumer may have resolved right at the deadline
            Err(_) => match self.terminal.try_recv() {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.cancel();
                    Err(SessionError::Timeout(format!(
                        "no terminal signal within {:?}; server state unknown",
                        timeout
                    )))
                }
            },
        };

        let next = if outcome.is_ok() {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        if !self.status.advance(next) && self.status.state() != next {
            // the consumer recorded its outcome between the deadline and the cancel
            if let Ok(recorded) = self.terminal.try_recv() {
                return recorded;
            }
        }
        outcome
    }

    /// Stop both flows without waiting for the server
    pub(crate) fn cancel(&mut self) {
        self.outbound.take();
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
        self.consumer.abort();
    }

    /// Cancel and mark the session failed; returns whether this call ended it
    pub(crate) fn abandon(&mut self) -> bool {
        self.cancel();
        self.status.advance(SessionState::Failed)
    }
}

impl<F, T> Drop for SessionCore<F, T> {
    fn drop(&mut self) {
        self.outbound.take();
        if let Some(handle) = self.abort.take() {
            handle.abort();
        }
        self.consumer.abort();
        if self.status.advance(SessionState::Failed) {
            warn!(session = self.label, "Session dropped before a terminal signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_only_move_forward() {
        let status = SessionStatus::new();
        assert_eq!(status.state(), SessionState::Open);

        assert!(status.advance(SessionState::Streaming));
        assert!(!status.advance(SessionState::Streaming));
        assert!(!status.advance(SessionState::Open));
        assert!(status.advance(SessionState::Completing));
        assert!(!status.advance(SessionState::Streaming));
        assert_eq!(status.state(), SessionState::Completing);
    }

    #[test]
    fn test_first_terminal_wins() {
        let status = SessionStatus::new();
        let observer = status.clone();

        assert!(status.advance(SessionState::Failed));
        assert!(!status.advance(SessionState::Completed));
        assert_eq!(observer.state(), SessionState::Failed);
        assert!(observer.is_terminal());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_outcome_agrees_with_status_at_deadline() {
        for round in 0..200u32 {
            let (exchange, _peer) = Exchange::<u32>::pair(1);
            let mut core = SessionCore::start("test", exchange, move |_inbound| async move {
                tokio::task::yield_now().await;
                Ok(round)
            });
            let status = core.status().clone();

            let outcome = core.finish(Duration::ZERO).await;
            match outcome {
                Ok(value) => {
                    assert_eq!(value, round);
                    assert_eq!(status.state(), SessionState::Completed);
                }
                Err(err) => {
                    assert!(matches!(err, SessionError::Timeout(_)), "{:?}", err);
                    assert_eq!(status.state(), SessionState::Failed);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_finish_reports_consumer_error() {
        let (exchange, _peer) = Exchange::<u32>::pair(1);
        let mut core: SessionCore<u32, u32> = SessionCore::start("test", exchange, |_inbound| async move {
            Err(SessionError::Transport("reset".to_string()))
        });
        let status = core.status().clone();

        let err = core.finish(Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, SessionError::Transport("reset".to_string()));
        assert_eq!(status.state(), SessionState::Failed);
    }

    #[test]
    fn test_open_can_complete_directly() {
        let status = SessionStatus::new();
        assert!(status.advance(SessionState::Completing));
        assert!(status.advance(SessionState::Completed));
        assert_eq!(status.state(), SessionState::Completed);
    }
}
