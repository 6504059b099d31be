/// Transport seam between sessions and the wire
///
/// A transport turns an open request into an [`Exchange`]: a bounded
/// outbound channel of request frames plus an inbound channel of server
/// frames. Closing the outbound side means "no more frames". The inbound
/// side yields at most one error; a channel that ends without one is a
/// clean terminal signal.
use crate::error::{SchemaError, SessionError};
use crate::request::{MutationKind, MutationRequest, SchemaSet, SearchRequest};
use async_trait::async_trait;
use rogue_core::{AuthToken, WireOperand};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Server-to-client frame, common to every streaming call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseFrame {
    /// Result buckets keyed by session-wide query index, ascending
    pub results: Vec<(u32, Vec<WireOperand>)>,

    /// Query indices the server has finished processing
    pub finished: Vec<u32>,
}

impl ResponseFrame {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.finished.is_empty()
    }
}

/// One inbound item
pub type Inbound = Result<ResponseFrame, SessionError>;

/// Session side of a streaming call
#[derive(Debug)]
pub struct Exchange<F> {
    outbound: mpsc::Sender<F>,
    inbound: mpsc::Receiver<Inbound>,
    abort: Option<AbortHandle>,
}

/// Transport side of a streaming call
#[derive(Debug)]
pub struct Peer<F> {
    /// Frames submitted by the session, in order
    pub frames: mpsc::Receiver<F>,

    /// Where server frames and the optional terminal error go
    pub responses: mpsc::Sender<Inbound>,
}

impl<F> Exchange<F> {
    /// Create connected session and transport ends
    pub fn pair(capacity: usize) -> (Self, Peer<F>) {
        let capacity = capacity.max(1);
        let (outbound, frames) = mpsc::channel(capacity);
        let (responses, inbound) = mpsc::channel(capacity);
        (
            Self {
                outbound,
                inbound,
                abort: None,
            },
            Peer { frames, responses },
        )
    }

    /// Task to abort when the session is cancelled or times out
    pub fn with_abort(mut self, handle: AbortHandle) -> Self {
        self.abort = Some(handle);
        self
    }

    pub fn into_parts(self) -> (mpsc::Sender<F>, mpsc::Receiver<Inbound>, Option<AbortHandle>) {
        (self.outbound, self.inbound, self.abort)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Open an insert, update or remove stream
    async fn open_mutation(
        &self,
        kind: MutationKind,
        token: &AuthToken,
    ) -> Result<Exchange<MutationRequest>, SessionError>;

    /// Open a search stream
    async fn open_search(&self, token: &AuthToken) -> Result<Exchange<SearchRequest>, SessionError>;

    /// Replace the active schema set
    async fn subscribe(&self, schemas: &SchemaSet, token: &AuthToken) -> Result<(), SchemaError>;
}
