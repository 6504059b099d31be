/// Long-lived search sessions
///
/// Queries can be submitted in several frames before completion. The server
/// numbers them across the whole session, starting at 0, and may deliver a
/// query's bucket several times; every delivery reaches the sink, in
/// arrival order, and is meant to be added to what came before.
///
/// Items that fail to decode are reported as [`DecodeWarning`]s on their
/// delivery. Only a transport or server error ends the session.
use crate::error::SessionError;
use crate::request::SearchRequest;
use crate::session::{SessionCore, SessionStatus};
use crate::transport::{Exchange, Inbound};
use rogue_core::{AuthToken, Expression, Operand, OperandCodec, OperandError, TypedOperand, WireOperand};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A result item that could not be decoded
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeWarning {
    pub query: u32,
    /// Position of the item within its delivery
    pub position: usize,
    pub error: OperandError,
}

/// One result bucket as received
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub query: u32,
    pub matches: Vec<TypedOperand>,
    pub warnings: Vec<DecodeWarning>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    Results(Delivery),
    /// The server reported it is done with this query
    Finished { query: u32 },
}

/// Receives search events from the session's consumer flow
///
/// Called inline on the consumer task; implementations must not block.
pub trait ResultSink: Send + 'static {
    fn deliver(&mut self, event: SearchEvent);
}

impl ResultSink for mpsc::UnboundedSender<SearchEvent> {
    fn deliver(&mut self, event: SearchEvent) {
        if self.send(event).is_err() {
            debug!("Search event receiver dropped");
        }
    }
}

/// Adapts a closure into a [`ResultSink`]
pub struct FnSink<F>(pub F);

impl<F> ResultSink for FnSink<F>
where
    F: FnMut(SearchEvent) + Send + 'static,
{
    fn deliver(&mut self, event: SearchEvent) {
        (self.0)(event)
    }
}

/// Additive view over a session's deliveries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    matches: BTreeMap<u32, Vec<TypedOperand>>,
    deliveries: BTreeMap<u32, usize>,
    warnings: Vec<DecodeWarning>,
    finished: BTreeSet<u32>,
}

impl SearchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: SearchEvent) {
        match event {
            SearchEvent::Results(delivery) => {
                *self.deliveries.entry(delivery.query).or_default() += 1;
                self.matches
                    .entry(delivery.query)
                    .or_default()
                    .extend(delivery.matches);
                self.warnings.extend(delivery.warnings);
            }
            SearchEvent::Finished { query } => {
                self.finished.insert(query);
            }
        }
    }

    /// All matches received for a query, in arrival order
    pub fn matches(&self, query: u32) -> &[TypedOperand] {
        self.matches.get(&query).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Decode every match of a query into a domain type
    pub fn decode<T: Operand>(&self, codec: &OperandCodec, query: u32) -> Result<Vec<T>, OperandError> {
        self.matches(query).iter().map(|m| codec.decode(m)).collect()
    }

    /// Number of deliveries received for a query
    pub fn deliveries(&self, query: u32) -> usize {
        self.deliveries.get(&query).copied().unwrap_or(0)
    }

    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    pub fn is_finished(&self, query: u32) -> bool {
        self.finished.contains(&query)
    }

    /// Query indices with at least one delivery
    pub fn queries(&self) -> impl Iterator<Item = u32> + '_ {
        self.deliveries.keys().copied()
    }
}

/// Totals reported when a search session completes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchSummary {
    pub queries: u32,
    pub deliveries: usize,
    pub matches: usize,
    pub warnings: usize,
    pub finished: Vec<u32>,
}

pub struct SearchSession {
    token: AuthToken,
    codec: Arc<OperandCodec>,
    core: SessionCore<SearchRequest, SearchSummary>,
    next_query: u32,
}

impl SearchSession {
    pub(crate) fn start(
        token: AuthToken,
        codec: Arc<OperandCodec>,
        exchange: Exchange<SearchRequest>,
        sink: Box<dyn ResultSink>,
    ) -> Self {
        info!("Search session opened");
        let decoder = codec.clone();
        let core = SessionCore::start("search", exchange, move |inbound| consume(inbound, decoder, sink));
        Self {
            token,
            codec,
            core,
            next_query: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.core.status().clone()
    }

    /// Number of queries submitted so far
    pub fn submitted(&self) -> u32 {
        self.next_query
    }

    /// Submit one frame of queries; returns the indices assigned to them
    pub async fn submit(&mut self, queries: Vec<Expression>) -> Result<Range<u32>, SessionError> {
        for query in &queries {
            for operand in query.operands() {
                self.codec.validate(operand)?;
            }
        }

        let start = self.next_query;
        if queries.is_empty() {
            return Ok(start..start);
        }

        let assigned = assign_indices(start, queries.len())?;
        let frame = SearchRequest {
            token: self.token.clone(),
            queries,
        };
        self.core.send(frame).await?;

        self.next_query = assigned.end;
        debug!(first = assigned.start, count = assigned.len(), "Submitted search frame");
        Ok(assigned)
    }

    /// Submit a single query; returns its index
    pub async fn query(&mut self, query: Expression) -> Result<u32, SessionError> {
        Ok(self.submit(vec![query]).await?.start)
    }

    pub async fn complete(mut self, timeout: Duration) -> Result<SearchSummary, SessionError> {
        let queries = self.next_query;
        match self.core.finish(timeout).await {
            Ok(mut summary) => {
                summary.queries = queries;
                info!(
                    queries,
                    deliveries = summary.deliveries,
                    matches = summary.matches,
                    warnings = summary.warnings,
                    "Search session completed"
                );
                Ok(summary)
            }
            Err(err) => {
                warn!(queries, error = %err, "Search session failed");
                Err(err)
            }
        }
    }

    pub fn abandon(mut self) {
        if self.core.abandon() {
            warn!(queries = self.next_query, "Search session abandoned");
        }
    }
}

fn decode_delivery(codec: &OperandCodec, query: u32, items: Vec<WireOperand>) -> Delivery {
    let mut matches = Vec::with_capacity(items.len());
    let mut warnings = Vec::new();

    for (position, item) in items.iter().enumerate() {
        match codec.decode_wire(item) {
            Ok(operand) => matches.push(operand),
            Err(error) => {
                warn!(query, position, error = %error, "Skipping undecodable result item");
                warnings.push(DecodeWarning { query, position, error });
            }
        }
    }

    Delivery {
        query,
        matches,
        warnings,
    }
}

async fn consume(
    mut inbound: mpsc::Receiver<Inbound>,
    codec: Arc<OperandCodec>,
    mut sink: Box<dyn ResultSink>,
) -> Result<SearchSummary, SessionError> {
    let mut summary = SearchSummary::default();

    while let Some(item) = inbound.recv().await {
        let frame = item?;
        for (query, items) in frame.results {
            let delivery = decode_delivery(&codec, query, items);
            summary.deliveries += 1;
            summary.matches += delivery.matches.len();
            summary.warnings += delivery.warnings.len();
            debug!(query, matches = delivery.matches.len(), "Search delivery");
            sink.deliver(SearchEvent::Results(delivery));
        }
        for query in frame.finished {
            summary.finished.push(query);
            sink.deliver(SearchEvent::Finished { query });
        }
    }

    Ok(summary)
}

/// Session-wide indices for `len` queries following `start`
fn assign_indices(start: u32, len: usize) -> Result<Range<u32>, SessionError> {
    let end = u32::try_from(len)
        .ok()
        .and_then(|count| start.checked_add(count))
        .ok_or_else(|| {
            SessionError::QueryLimit(format!(
                "{} queries after index {} exceed the session's index space",
                len, start
            ))
        })?;
    Ok(start..end)
}
