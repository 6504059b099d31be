/// In-process transport backed by a simulated store
///
/// Behaves like a server for everything the client can observe:
/// - schema sets are applied atomically; types that disappear lose their data
/// - mutation sessions are applied all-or-nothing after writes-done
/// - search frames are answered as they arrive, numbered across the session
///
/// Records are keyed by the index fields of their type's descriptor in the
/// codec the transport was built with. Faults can be queued to exercise
/// the failure paths; each opened session takes the next queued fault.
use crate::error::{SchemaError, SessionError};
use crate::request::{MutationKind, MutationRequest, SchemaSet, SearchRequest};
use crate::transport::{Exchange, Peer, ResponseFrame, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use rogue_core::{
    AuthToken, BasicExpression, ComparisonPair, Expression, LogicalOperator, OperandCodec, Scalar, TypedOperand,
    WireOperand,
};
use rogue_proto::{Any, TYPE_URL_PREFIX};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Failure to inject into the next opened session
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// End the session with a server rejection after writes-done
    /// (mutations) or on the first frame (search)
    Reject { code: String, message: String },
    /// Never produce a terminal signal
    Stall,
    /// End the session with a transport error
    Disconnect,
    /// Append one undecodable item to every search delivery
    CorruptResult,
}

impl Fault {
    pub fn reject(code: impl Into<String>, message: impl Into<String>) -> Self {
        Fault::Reject {
            code: code.into(),
            message: message.into(),
        }
    }

    fn into_error(self) -> Option<SessionError> {
        match self {
            Fault::Reject { code, message } => Some(SessionError::ServerRejected { code, message }),
            Fault::Disconnect => Some(SessionError::Transport("connection reset by peer".to_string())),
            Fault::Stall | Fault::CorruptResult => None,
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    schemas: Vec<String>,
    types: BTreeSet<String>,
    records: BTreeMap<String, Vec<TypedOperand>>,
}

#[derive(Debug, Clone)]
pub struct MemoryTransport {
    codec: Arc<OperandCodec>,
    store: Arc<Mutex<Store>>,
    faults: Arc<Mutex<VecDeque<Fault>>>,
    tokens: Arc<Mutex<Vec<String>>>,
    chunk_size: usize,
    json_results: bool,
    capacity: usize,
}

impl MemoryTransport {
    pub fn new(codec: Arc<OperandCodec>) -> Self {
        Self {
            codec,
            store: Arc::new(Mutex::new(Store::default())),
            faults: Arc::new(Mutex::new(VecDeque::new())),
            tokens: Arc::new(Mutex::new(Vec::new())),
            chunk_size: 0,
            json_results: false,
            capacity: 64,
        }
    }

    /// Split every result bucket into deliveries of at most `size` items
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Answer searches with JSON envelopes instead of binary `Any`
    pub fn with_json_results(mut self) -> Self {
        self.json_results = true;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Queue a fault for the next opened session
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push_back(fault);
    }

    /// Stored records of a type, in insertion order
    pub fn records(&self, type_name: &str) -> Vec<TypedOperand> {
        self.store.lock().records.get(type_name).cloned().unwrap_or_default()
    }

    /// Types declared by the active schema set
    pub fn declared_types(&self) -> Vec<String> {
        self.store.lock().types.iter().cloned().collect()
    }

    /// The active schema texts, in submission order
    pub fn schemas(&self) -> Vec<String> {
        self.store.lock().schemas.clone()
    }

    /// Every token presented so far, in order
    pub fn seen_tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }

    fn next_fault(&self) -> Option<Fault> {
        self.faults.lock().pop_front()
    }

    fn record_token(&self, token: &AuthToken) {
        self.tokens.lock().push(token.as_str().to_string());
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open_mutation(
        &self,
        kind: MutationKind,
        token: &AuthToken,
    ) -> Result<Exchange<MutationRequest>, SessionError> {
        self.record_token(token);
        let (exchange, peer) = Exchange::<MutationRequest>::pair(self.capacity);
        let fault = self.next_fault();
        let server = self.clone();
        let task = tokio::spawn(async move { server.serve_mutation(kind, peer, fault).await });
        Ok(exchange.with_abort(task.abort_handle()))
    }

    async fn open_search(&self, token: &AuthToken) -> Result<Exchange<SearchRequest>, SessionError> {
        self.record_token(token);
        let (exchange, peer) = Exchange::<SearchRequest>::pair(self.capacity);
        let fault = self.next_fault();
        let server = self.clone();
        let task = tokio::spawn(async move { server.serve_search(peer, fault).await });
        Ok(exchange.with_abort(task.abort_handle()))
    }

    async fn subscribe(&self, schemas: &SchemaSet, token: &AuthToken) -> Result<(), SchemaError> {
        self.record_token(token);
        let parser = SchemaParser::new()?;

        let mut declared = BTreeSet::new();
        for (position, text) in schemas.schemas().iter().enumerate() {
            let types = parser
                .declared_types(text)
                .map_err(|detail| SchemaError::ValidationFailed(format!("schema {}: {}", position, detail)))?;
            declared.extend(types);
        }

        let mut store = self.store.lock();
        let before = store.records.len();
        store.records.retain(|type_name, _| declared.contains(type_name));
        info!(
            schemas = schemas.len(),
            types = declared.len(),
            dropped = before - store.records.len(),
            "Applied schema set"
        );
        store.types = declared;
        store.schemas = schemas.schemas().to_vec();
        Ok(())
    }
}

impl MemoryTransport {
    async fn serve_mutation(self, kind: MutationKind, peer: Peer<MutationRequest>, fault: Option<Fault>) {
        let Peer { mut frames, responses } = peer;

        let mut batch = Vec::new();
        while let Some(frame) = frames.recv().await {
            self.record_token(&frame.token);
            batch.extend(frame.messages);
        }
        debug!(kind = %kind, messages = batch.len(), "Writes done");

        match fault {
            Some(Fault::Stall) => {
                responses.closed().await;
                return;
            }
            Some(fault) => {
                if let Some(err) = fault.into_error() {
                    let _ = responses.send(Err(err)).await;
                    return;
                }
            }
            None => {}
        }

        let outcome = self.apply(kind, batch);
        if let Err(err) = outcome {
            let _ = responses.send(Err(err)).await;
        }
    }

    /// Apply a whole session under one lock, or nothing
    fn apply(&self, kind: MutationKind, batch: Vec<TypedOperand>) -> Result<(), SessionError> {
        let mut store = self.store.lock();
        let mut records = store.records.clone();

        for message in batch {
            if !store.types.contains(message.type_name()) {
                return Err(rejected("InvalidArgument", format!("unknown type {}", message.type_name())));
            }
            let table = records.entry(message.type_name().to_string()).or_default();
            let key = self.key_of(&message);

            match kind {
                MutationKind::Insert => {
                    if key.is_empty() {
                        return Err(rejected("InvalidArgument", "insert sets no key fields"));
                    }
                    if table.iter().any(|r| self.key_of(r) == key) {
                        return Err(rejected("AlreadyExists", format!("duplicate key {:?}", key)));
                    }
                    table.push(message);
                }
                MutationKind::Update => {
                    let existing = table
                        .iter_mut()
                        .find(|r| self.key_of(r) == key)
                        .ok_or_else(|| rejected("NotFound", format!("no record with key {:?}", key)))?;
                    for (number, field) in message.fields() {
                        existing.set(number, field.name.clone(), field.value.clone());
                    }
                }
                MutationKind::Remove => {
                    table.retain(|r| !same_values(&message, r));
                }
            }
        }

        records.retain(|_, table| !table.is_empty());
        store.records = records;
        Ok(())
    }

    /// Values of the type's index fields, or of every set field when the
    /// type declares no index
    fn key_of(&self, operand: &TypedOperand) -> Vec<(u32, Scalar)> {
        let index: Vec<u32> = self
            .codec
            .descriptor(operand.type_name())
            .map(|d| d.index_fields().iter().map(|f| f.number).collect())
            .unwrap_or_default();

        operand
            .fields()
            .filter(|(number, _)| index.is_empty() || index.contains(number))
            .map(|(number, field)| (number, field.value.clone()))
            .collect()
    }

    async fn serve_search(self, peer: Peer<SearchRequest>, fault: Option<Fault>) {
        let Peer { mut frames, responses } = peer;
        let corrupt = fault == Some(Fault::CorruptResult);

        match fault {
            Some(Fault::Stall) => {
                // keep reading so the caller never blocks on send
                while frames.recv().await.is_some() {}
                responses.closed().await;
                return;
            }
            Some(Fault::Disconnect) => {
                let _ = responses.send(Err(SessionError::Transport("connection reset by peer".to_string()))).await;
                return;
            }
            _ => {}
        }
        let mut reject = fault.and_then(Fault::into_error);

        let mut next_query = 0u32;
        while let Some(frame) = frames.recv().await {
            self.record_token(&frame.token);
            if let Some(err) = reject.take() {
                let _ = responses.send(Err(err)).await;
                return;
            }

            let buckets = match self.evaluate(&frame.queries, next_query) {
                Ok(buckets) => buckets,
                Err(err) => {
                    let _ = responses.send(Err(err)).await;
                    return;
                }
            };
            next_query += frame.queries.len() as u32;

            for (query, matches) in buckets {
                for frame in self.deliveries(query, &matches, corrupt) {
                    if responses.send(Ok(frame)).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    fn evaluate(&self, queries: &[Expression], first: u32) -> Result<Vec<(u32, Vec<TypedOperand>)>, SessionError> {
        let store = self.store.lock();
        let mut buckets = Vec::with_capacity(queries.len());

        for (offset, query) in queries.iter().enumerate() {
            let mut types = BTreeSet::new();
            leaf_types(query, &mut types);
            if let Some(unknown) = types.iter().find(|t| !store.types.contains(*t)) {
                return Err(rejected("InvalidArgument", format!("unknown type {}", unknown)));
            }

            let matches = types
                .iter()
                .filter_map(|t| store.records.get(t))
                .flatten()
                .filter(|record| holds(query, record))
                .cloned()
                .collect();
            buckets.push((first + offset as u32, matches));
        }

        Ok(buckets)
    }

    /// Frames for one query: the matches in chunks, then its finished marker
    fn deliveries(&self, query: u32, matches: &[TypedOperand], corrupt: bool) -> Vec<ResponseFrame> {
        let mut frames = Vec::new();
        let chunk = if self.chunk_size == 0 {
            matches.len().max(1)
        } else {
            self.chunk_size
        };

        for part in matches.chunks(chunk) {
            let mut items: Vec<WireOperand> = part.iter().map(|m| self.encode(m)).collect();
            if corrupt {
                items.push(WireOperand::Binary(Any {
                    type_url: format!("{}{}", TYPE_URL_PREFIX, part[0].type_name()),
                    value: vec![0xFF],
                }));
            }
            frames.push(ResponseFrame {
                results: vec![(query, items)],
                finished: Vec::new(),
            });
        }

        frames.push(ResponseFrame {
            results: Vec::new(),
            finished: vec![query],
        });
        frames
    }

    fn encode(&self, operand: &TypedOperand) -> WireOperand {
        if self.json_results {
            WireOperand::Json(operand.to_json())
        } else {
            WireOperand::Binary(operand.to_any())
        }
    }
}

fn rejected(code: &str, message: impl Into<String>) -> SessionError {
    SessionError::ServerRejected {
        code: code.to_string(),
        message: message.into(),
    }
}

/// Whether every field set on `pattern` has the same value on `record`
fn same_values(pattern: &TypedOperand, record: &TypedOperand) -> bool {
    pattern.type_name() == record.type_name()
        && pattern
            .fields()
            .all(|(number, field)| record.get(number) == Some(&field.value))
}

fn leaf_types(expression: &Expression, out: &mut BTreeSet<String>) {
    match expression {
        Expression::Basic(basic) => {
            out.insert(basic.type_name().to_string());
        }
        Expression::Composite(composite) => {
            for child in composite.children() {
                leaf_types(child, out);
            }
        }
    }
}

fn combine(operator: LogicalOperator, mut results: impl Iterator<Item = bool>) -> bool {
    match operator {
        LogicalOperator::And => results.all(|r| r),
        LogicalOperator::Or => results.any(|r| r),
    }
}

fn holds(expression: &Expression, record: &TypedOperand) -> bool {
    match expression {
        Expression::Basic(basic) => basic_holds(basic, record),
        Expression::Composite(composite) => combine(
            composite.logical_operator(),
            composite.children().iter().map(|child| holds(child, record)),
        ),
    }
}

fn basic_holds(basic: &BasicExpression, record: &TypedOperand) -> bool {
    if basic.type_name() != record.type_name() {
        return false;
    }
    combine(
        basic.logical_operator(),
        basic
            .comparisons()
            .iter()
            .map(|pair| pair_holds(pair, record, basic.fields())),
    )
}

/// A comparison holds when every constrained field of its operand compares
/// as required; a record missing such a field never matches
fn pair_holds(pair: &ComparisonPair, record: &TypedOperand, selected: &[u32]) -> bool {
    pair.operand
        .fields()
        .filter(|(number, _)| selected.is_empty() || selected.contains(number))
        .all(|(number, field)| {
            record
                .get(number)
                .and_then(|stored| stored.compare(&field.value))
                .map(|ordering| pair.operator.holds(ordering))
                .unwrap_or(false)
        })
}

/// Minimal reader for `.proto` sources
///
/// Checks only what the store needs: a syntax line, balanced braces and at
/// least one message. Declared types are `package.Message`.
struct SchemaParser {
    syntax: Regex,
    package: Regex,
    message: Regex,
}

impl SchemaParser {
    fn new() -> Result<Self, SchemaError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| SchemaError::Transport(format!("schema parser: {}", e)))
        };
        Ok(Self {
            syntax: compile(r#"(?m)^\s*syntax\s*=\s*"proto[23]"\s*;"#)?,
            package: compile(r"(?m)^\s*package\s+([A-Za-z_][A-Za-z0-9_.]*)\s*;")?,
            message: compile(r"\bmessage\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{")?,
        })
    }

    fn declared_types(&self, text: &str) -> Result<Vec<String>, String> {
        if !self.syntax.is_match(text) {
            return Err("missing syntax declaration".to_string());
        }

        let mut depth: i64 = 0;
        for c in text.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth < 0 {
                        return Err("unexpected '}'".to_string());
                    }
                }
                _ => {}
            }
        }
        if depth != 0 {
            return Err("unbalanced braces".to_string());
        }

        let package = self
            .package
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());

        let types: Vec<String> = self
            .message
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| match &package {
                Some(package) => format!("{}.{}", package, m.as_str()),
                None => m.as_str().to_string(),
            })
            .collect();

        if types.is_empty() {
            return Err("no message declarations".to_string());
        }
        Ok(types)
    }
}
