/// RogueDB client facade
///
/// Owns a transport and the operand codec, and opens sessions on behalf of
/// a [`Credential`]. Credentials are never renewed here; callers ask their
/// `CredentialManager` before each session, and an expired one is refused.
use crate::config::{ClientConfig, TransportKind};
use crate::error::{SchemaError, SessionError};
use crate::grpc::GrpcTransport;
use crate::mutation::{MutationSession, MutationSummary};
use crate::request::{MutationKind, SchemaSet};
use crate::rest::RestTransport;
use crate::schema::SchemaSync;
use crate::search::{ResultSink, SearchResults, SearchSession};
use crate::transport::Transport;
use rogue_core::{Clock, Credential, Expression, OperandCodec, SystemClock, TypedOperand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct Client {
    transport: Arc<dyn Transport>,
    codec: Arc<OperandCodec>,
    config: ClientConfig,
    clock: Arc<dyn Clock>,
    schemas: SchemaSync,
}

impl Client {
    /// Connect using the transport named in `config`
    ///
    /// # Example
    /// ```ignore
    /// let config = ClientConfig::new().with_endpoint("https://c-0123.roguedb.dev");
    /// let client = Client::connect(config, OperandCodec::new().with::<Test>()).await?;
    /// ```
    pub async fn connect(config: ClientConfig, codec: impl Into<Arc<OperandCodec>>) -> Result<Self, SessionError> {
        config.validate().map_err(SessionError::InvalidConfig)?;

        let transport: Arc<dyn Transport> = match config.transport {
            TransportKind::Grpc => Arc::new(GrpcTransport::connect(&config).await?),
            TransportKind::Rest => Arc::new(RestTransport::new(&config)?),
        };
        Ok(Self::with_transport(transport, codec, config))
    }

    /// Build a client over any transport
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        codec: impl Into<Arc<OperandCodec>>,
        config: ClientConfig,
    ) -> Self {
        let schemas = SchemaSync::new(transport.clone());
        Self {
            transport,
            codec: codec.into(),
            config,
            clock: Arc::new(SystemClock),
            schemas,
        }
    }

    /// Clock used for the expiry check before each session
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let schemas = self.schemas;
        self.schemas = schemas.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn codec(&self) -> &Arc<OperandCodec> {
        &self.codec
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    fn check(&self, credential: &Credential) -> Result<(), SessionError> {
        if credential.is_expired(self.clock.now()) {
            return Err(SessionError::CredentialExpired {
                expired_at: credential.expires_at(),
            });
        }
        Ok(())
    }

    pub async fn open_mutation(&self, kind: MutationKind, credential: &Credential) -> Result<MutationSession, SessionError> {
        self.check(credential)?;
        let exchange = self.transport.open_mutation(kind, credential.token()).await?;
        Ok(MutationSession::start(
            kind,
            credential.token().clone(),
            self.codec.clone(),
            exchange,
        ))
    }

    pub async fn open_search(
        &self,
        credential: &Credential,
        sink: impl ResultSink,
    ) -> Result<SearchSession, SessionError> {
        self.check(credential)?;
        let exchange = self.transport.open_search(credential.token()).await?;
        Ok(SearchSession::start(
            credential.token().clone(),
            self.codec.clone(),
            exchange,
            Box::new(sink),
        ))
    }

    /// Run one mutation session carrying `messages` as a single frame
    ///
    /// A session the server ends before the frame goes out still reports
    /// the server's error, not [`SessionError::Closed`].
    pub async fn mutate(
        &self,
        kind: MutationKind,
        credential: &Credential,
        messages: Vec<TypedOperand>,
    ) -> Result<MutationSummary, SessionError> {
        let mut session = self.open_mutation(kind, credential).await?;
        if !messages.is_empty() {
            match session.send(messages).await {
                Ok(()) | Err(SessionError::Closed) => {}
                Err(err) => return Err(err),
            }
        }
        session.complete(self.config.session_timeout).await
    }

    pub async fn insert(&self, credential: &Credential, messages: Vec<TypedOperand>) -> Result<MutationSummary, SessionError> {
        self.mutate(MutationKind::Insert, credential, messages).await
    }

    pub async fn update(&self, credential: &Credential, messages: Vec<TypedOperand>) -> Result<MutationSummary, SessionError> {
        self.mutate(MutationKind::Update, credential, messages).await
    }

    pub async fn remove(&self, credential: &Credential, messages: Vec<TypedOperand>) -> Result<MutationSummary, SessionError> {
        self.mutate(MutationKind::Remove, credential, messages).await
    }

    /// Run one search session and collect every delivery
    ///
    /// Query `i` of `queries` is index `i` in the returned results.
    pub async fn search(&self, credential: &Credential, queries: Vec<Expression>) -> Result<SearchResults, SessionError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut session = self.open_search(credential, tx).await?;
        match session.submit(queries).await {
            Ok(_) | Err(SessionError::Closed) => {}
            Err(err) => return Err(err),
        }
        let summary = session.complete(self.config.session_timeout).await?;

        let mut results = SearchResults::new();
        while let Ok(event) = rx.try_recv() {
            results.apply(event);
        }
        debug!(deliveries = summary.deliveries, matches = summary.matches, "Collected search results");
        Ok(results)
    }

    /// Replace the server's schema set; see [`SchemaSync`]
    pub async fn subscribe(&self, schemas: SchemaSet, credential: &Credential) -> Result<(), SchemaError> {
        self.schemas.apply(schemas, credential).await
    }

    pub fn schema_sync(&self) -> &SchemaSync {
        &self.schemas
    }
}
