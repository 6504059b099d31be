/// RogueDB client sessions
///
/// Mutation and search sessions are explicit state machines over a
/// [`Transport`]: gRPC streams, REST requests, or the in-process
/// [`MemoryTransport`]. Schema sets are applied through [`SchemaSync`].
///
/// # Example
/// ```ignore
/// let credential = CredentialManager::new().mint("service_account.json")?;
/// let client = Client::connect(ClientConfig::new(), codec).await?;
///
/// let mut session = client.open_mutation(MutationKind::Insert, &credential).await?;
/// session.send_values(&records).await?;
/// session.complete(Duration::from_secs(10)).await?;
/// ```

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod grpc;
pub mod memory;
pub mod mutation;
pub mod request;
pub mod rest;
pub mod schema;
pub mod search;
pub mod session;
pub mod transport;

pub use client::Client;
pub use config::{ClientConfig, TransportKind};
pub use error::{SchemaError, SessionError};
pub use grpc::GrpcTransport;
pub use memory::{Fault, MemoryTransport};
pub use mutation::{MutationSession, MutationSummary};
pub use request::{MutationKind, MutationRequest, SchemaSet, SearchRequest};
pub use rest::RestTransport;
pub use schema::SchemaSync;
pub use search::{DecodeWarning, Delivery, FnSink, ResultSink, SearchEvent, SearchResults, SearchSession, SearchSummary};
pub use session::{SessionState, SessionStatus};
pub use transport::{Exchange, Inbound, Peer, ResponseFrame, Transport};

// Re-export the building blocks callers need alongside sessions
pub use rogue_core::{
    AuthToken, ComparisonOperator, Credential, CredentialManager, Expression, LogicalOperator, Operand, OperandCodec,
    TypedOperand,
};
